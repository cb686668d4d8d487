//! Configuration sections
//!
//! Each `[section]` of the config file maps onto one struct here. Every field
//! has a default, so a config file only needs the values it changes.
//!
//! # Sections
//!
//! - [`CameraConfig`] - Camera class, device discovery, open retries, watchdog
//! - [`ColorMapConfig`] - Startup LUT, table bit depth, isotherm band
//! - [`RecordingConfig`] - Output directory, frame rate, encoder settings
//! - [`LoggingConfig`] - Log filter and optional log directory

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::colormap::{IsothermBand, LutName, DEFAULT_BIT_DEPTH};
use crate::types::CameraModel;

/// Default sysfs directory listing video4linux nodes
pub const DEFAULT_SYSFS_ROOT: &str = "/sys/class/video4linux";

/// Camera discovery and capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Requested camera class; only cameras of this class are activated
    pub camera_type: CameraModel,

    /// Root of the video4linux sysfs tree
    pub sysfs_root: PathBuf,

    /// Hotplug rescan interval in milliseconds
    pub poll_interval_ms: u64,

    /// Open attempts before giving up on a camera
    pub open_retries: u32,

    /// Delay between open attempts in milliseconds
    pub open_retry_delay_ms: u64,

    /// Read watchdog as a multiple of the frame interval
    pub watchdog_multiple: u32,

    /// Consecutive malformed or stalled reads tolerated before entering Error
    pub malformed_frame_budget: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            camera_type: CameraModel::Boson,
            sysfs_root: PathBuf::from(DEFAULT_SYSFS_ROOT),
            poll_interval_ms: 500,
            open_retries: 3,
            open_retry_delay_ms: 1000,
            watchdog_multiple: 4,
            malformed_frame_budget: 5,
        }
    }
}

impl CameraConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn open_retry_delay(&self) -> Duration {
        Duration::from_millis(self.open_retry_delay_ms)
    }

    /// Watchdog timeout for a camera with the given frame interval
    pub fn watchdog(&self, frame_interval: Duration) -> Duration {
        frame_interval * self.watchdog_multiple.max(1)
    }
}

/// Colormap settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorMapConfig {
    /// LUT active at startup
    pub default_lut: LutName,

    /// Bit depth of the precomputed tables (tables have 2^bit_depth entries).
    /// Frames of another depth are rescaled onto the table.
    pub bit_depth: u8,

    /// Start of the isotherm highlight band, fraction of full scale
    pub isotherm_band_start: f32,

    /// End of the isotherm highlight band, fraction of full scale
    pub isotherm_band_end: f32,
}

impl Default for ColorMapConfig {
    fn default() -> Self {
        let band = IsothermBand::default();
        Self {
            default_lut: LutName::RedHot,
            bit_depth: DEFAULT_BIT_DEPTH,
            isotherm_band_start: band.start,
            isotherm_band_end: band.end,
        }
    }
}

impl ColorMapConfig {
    pub fn isotherm_band(&self) -> IsothermBand {
        IsothermBand {
            start: self.isotherm_band_start,
            end: self.isotherm_band_end,
        }
    }
}

/// Recording settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Directory for recordings started without an explicit path
    pub output_dir: PathBuf,

    /// Recording frame rate; the camera's native rate when unset
    pub fps: Option<f64>,

    /// Frames buffered between the capture thread and the encoder
    pub queue_frames: usize,

    /// ffmpeg executable
    pub ffmpeg_path: PathBuf,

    /// ffmpeg video codec
    pub codec: String,

    /// FourCC tag written into the container
    pub fourcc: String,

    /// Encoder quantizer (1 = best, 31 = worst)
    pub quality: u8,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            fps: None,
            queue_frames: 32,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            codec: "mpeg4".to_string(),
            fourcc: "XVID".to_string(),
            quality: 5,
        }
    }
}

impl RecordingConfig {
    /// Frame rate to record a camera of `model` at
    pub fn fps_for(&self, model: CameraModel) -> f64 {
        self.fps.unwrap_or(model.native_fps() as f64)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,

    /// When set, logs are also written to daily files in this directory
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,thermview=debug".to_string(),
            log_dir: None,
        }
    }
}
