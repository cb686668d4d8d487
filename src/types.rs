//! Core data types for thermview
//!
//! This module contains the structures that flow through the frame pipeline
//! and the identities that flow through the device lifecycle.
//!
//! # Main Types
//!
//! - [`CameraModel`] - Closed set of supported camera classes (Boson, Lepton 3, Lepton 2)
//! - [`CameraIdentity`] - One attached camera (USB ids, model class, device node)
//! - [`DeviceEvent`] - Attach/detach notification produced by the device monitor
//! - [`RawFrame`] - Grid of unsigned sensor samples as captured
//! - [`ColorFrame`] - Grid of RGB triples after colormap application
//! - [`PipelineState`] / [`PipelineStatus`] - Controller state published to the UI

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::colormap::LutName;
use crate::error::{ConfigError, ReadError};

/// USB vendor id of FLIR Boson cameras
pub const FLIR_VENDOR_ID: u16 = 0x09cb;
/// USB vendor id of the PureThermal / Cubeternet bridge used for Lepton modules
pub const LEPTON_BRIDGE_VENDOR_ID: u16 = 0x1e4e;
/// USB product id of the PureThermal / Cubeternet bridge
pub const LEPTON_BRIDGE_PRODUCT_ID: u16 = 0x0100;

/// Supported camera model classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CameraModel {
    /// FLIR Boson, full resolution
    #[default]
    Boson,
    /// FLIR Lepton 3.x, reduced resolution
    Lepton3,
    /// FLIR Lepton 2.x, reduced resolution
    Lepton2,
}

impl CameraModel {
    /// All supported models in CLI order
    pub const ALL: [CameraModel; 3] = [CameraModel::Boson, CameraModel::Lepton3, CameraModel::Lepton2];

    /// Name used on the command line and in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            CameraModel::Boson => "BOSON",
            CameraModel::Lepton3 => "LEPTON3",
            CameraModel::Lepton2 => "LEPTON2",
        }
    }

    /// Sensor resolution as (width, height)
    pub fn resolution(&self) -> (u32, u32) {
        match self {
            CameraModel::Boson => (640, 512),
            CameraModel::Lepton3 => (160, 120),
            CameraModel::Lepton2 => (80, 60),
        }
    }

    /// Native frame rate in frames per second
    pub fn native_fps(&self) -> u32 {
        match self {
            CameraModel::Boson => 60,
            CameraModel::Lepton3 | CameraModel::Lepton2 => 9,
        }
    }

    /// Bit depth of the samples delivered to the pipeline
    pub fn bit_depth(&self) -> u8 {
        8
    }

    /// Expected time between frames at the native rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.native_fps() as u64)
    }

    /// Whether a USB vendor/product pair belongs to this model's family
    ///
    /// Lepton 2 and Lepton 3 share the same USB bridge, so both classes accept it.
    pub fn matches_usb(&self, vendor_id: u16, product_id: u16) -> bool {
        match self {
            CameraModel::Boson => vendor_id == FLIR_VENDOR_ID,
            CameraModel::Lepton3 | CameraModel::Lepton2 => {
                vendor_id == LEPTON_BRIDGE_VENDOR_ID && product_id == LEPTON_BRIDGE_PRODUCT_ID
            }
        }
    }
}

impl fmt::Display for CameraModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraModel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CameraModel::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownCameraType(s.to_string()))
    }
}

/// One attached camera
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraIdentity {
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Model class this camera was matched as
    pub model: CameraModel,
    /// Device node (e.g. `/dev/video0`)
    pub device_path: PathBuf,
    /// USB product string, when the host reports one
    pub product_name: Option<String>,
}

impl CameraIdentity {
    /// Create an identity without a product string
    pub fn new(vendor_id: u16, product_id: u16, model: CameraModel, device_path: impl Into<PathBuf>) -> Self {
        Self {
            vendor_id,
            product_id,
            model,
            device_path: device_path.into(),
            product_name: None,
        }
    }

    /// Display name for camera pickers
    pub fn display_name(&self) -> String {
        match &self.product_name {
            Some(name) => format!("{} ({})", name, self.device_path.display()),
            None => format!(
                "{} {:04x}:{:04x} ({})",
                self.model,
                self.vendor_id,
                self.product_id,
                self.device_path.display()
            ),
        }
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Attach or detach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEventKind {
    Attached,
    Detached,
}

/// Hotplug notification for a supported camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub kind: DeviceEventKind,
    pub identity: CameraIdentity,
}

impl DeviceEvent {
    pub fn attached(identity: CameraIdentity) -> Self {
        Self {
            kind: DeviceEventKind::Attached,
            identity,
        }
    }

    pub fn detached(identity: CameraIdentity) -> Self {
        Self {
            kind: DeviceEventKind::Detached,
            identity,
        }
    }
}

/// Mirror axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// Mirroring applied to raw frames before color mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flip {
    pub horizontal: bool,
    pub vertical: bool,
}

impl Flip {
    /// Toggle one axis
    pub fn toggle(&mut self, axis: FlipAxis) {
        match axis {
            FlipAxis::Horizontal => self.horizontal = !self.horizontal,
            FlipAxis::Vertical => self.vertical = !self.vertical,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.horizontal && !self.vertical
    }
}

/// Grid of unsigned sensor samples, row-major
///
/// Immutable once captured. There is no way to modify samples in place; a
/// flipped frame is a new frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    width: u32,
    height: u32,
    bit_depth: u8,
    sequence: u64,
    samples: Vec<u16>,
}

impl RawFrame {
    /// Build a frame, rejecting sample buffers that do not match the dimensions
    pub fn new(
        width: u32,
        height: u32,
        bit_depth: u8,
        sequence: u64,
        samples: Vec<u16>,
    ) -> Result<Self, ReadError> {
        if width == 0 || height == 0 || samples.len() != (width as usize) * (height as usize) {
            return Err(ReadError::MalformedFrame);
        }
        Ok(Self {
            width,
            height,
            bit_depth,
            sequence,
            samples,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bit_depth(&self) -> u8 {
        self.bit_depth
    }

    /// Capture order assigned by the source
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Sample at (x, y)
    pub fn sample(&self, x: u32, y: u32) -> u16 {
        self.samples[(y * self.width + x) as usize]
    }

    /// Mirror the frame according to `flip`
    pub fn flipped(self, flip: Flip) -> Self {
        if flip.is_identity() {
            return self;
        }
        let w = self.width as usize;
        let h = self.height as usize;
        let mut samples = Vec::with_capacity(self.samples.len());
        for y in 0..h {
            let src_y = if flip.vertical { h - 1 - y } else { y };
            let row = &self.samples[src_y * w..(src_y + 1) * w];
            if flip.horizontal {
                samples.extend(row.iter().rev());
            } else {
                samples.extend_from_slice(row);
            }
        }
        Self { samples, ..self }
    }
}

/// Grid of RGB triples, packed `rgb24`, row-major
///
/// Pixel storage is shared and immutable, so cloning hands another sink a
/// read-only view of the same frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorFrame {
    width: u32,
    height: u32,
    sequence: u64,
    lut: LutName,
    data: Arc<[u8]>,
}

impl ColorFrame {
    pub(crate) fn new(width: u32, height: u32, sequence: u64, lut: LutName, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 3);
        Self {
            width,
            height,
            sequence,
            lut,
            data: data.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sequence of the raw frame this was rendered from
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// LUT this frame was rendered with
    pub fn lut(&self) -> LutName {
        self.lut
    }

    /// Packed rgb24 bytes
    pub fn as_rgb(&self) -> &[u8] {
        &self.data
    }

    /// Pixel at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let i = ((y * self.width + x) * 3) as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }
}

/// Controller state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// No active camera
    #[default]
    Idle,
    /// A camera is open and frames are flowing
    Streaming,
    /// The active camera failed unrecoverably; waiting for a reset
    Error,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::Streaming => write!(f, "Streaming"),
            PipelineState::Error => write!(f, "Error"),
        }
    }
}

/// Snapshot of the controller published on every change
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineStatus {
    pub state: PipelineState,
    pub active_camera: Option<CameraIdentity>,
    /// Only ever true while streaming
    pub recording: bool,
    pub lut: LutName,
    pub flip: Flip,
}

impl PipelineStatus {
    /// Display name combining state and recording flag
    pub fn display_name(&self) -> &'static str {
        match (self.state, self.recording) {
            (PipelineState::Idle, _) => "Idle",
            (PipelineState::Streaming, false) => "Streaming",
            (PipelineState::Streaming, true) => "Streaming + Recording",
            (PipelineState::Error, _) => "Error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_model_parsing() {
        assert_eq!("BOSON".parse::<CameraModel>().unwrap(), CameraModel::Boson);
        assert_eq!("lepton3".parse::<CameraModel>().unwrap(), CameraModel::Lepton3);
        assert!(matches!(
            "LEPTON4".parse::<CameraModel>(),
            Err(ConfigError::UnknownCameraType(_))
        ));
    }

    #[test]
    fn test_camera_model_usb_matching() {
        assert!(CameraModel::Boson.matches_usb(0x09cb, 0x4007));
        assert!(!CameraModel::Boson.matches_usb(0x1e4e, 0x0100));
        assert!(CameraModel::Lepton2.matches_usb(0x1e4e, 0x0100));
        assert!(!CameraModel::Lepton3.matches_usb(0x1e4e, 0x0101));
    }

    #[test]
    fn test_raw_frame_rejects_wrong_length() {
        assert_eq!(
            RawFrame::new(4, 4, 8, 0, vec![0; 15]),
            Err(ReadError::MalformedFrame)
        );
        assert!(RawFrame::new(4, 4, 8, 0, vec![0; 16]).is_ok());
    }

    #[test]
    fn test_raw_frame_flip() {
        // 3x2:
        // 0 1 2
        // 3 4 5
        let frame = RawFrame::new(3, 2, 8, 0, vec![0, 1, 2, 3, 4, 5]).unwrap();

        let h = frame.clone().flipped(Flip {
            horizontal: true,
            vertical: false,
        });
        assert_eq!(h.samples(), &[2, 1, 0, 5, 4, 3]);

        let v = frame.clone().flipped(Flip {
            horizontal: false,
            vertical: true,
        });
        assert_eq!(v.samples(), &[3, 4, 5, 0, 1, 2]);

        let both = frame.flipped(Flip {
            horizontal: true,
            vertical: true,
        });
        assert_eq!(both.samples(), &[5, 4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_status_display_name() {
        let status = PipelineStatus {
            state: PipelineState::Streaming,
            active_camera: None,
            recording: true,
            lut: LutName::RedHot,
            flip: Flip::default(),
        };
        assert_eq!(status.display_name(), "Streaming + Recording");
    }
}
