//! # thermview: live false-color viewer for USB thermal cameras
//!
//! Raw intensity frames from a FLIR Boson or Lepton (through a PureThermal
//! bridge) are mapped through a precomputed color LUT, shown in an egui
//! window and optionally recorded to `.avi`.
//!
//! ## Architecture
//!
//! - **Camera**: [`camera::CameraBackend`] opens devices, [`camera::SysfsMonitor`]
//!   turns sysfs changes into hotplug events
//! - **Colormap**: 24 named LUTs built once and shared through `Arc`
//! - **Pipeline**: a controller thread owning the Idle/Streaming/Error state
//!   machine and one capture thread per open camera
//! - **Recorder**: frames queued to a writer thread feeding `ffmpeg`
//! - **Frontend**: eframe/egui viewer talking to the pipeline over crossbeam
//!   channels
//!
//! ## Configuration
//!
//! Settings are read from `--config` or `<config_dir>/thermview/config.toml`:
//!
//! - **Linux**: `~/.config/thermview/config.toml`
//! - **macOS**: `~/Library/Application Support/thermview/config.toml`
//!
//! ## Example
//!
//! ```ignore
//! use thermview::{config::AppConfig, pipeline::{FrameSlot, PipelineBuilder}};
//!
//! let config = AppConfig::load_or_default(None)?;
//! let slot = Arc::new(FrameSlot::new());
//! let (device_tx, device_rx) = crossbeam_channel::unbounded();
//! let _monitor = SysfsMonitor::from_config(&config.camera).spawn(device_tx)?;
//!
//! let (controller, handle) = PipelineBuilder::new(config)
//!     .sink(slot.clone())
//!     .build(device_rx);
//! std::thread::spawn(move || controller.run());
//! handle.select_lut(LutName::Viridis);
//! ```

pub mod camera;
pub mod colormap;
pub mod config;
pub mod error;
pub mod frontend;
pub mod pipeline;
pub mod recorder;
pub mod types;

// Re-export commonly used types
pub use colormap::{ColorMapRegistry, Lut, LutName};
pub use config::AppConfig;
pub use error::{Result, ThermviewError};
pub use frontend::ThermviewApp;
pub use pipeline::{PipelineBuilder, PipelineCommand, PipelineController, PipelineHandle, PipelineMessage};
pub use types::{CameraIdentity, CameraModel, ColorFrame, PipelineState, RawFrame};
