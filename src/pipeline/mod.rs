//! Real-time frame pipeline
//!
//! The pipeline runs on two threads and talks to the outside world through
//! crossbeam channels:
//!
//! ```text
//!                    DeviceEvent            PipelineCommand
//! [SysfsMonitor] ───────────────┐      ┌─────────────── [UI / CLI]
//!                               ▼      ▼
//!                        [PipelineController] ──PipelineMessage──► [UI]
//!                          │ open/close  ▲ CaptureNotice
//!                          ▼             │
//!  [FrameSource] ──► [CaptureSession: flip → apply(LUT)] ──► PresentationSink
//!                                                     └────► Recorder
//! ```
//!
//! - [`PipelineController`] - State machine; the only place state changes
//! - [`CaptureSession`] - Per-camera capture thread
//! - [`processor::apply`] - Raw samples to RGB through a LUT
//! - [`FrameSlot`] - Latest-frame-wins presentation hand-off
//! - [`PipelineHandle`] - UI-side handle for commands and messages
//!
//! # Example
//!
//! ```ignore
//! let slot = Arc::new(FrameSlot::new());
//! let (device_tx, device_rx) = crossbeam_channel::unbounded();
//! let (controller, handle) = PipelineBuilder::new(config)
//!     .backend(Arc::new(SyntheticBackend::new(Duration::from_millis(16))))
//!     .sink(slot.clone())
//!     .build(device_rx);
//!
//! std::thread::spawn(move || controller.run());
//! device_tx.send(DeviceEvent::attached(identity))?;
//! handle.select_lut(LutName::Viridis);
//! ```

pub mod capture;
pub mod controller;
pub mod processor;
pub mod sink;

pub use capture::{CaptureEvent, CaptureNotice, CaptureSession, SharedPipeline, SharedState};
pub use controller::PipelineController;
pub use processor::apply;
pub use sink::{FrameSlot, PresentationSink};

use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::camera::CameraBackend;
use crate::colormap::{ColorMapRegistry, LutName};
use crate::config::AppConfig;
use crate::error::{OpenError, RecorderError, UnknownLut};
use crate::recorder::{EncoderFactory, FfmpegEncoderFactory, RecordingSummary};
use crate::types::{CameraIdentity, DeviceEvent, FlipAxis, PipelineStatus};

/// Command sent from the UI to the controller
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineCommand {
    /// Swap the active LUT; visible from the next processed frame
    SelectLut(LutName),
    /// Switch to another attached camera
    SelectCamera(CameraIdentity),
    /// Start recording, to the given path or a timestamped default
    StartRecording(Option<PathBuf>),
    /// Stop and finalize the active recording
    StopRecording,
    /// Leave the Error state (or drop the active camera) and return to Idle
    Reset,
    /// Toggle mirroring on one axis
    ToggleFlip(FlipAxis),
    /// Stop everything and end the controller loop
    Quit,
}

/// Message sent from the controller to the UI
#[derive(Debug, Clone)]
pub enum PipelineMessage {
    /// State snapshot, sent on every change
    Status(PipelineStatus),
    /// Attached cameras of the requested type, by device path
    CameraList(Vec<CameraIdentity>),
    /// A recording was started at this path
    RecordingStarted(PathBuf),
    /// A recording was finalized
    RecordingStopped(RecordingSummary),
    /// A recording command was rejected, or the recorder failed mid-stream
    RecordingFailed(RecorderError),
    /// A camera could not be opened
    OpenFailed {
        device: PathBuf,
        error: OpenError,
        /// What the user can do about it, when there is something
        hint: Option<String>,
    },
    /// The active camera failed and the pipeline is in the Error state
    Error(String),
    /// The controller loop has exited
    Shutdown,
}

/// UI-side handle to a running controller
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    /// Receiver for controller messages
    pub receiver: Receiver<PipelineMessage>,
    /// Sender for commands to the controller
    pub command_sender: Sender<PipelineCommand>,
    dropped_messages: Arc<AtomicU64>,
}

impl PipelineHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<PipelineMessage> {
        self.receiver.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<PipelineMessage> {
        self.receiver.try_iter().collect()
    }

    /// Messages the controller dropped because this handle fell behind
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Send a command to the controller
    pub fn send_command(&self, cmd: PipelineCommand) -> bool {
        self.command_sender.send(cmd).is_ok()
    }

    pub fn select_lut(&self, lut: LutName) {
        let _ = self.command_sender.send(PipelineCommand::SelectLut(lut));
    }

    /// Select a LUT by (case-insensitive) name
    pub fn select_lut_by_name(&self, name: &str) -> Result<(), UnknownLut> {
        self.select_lut(name.parse()?);
        Ok(())
    }

    pub fn select_camera(&self, identity: CameraIdentity) {
        let _ = self
            .command_sender
            .send(PipelineCommand::SelectCamera(identity));
    }

    pub fn start_recording(&self, path: Option<PathBuf>) {
        let _ = self
            .command_sender
            .send(PipelineCommand::StartRecording(path));
    }

    pub fn stop_recording(&self) {
        let _ = self.command_sender.send(PipelineCommand::StopRecording);
    }

    pub fn reset(&self) {
        let _ = self.command_sender.send(PipelineCommand::Reset);
    }

    pub fn toggle_flip(&self, axis: FlipAxis) {
        let _ = self.command_sender.send(PipelineCommand::ToggleFlip(axis));
    }

    /// Request shutdown
    pub fn quit(&self) {
        let _ = self.command_sender.send(PipelineCommand::Quit);
    }
}

/// Assembles a [`PipelineController`] and its [`PipelineHandle`]
pub struct PipelineBuilder {
    config: AppConfig,
    registry: Option<Arc<ColorMapRegistry>>,
    backend: Option<Arc<dyn CameraBackend>>,
    encoder: Option<Arc<dyn EncoderFactory>>,
    sink: Option<Arc<dyn PresentationSink>>,
}

impl PipelineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            registry: None,
            backend: None,
            encoder: None,
            sink: None,
        }
    }

    /// Use a prebuilt registry (default: built from `[colormap]`)
    pub fn registry(mut self, registry: Arc<ColorMapRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Camera backend (default: V4L2 when compiled in, else synthetic)
    pub fn backend(mut self, backend: Arc<dyn CameraBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Recording encoder (default: ffmpeg)
    pub fn encoder(mut self, encoder: Arc<dyn EncoderFactory>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    /// Presentation sink (default: a fresh [`FrameSlot`] nobody reads)
    pub fn sink(mut self, sink: Arc<dyn PresentationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self, device_events: Receiver<DeviceEvent>) -> (PipelineController, PipelineHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; the controller uses try_send and counts drops
        let (msg_tx, msg_rx) = bounded(1024);
        let dropped_messages = Arc::new(AtomicU64::new(0));

        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ColorMapRegistry::from_config(&self.config.colormap)));
        let backend = self.backend.unwrap_or_else(default_backend);
        let encoder = self.encoder.unwrap_or_else(|| {
            Arc::new(FfmpegEncoderFactory::from_config(&self.config.recording))
        });
        let sink = self.sink.unwrap_or_else(|| Arc::new(FrameSlot::new()));

        let controller = PipelineController::new(
            self.config,
            registry,
            backend,
            encoder,
            sink,
            cmd_rx,
            device_events,
            msg_tx,
            Arc::clone(&dropped_messages),
        );
        let handle = PipelineHandle {
            receiver: msg_rx,
            command_sender: cmd_tx,
            dropped_messages,
        };
        (controller, handle)
    }
}

#[cfg(feature = "camera-v4l2")]
fn default_backend() -> Arc<dyn CameraBackend> {
    Arc::new(crate::camera::V4l2Backend::new())
}

#[cfg(not(feature = "camera-v4l2"))]
fn default_backend() -> Arc<dyn CameraBackend> {
    tracing::warn!("Built without camera-v4l2; only synthetic cameras can be opened");
    Arc::new(crate::camera::SyntheticBackend::new(
        std::time::Duration::from_millis(16),
    ))
}
