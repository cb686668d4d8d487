//! Pipeline controller
//!
//! The controller owns the camera lifecycle. It waits on three channels at
//! once (UI commands, hotplug events, capture-thread notices) and handles one
//! message at a time, so every state transition is serialized.
//!
//! # States
//!
//! ```text
//!            Attached (requested type)           Detached / DeviceDetached
//!   Idle ─────────────────────────────► Streaming ─────────────────────────► Idle
//!    ▲                                      │
//!    │ Reset                                │ bad reads beyond budget
//!    └──────────────── Error ◄──────────────┘
//! ```
//!
//! `recording` is a flag on top of Streaming. Leaving Streaming for any
//! reason finalizes the recording first.

use crossbeam_channel::{never, select, unbounded, Receiver, Sender};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::capture::{CaptureEvent, CaptureNotice, CaptureSession, SharedPipeline};
use super::sink::PresentationSink;
use super::{PipelineCommand, PipelineMessage};
use crate::camera::{open_with_retry, CameraBackend, RetryPolicy};
use crate::colormap::{ColorMapRegistry, LutName};
use crate::config::AppConfig;
use crate::error::{OpenError, RecorderError};
use crate::recorder::{default_recording_path, EncoderFactory, Recorder, RecordingParams, RecordingSummary};
use crate::types::{CameraIdentity, DeviceEvent, DeviceEventKind, PipelineState, PipelineStatus};

const PERMISSION_HINT: &str =
    "add a udev rule for the camera or add your user to the 'video' group, then replug";

/// The pipeline state machine
pub struct PipelineController {
    config: AppConfig,
    registry: Arc<ColorMapRegistry>,
    backend: Arc<dyn CameraBackend>,
    encoder: Arc<dyn EncoderFactory>,
    sink: Arc<dyn PresentationSink>,
    shared: SharedPipeline,

    command_rx: Receiver<PipelineCommand>,
    device_rx: Receiver<DeviceEvent>,
    capture_tx: Sender<CaptureNotice>,
    capture_rx: Receiver<CaptureNotice>,
    message_tx: Sender<PipelineMessage>,
    dropped_messages: Arc<AtomicU64>,
    running: Arc<AtomicBool>,

    state: PipelineState,
    /// Attached cameras of the requested type, by device path
    known: BTreeMap<PathBuf, CameraIdentity>,
    session: Option<CaptureSession>,
    next_session: u64,
}

impl PipelineController {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: AppConfig,
        registry: Arc<ColorMapRegistry>,
        backend: Arc<dyn CameraBackend>,
        encoder: Arc<dyn EncoderFactory>,
        sink: Arc<dyn PresentationSink>,
        command_rx: Receiver<PipelineCommand>,
        device_rx: Receiver<DeviceEvent>,
        message_tx: Sender<PipelineMessage>,
        dropped_messages: Arc<AtomicU64>,
    ) -> Self {
        let shared = SharedPipeline::new(registry.get(config.colormap.default_lut));
        let (capture_tx, capture_rx) = unbounded();
        Self {
            config,
            registry,
            backend,
            encoder,
            sink,
            shared,
            command_rx,
            device_rx,
            capture_tx,
            capture_rx,
            message_tx,
            dropped_messages,
            running: Arc::new(AtomicBool::new(true)),
            state: PipelineState::Idle,
            known: BTreeMap::new(),
            session: None,
            next_session: 1,
        }
    }

    /// Get a handle to stop the controller from outside
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Attached cameras of the requested type, in device-path order
    pub fn known_cameras(&self) -> Vec<CameraIdentity> {
        self.known.values().cloned().collect()
    }

    /// Current state snapshot
    pub fn status(&self) -> PipelineStatus {
        let shared = self.shared.lock();
        PipelineStatus {
            state: self.state,
            active_camera: self.session.as_ref().map(|s| s.identity().clone()),
            recording: self.state == PipelineState::Streaming && shared.recorder.is_some(),
            lut: shared.lut.name(),
            flip: shared.flip,
        }
    }

    /// Run until `Quit`, the stop handle is cleared, or the command channel closes
    pub fn run(mut self) {
        tracing::info!("Pipeline controller started");
        self.publish_status();

        let mut device_rx = self.device_rx.clone();
        let command_rx = self.command_rx.clone();
        let capture_rx = self.capture_rx.clone();

        while self.running.load(Ordering::SeqCst) {
            let mut device_closed = false;
            select! {
                recv(command_rx) -> cmd => match cmd {
                    Ok(cmd) => self.handle_command(cmd),
                    Err(_) => self.running.store(false, Ordering::SeqCst),
                },
                recv(device_rx) -> event => match event {
                    Ok(event) => self.handle_device_event(event),
                    Err(_) => device_closed = true,
                },
                recv(capture_rx) -> notice => {
                    if let Ok(notice) = notice {
                        self.handle_capture_notice(notice);
                    }
                },
            }
            if device_closed {
                tracing::warn!("Device event channel closed; hotplug disabled");
                device_rx = never();
            }
        }

        self.shutdown();
        tracing::info!("Pipeline controller stopped");
    }

    /// Handle everything already queued without blocking
    pub fn process_pending(&mut self) {
        loop {
            if let Ok(cmd) = self.command_rx.try_recv() {
                self.handle_command(cmd);
            } else if let Ok(event) = self.device_rx.try_recv() {
                self.handle_device_event(event);
            } else if let Ok(notice) = self.capture_rx.try_recv() {
                self.handle_capture_notice(notice);
            } else {
                break;
            }
        }
    }

    /// Handle one UI command
    pub fn handle_command(&mut self, cmd: PipelineCommand) {
        tracing::debug!(?cmd, state = %self.state, "Command");
        match cmd {
            PipelineCommand::SelectLut(name) => self.select_lut(name),
            PipelineCommand::SelectCamera(identity) => self.select_camera(identity),
            PipelineCommand::StartRecording(path) => self.start_recording(path),
            PipelineCommand::StopRecording => self.stop_recording(),
            PipelineCommand::Reset => self.reset(),
            PipelineCommand::ToggleFlip(axis) => {
                self.shared.lock().flip.toggle(axis);
                self.publish_status();
            }
            PipelineCommand::Quit => self.running.store(false, Ordering::SeqCst),
        }
    }

    /// Handle one hotplug event
    pub fn handle_device_event(&mut self, event: DeviceEvent) {
        let identity = event.identity;
        match event.kind {
            DeviceEventKind::Attached => {
                if identity.model != self.config.camera.camera_type {
                    tracing::debug!(
                        device = %identity.device_path.display(),
                        model = %identity.model,
                        "Ignoring camera of another type"
                    );
                    return;
                }
                self.known.insert(identity.device_path.clone(), identity.clone());
                self.publish_camera_list();

                if self.state == PipelineState::Idle && self.session.is_none() {
                    self.activate(identity);
                } else {
                    tracing::info!(
                        device = %identity.device_path.display(),
                        "Camera attached; available for selection"
                    );
                }
            }
            DeviceEventKind::Detached => {
                if self.known.remove(&identity.device_path).is_some() {
                    self.publish_camera_list();
                }
                if self.is_active(&identity) {
                    tracing::info!(device = %identity.device_path.display(), "Active camera detached");
                    self.teardown();
                    self.state = PipelineState::Idle;
                    self.publish_status();
                }
            }
        }
    }

    fn handle_capture_notice(&mut self, notice: CaptureNotice) {
        let current = self.session.as_ref().map(CaptureSession::id);
        if current != Some(notice.session) {
            tracing::debug!(session = notice.session, "Ignoring notice from an old session");
            // A stale recorder still gets finalized
            if let CaptureEvent::RecordingFailed { recorder, .. } = notice.event {
                let summary = recorder.stop();
                self.send(PipelineMessage::RecordingStopped(summary));
            }
            return;
        }

        match notice.event {
            CaptureEvent::Detached => {
                if let Some(identity) = self.session.as_ref().map(|s| s.identity().clone()) {
                    if self.known.remove(&identity.device_path).is_some() {
                        self.publish_camera_list();
                    }
                }
                self.teardown();
                self.state = PipelineState::Idle;
                self.publish_status();
            }
            CaptureEvent::Failed(error) => {
                let device = self
                    .session
                    .as_ref()
                    .map(|s| s.identity().device_path.display().to_string())
                    .unwrap_or_default();
                tracing::error!(device = %device, "Camera failed: {}", error);
                self.teardown();
                self.state = PipelineState::Error;
                self.send(PipelineMessage::Error(format!(
                    "{}: {} (press Reset to continue)",
                    device, error
                )));
                self.publish_status();
            }
            CaptureEvent::RecordingFailed { error, recorder } => {
                tracing::error!("Recording disabled: {}", error);
                let summary = recorder.stop();
                self.send(PipelineMessage::RecordingFailed(error));
                self.send(PipelineMessage::RecordingStopped(summary));
                self.publish_status();
            }
        }
    }

    fn is_active(&self, identity: &CameraIdentity) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.identity().device_path == identity.device_path)
    }

    fn select_lut(&mut self, name: LutName) {
        let lut = self.registry.get(name);
        self.shared.lock().lut = lut;
        tracing::info!(lut = %name, "LUT selected");
        self.publish_status();
    }

    fn select_camera(&mut self, identity: CameraIdentity) {
        if self.state == PipelineState::Error {
            self.send(PipelineMessage::Error(
                "camera selection ignored: reset the pipeline first".to_string(),
            ));
            return;
        }
        if self.is_active(&identity) {
            self.publish_status();
            return;
        }
        if self.session.is_some() {
            self.teardown();
            self.state = PipelineState::Idle;
        }
        self.known
            .entry(identity.device_path.clone())
            .or_insert_with(|| identity.clone());
        self.activate(identity);
    }

    fn activate(&mut self, identity: CameraIdentity) {
        let watchdog = self.config.camera.watchdog(identity.model.frame_interval());
        let policy = RetryPolicy {
            attempts: self.config.camera.open_retries,
            delay: self.config.camera.open_retry_delay(),
        };

        let source = match open_with_retry(self.backend.as_ref(), &identity, watchdog, policy) {
            Ok(source) => source,
            Err(error) => {
                let hint = (error == OpenError::PermissionDenied).then(|| PERMISSION_HINT.to_string());
                self.send(PipelineMessage::OpenFailed {
                    device: identity.device_path.clone(),
                    error,
                    hint,
                });
                self.state = PipelineState::Idle;
                self.publish_status();
                return;
            }
        };

        let id = self.next_session;
        self.next_session += 1;
        match CaptureSession::spawn(
            id,
            source,
            self.shared.clone(),
            Arc::clone(&self.sink),
            self.capture_tx.clone(),
            self.config.camera.malformed_frame_budget,
        ) {
            Ok(session) => {
                tracing::info!(
                    session = id,
                    device = %identity.device_path.display(),
                    "Streaming"
                );
                self.session = Some(session);
                self.state = PipelineState::Streaming;
            }
            Err(e) => {
                tracing::error!("Failed to spawn capture thread: {}", e);
                self.send(PipelineMessage::Error(format!("capture thread: {}", e)));
                self.state = PipelineState::Idle;
            }
        }
        self.publish_status();
    }

    /// Stop the active session: finalize the recording, then stop the capture
    /// thread (which closes the device). Returns with no session active.
    fn teardown(&mut self) {
        let recorder = self.shared.lock().recorder.take();
        if let Some(mut session) = self.session.take() {
            session.stop();
            self.sink.discard();
        }
        if let Some(recorder) = recorder {
            let summary = recorder.stop();
            self.send(PipelineMessage::RecordingStopped(summary));
        }
    }

    fn start_recording(&mut self, path: Option<PathBuf>) {
        let Some(session) = self.session.as_ref().filter(|_| self.state == PipelineState::Streaming)
        else {
            self.send(PipelineMessage::RecordingFailed(RecorderError::NotStreaming));
            return;
        };
        if self.shared.lock().recorder.is_some() {
            tracing::warn!("StartRecording while already recording");
            self.send(PipelineMessage::RecordingFailed(RecorderError::AlreadyStarted));
            return;
        }

        let (width, height) = session.dimensions();
        let params = RecordingParams {
            path: path.unwrap_or_else(|| default_recording_path(&self.config.recording.output_dir)),
            fps: self.config.recording.fps_for(session.identity().model),
            width,
            height,
        };
        let path = params.path.clone();

        match Recorder::start(self.encoder.as_ref(), params, self.config.recording.queue_frames) {
            Ok(recorder) => {
                self.shared.lock().recorder = Some(recorder);
                self.send(PipelineMessage::RecordingStarted(path));
            }
            Err(error) => {
                tracing::error!(path = %path.display(), "Could not start recording: {}", error);
                self.send(PipelineMessage::RecordingFailed(error));
            }
        }
        self.publish_status();
    }

    fn stop_recording(&mut self) {
        let recorder = self.shared.lock().recorder.take();
        match recorder {
            Some(recorder) => {
                let summary: RecordingSummary = recorder.stop();
                self.send(PipelineMessage::RecordingStopped(summary));
                self.publish_status();
            }
            None => self.send(PipelineMessage::RecordingFailed(RecorderError::NotStarted)),
        }
    }

    fn reset(&mut self) {
        tracing::info!(state = %self.state, "Reset");
        self.teardown();
        self.state = PipelineState::Idle;
        self.publish_status();
    }

    fn shutdown(&mut self) {
        self.teardown();
        self.state = PipelineState::Idle;
        self.publish_status();
        let _ = self.message_tx.try_send(PipelineMessage::Shutdown);
    }

    fn publish_status(&self) {
        let status = self.status();
        self.send(PipelineMessage::Status(status));
    }

    fn publish_camera_list(&self) {
        let cameras = self.known_cameras();
        self.send(PipelineMessage::CameraList(cameras));
    }

    /// Try to send a message, counting it as dropped if the queue is full
    fn send(&self, msg: PipelineMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_commands(&self) -> Vec<PipelineCommand> {
        self.command_rx.try_iter().collect()
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.teardown();
    }
}
