//! UI-side view of the pipeline
//!
//! [`ViewerState`] is rebuilt from [`PipelineMessage`]s only. The toolbar and
//! status bar read it and return [`AppAction`]s instead of touching the
//! pipeline directly.

use std::path::PathBuf;

use crate::colormap::LutName;
use crate::pipeline::PipelineMessage;
use crate::recorder::RecordingSummary;
use crate::types::{CameraIdentity, Flip, FlipAxis, PipelineState, PipelineStatus};

/// Something the user asked for
#[derive(Debug, Clone, PartialEq)]
pub enum AppAction {
    SelectLut(LutName),
    SelectCamera(CameraIdentity),
    /// Start recording if stopped, stop if recording
    ToggleRecording,
    ToggleFlip(FlipAxis),
    Reset,
    /// Close the window and stop the pipeline
    Exit,
}

/// Everything the UI knows about the pipeline
#[derive(Debug, Clone)]
pub struct ViewerState {
    pub status: PipelineStatus,
    pub cameras: Vec<CameraIdentity>,
    /// Path of the running recording
    pub recording_path: Option<PathBuf>,
    pub last_recording: Option<RecordingSummary>,
    /// Most recent problem worth showing to the user
    pub last_error: Option<String>,
    pub shutdown: bool,
}

impl ViewerState {
    pub fn new(lut: LutName) -> Self {
        Self {
            status: PipelineStatus {
                state: PipelineState::Idle,
                active_camera: None,
                recording: false,
                lut,
                flip: Flip::default(),
            },
            cameras: Vec::new(),
            recording_path: None,
            last_recording: None,
            last_error: None,
            shutdown: false,
        }
    }

    /// Fold one controller message into the view
    pub fn apply(&mut self, msg: PipelineMessage) {
        match msg {
            PipelineMessage::Status(status) => {
                if status.state == PipelineState::Streaming && self.status.state != PipelineState::Streaming {
                    self.last_error = None;
                }
                if !status.recording {
                    self.recording_path = None;
                }
                self.status = status;
            }
            PipelineMessage::CameraList(cameras) => self.cameras = cameras,
            PipelineMessage::RecordingStarted(path) => self.recording_path = Some(path),
            PipelineMessage::RecordingStopped(summary) => {
                if let Some(error) = &summary.error {
                    self.last_error = Some(format!("Recording {}: {}", summary.path.display(), error));
                }
                self.recording_path = None;
                self.last_recording = Some(summary);
            }
            PipelineMessage::RecordingFailed(error) => {
                self.last_error = Some(format!("Recording: {}", error));
            }
            PipelineMessage::OpenFailed { device, error, hint } => {
                self.last_error = Some(match hint {
                    Some(hint) => format!("{}: {} ({})", device.display(), error, hint),
                    None => format!("{}: {}", device.display(), error),
                });
            }
            PipelineMessage::Error(text) => self.last_error = Some(text),
            PipelineMessage::Shutdown => self.shutdown = true,
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.status.state == PipelineState::Streaming
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{OpenError, RecorderError};
    use crate::types::CameraModel;
    use std::time::Duration;

    fn streaming(recording: bool) -> PipelineStatus {
        PipelineStatus {
            state: PipelineState::Streaming,
            active_camera: Some(CameraIdentity::new(0x09cb, 0x4007, CameraModel::Boson, "/dev/video0")),
            recording,
            lut: LutName::RedHot,
            flip: Flip::default(),
        }
    }

    #[test]
    fn test_open_failure_shows_hint() {
        let mut view = ViewerState::new(LutName::RedHot);
        view.apply(PipelineMessage::OpenFailed {
            device: "/dev/video0".into(),
            error: OpenError::PermissionDenied,
            hint: Some("join the video group".into()),
        });
        assert!(view.last_error.as_deref().unwrap().contains("video group"));

        view.apply(PipelineMessage::Status(streaming(false)));
        assert!(view.last_error.is_none());
        assert!(view.is_streaming());
    }

    #[test]
    fn test_recording_path_follows_status() {
        let mut view = ViewerState::new(LutName::RedHot);
        view.apply(PipelineMessage::Status(streaming(true)));
        view.apply(PipelineMessage::RecordingStarted("out.avi".into()));
        assert_eq!(view.recording_path, Some(PathBuf::from("out.avi")));

        view.apply(PipelineMessage::Status(streaming(false)));
        assert!(view.recording_path.is_none());
    }

    #[test]
    fn test_failed_recording_summary_is_reported() {
        let mut view = ViewerState::new(LutName::RedHot);
        view.apply(PipelineMessage::RecordingFailed(RecorderError::WriteFailed("disk full".into())));
        view.apply(PipelineMessage::RecordingStopped(RecordingSummary {
            path: "out.avi".into(),
            frames_written: 10,
            frames_dropped: 0,
            duration: Duration::from_secs(1),
            error: Some("disk full".into()),
        }));
        assert_eq!(view.last_recording.as_ref().map(|s| s.frames_written), Some(10));
        assert!(view.last_error.as_deref().unwrap().contains("disk full"));
    }
}
