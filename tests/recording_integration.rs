//! Integration tests for recording
//!
//! These tests validate recording against a running pipeline:
//! - Start/stop and the lifecycle rejections
//! - Finalization when the camera goes away mid-recording
//! - Encoder failures degrading to streaming-only

mod common;

use common::builders::ConfigBuilder;
use common::harness::Harness;
use thermview::error::RecorderError;
use thermview::pipeline::PipelineMessage;
use thermview::recorder::{MemoryEncoderFactory, RecordingSummary};
use thermview::types::{CameraModel, PipelineState};

fn wait_for_stopped(harness: &Harness) -> RecordingSummary {
    match harness.wait_for("recording stopped", |m| {
        matches!(m, PipelineMessage::RecordingStopped(_))
    }) {
        PipelineMessage::RecordingStopped(summary) => summary,
        _ => unreachable!(),
    }
}

fn wait_for_rejection(harness: &Harness) -> RecorderError {
    match harness.wait_for("recording failure", |m| {
        matches!(m, PipelineMessage::RecordingFailed(_))
    }) {
        PipelineMessage::RecordingFailed(error) => error,
        _ => unreachable!(),
    }
}

#[test]
fn test_record_to_default_path_in_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton3).output_dir(dir.path()).build());
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.start_recording(None);
    let path = match harness.wait_for("started", |m| matches!(m, PipelineMessage::RecordingStarted(_))) {
        PipelineMessage::RecordingStarted(path) => path,
        _ => unreachable!(),
    };
    assert_eq!(path.parent(), Some(dir.path()));
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("flir-") && name.ends_with(".avi"), "{}", name);
    harness.wait_for_status("recording", |s| s.recording);

    harness.wait_for_frames(10);
    harness.handle.stop_recording();
    let summary = wait_for_stopped(&harness);
    assert_eq!(summary.path, path);
    assert!(summary.error.is_none());

    let file = harness.encoder.file(&path).unwrap();
    assert!(file.finished);
    assert_eq!(file.sequences.len() as u64, summary.frames_written);
    assert_eq!(file.params.width, 160);
    assert_eq!(file.params.height, 120);
    assert_eq!(file.params.fps, 9.0);
    assert!(file.sequences.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_detach_while_recording_finalizes_file() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).queue_frames(64).build());
    let camera = harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.start_recording(Some("detach.avi".into()));
    harness.wait_for_status("recording", |s| s.recording);
    harness.wait_for_frames(10);

    harness.unplug(&camera);
    let summary = wait_for_stopped(&harness);
    let status = harness.wait_for_status("idle", |s| s.state == PipelineState::Idle);
    assert!(!status.recording);
    assert!(summary.error.is_none());

    // Everything accepted before the detach made it into the file
    let file = harness.encoder.file(std::path::Path::new("detach.avi")).unwrap();
    assert!(file.finished);
    assert!(summary.frames_written >= 9);
    assert_eq!(file.sequences.len() as u64, summary.frames_written);
    let last_shown = harness.sink.frames().last().unwrap().sequence;
    assert!(file.sequences.iter().all(|&s| s <= last_shown));
}

#[test]
fn test_second_start_is_rejected() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.start_recording(Some("first.avi".into()));
    harness.wait_for_status("recording", |s| s.recording);
    harness.handle.start_recording(Some("second.avi".into()));
    assert_eq!(wait_for_rejection(&harness), RecorderError::AlreadyStarted);

    assert!(harness.encoder.file(std::path::Path::new("second.avi")).is_none());
    harness.wait_for_frames(3);
    harness.handle.stop_recording();
    let summary = wait_for_stopped(&harness);
    assert_eq!(summary.path, std::path::PathBuf::from("first.avi"));
}

#[test]
fn test_stop_without_start_is_rejected() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.stop_recording();
    assert_eq!(wait_for_rejection(&harness), RecorderError::NotStarted);
}

#[test]
fn test_start_while_idle_is_rejected() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    harness.handle.start_recording(None);
    assert_eq!(wait_for_rejection(&harness), RecorderError::NotStreaming);
    assert!(harness.encoder.files().is_empty());
}

#[test]
fn test_encoder_failure_keeps_streaming() {
    let encoder = MemoryEncoderFactory::new();
    encoder.fail_after(5);
    let harness = Harness::start_with(ConfigBuilder::new(CameraModel::Lepton2).build(), encoder);
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.start_recording(Some("full.avi".into()));
    let error = wait_for_rejection(&harness);
    assert!(matches!(error, RecorderError::WriteFailed(ref msg) if msg.contains("No space")));
    let summary = wait_for_stopped(&harness);
    assert_eq!(summary.frames_written, 5);
    assert!(summary.error.is_some());

    let status = harness.wait_for_status("streaming only", |s| !s.recording);
    assert_eq!(status.state, PipelineState::Streaming);
    harness.wait_for_frames(5);

    // Recording can be started again afterwards
    harness.handle.start_recording(Some("again.avi".into()));
    harness.wait_for("started again", |m| matches!(m, PipelineMessage::RecordingStarted(_)));
}

#[test]
fn test_encoder_start_failure_is_reported() {
    let encoder = MemoryEncoderFactory::new();
    encoder.fail_next_start("cannot create file");
    let harness = Harness::start_with(ConfigBuilder::new(CameraModel::Lepton2).build(), encoder);
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.start_recording(Some("x.avi".into()));
    assert!(matches!(wait_for_rejection(&harness), RecorderError::StartFailed(_)));
    harness.handle.stop_recording();
    assert_eq!(wait_for_rejection(&harness), RecorderError::NotStarted);
}
