//! Integration tests for the pipeline lifecycle
//!
//! These tests drive a real controller thread with synthetic cameras:
//! - Hotplug attach/detach and the Idle/Streaming/Error states
//! - LUT swaps while streaming
//! - Camera selection and open failures

mod common;

use common::builders::ConfigBuilder;
use common::harness::Harness;
use std::path::Path;
use std::time::Duration;
use thermview::camera::{Fault, SyntheticBackend};
use thermview::colormap::LutName;
use thermview::error::OpenError;
use thermview::pipeline::PipelineMessage;
use thermview::types::{CameraModel, FlipAxis, PipelineState};

#[test]
fn test_attach_streams_with_default_lut() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Boson).build());
    let camera = harness.attach(0);

    let status = harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);
    assert_eq!(status.active_camera.as_ref(), Some(&camera));
    assert_eq!(status.lut, LutName::RedHot);

    harness.wait_for_frames(5);
    let frames = harness.sink.frames();
    assert!(frames.iter().all(|f| f.lut == LutName::RedHot));
    assert!(frames.iter().all(|f| f.single_lut));
    assert!(frames.iter().all(|f| f.dimensions == (640, 512)));
    assert!(frames.windows(2).all(|w| w[0].sequence < w[1].sequence));

    harness.shutdown();
}

#[test]
fn test_lut_swap_applies_to_following_frames_only() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton3).build());
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);
    harness.wait_for_frames(5);

    harness.handle.select_lut(LutName::Viridis);
    harness.wait_for_status("viridis", |s| s.lut == LutName::Viridis);
    harness.wait_for_frames(5);

    let frames = harness.sink.frames();
    assert!(frames.iter().all(|f| f.single_lut), "a frame mixed two LUTs");
    assert_eq!(frames[0].lut, LutName::RedHot);
    assert_eq!(frames.last().map(|f| f.lut), Some(LutName::Viridis));

    // Once the new table shows up the old one never comes back
    let first_viridis = frames
        .iter()
        .position(|f| f.lut == LutName::Viridis)
        .unwrap();
    assert!(frames[first_viridis..].iter().all(|f| f.lut == LutName::Viridis));
}

#[test]
fn test_every_lut_renders() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    for name in [LutName::WhiteHot, LutName::IsothermRed, LutName::Inferno] {
        harness.handle.select_lut(name);
        harness.wait_for_status(name.as_str(), |s| s.lut == name);
        common::wait_until(name.as_str(), || {
            harness.sink.frames().last().is_some_and(|f| f.lut == name)
        });
    }
    assert!(harness.sink.frames().iter().all(|f| f.single_lut));
}

#[test]
fn test_select_lut_by_name_rejects_unknown() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    assert!(harness.handle.select_lut_by_name("sepia").is_err());
    harness.handle.select_lut_by_name("magma").unwrap();
    let status = harness.wait_for_status("magma", |s| s.lut == LutName::Magma);
    assert_eq!(status.state, PipelineState::Idle);
}

#[test]
fn test_camera_of_other_type_is_ignored() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Boson).build());
    let lepton = SyntheticBackend::identity(0, CameraModel::Lepton3);
    harness
        .devices
        .send(thermview::types::DeviceEvent::attached(lepton))
        .unwrap();

    let messages = harness.collect_for(Duration::from_millis(100));
    assert!(!messages.iter().any(|m| matches!(
        m,
        PipelineMessage::Status(s) if s.state == PipelineState::Streaming
    )));
    assert_eq!(harness.backend.open_attempts(), 0);
    assert_eq!(harness.sink.count(), 0);
}

#[test]
fn test_second_camera_is_listed_not_switched_to() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton3).build());
    let first = harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    let second = harness.attach(1);
    let list = harness.wait_for("camera list", |m| {
        matches!(m, PipelineMessage::CameraList(c) if c.len() == 2)
    });
    if let PipelineMessage::CameraList(cameras) = list {
        assert_eq!(cameras, vec![first.clone(), second.clone()]);
    }
    assert!(harness.backend.is_open(&first.device_path));
    assert!(!harness.backend.is_open(&second.device_path));

    harness.handle.select_camera(second.clone());
    let status = harness.wait_for_status("switched", |s| {
        s.active_camera.as_ref() == Some(&second)
    });
    assert_eq!(status.state, PipelineState::Streaming);
    assert!(!harness.backend.is_open(&first.device_path));
    assert!(harness.backend.is_open(&second.device_path));
}

#[test]
fn test_detach_returns_to_idle_without_auto_switch() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton3).build());
    let first = harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);
    let second = harness.attach(1);
    harness.wait_for("camera list", |m| {
        matches!(m, PipelineMessage::CameraList(c) if c.len() == 2)
    });

    harness.unplug(&first);
    let status = harness.wait_for_status("idle", |s| s.state == PipelineState::Idle);
    assert!(status.active_camera.is_none());
    assert!(!harness.backend.is_open(&first.device_path));
    assert!(!harness.backend.is_open(&second.device_path));

    // The remaining camera can still be picked explicitly
    harness.handle.select_camera(second.clone());
    harness.wait_for_status("second streaming", |s| {
        s.state == PipelineState::Streaming && s.active_camera.as_ref() == Some(&second)
    });
}

#[test]
fn test_malformed_frames_escalate_to_error_and_reset_recovers() {
    let harness = Harness::start(
        ConfigBuilder::new(CameraModel::Lepton2)
            .malformed_frame_budget(3)
            .build(),
    );
    let camera = harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.backend.inject_n(Fault::Malformed, 4);
    harness.wait_for("error message", |m| matches!(m, PipelineMessage::Error(_)));
    let status = harness.wait_for_status("error", |s| s.state == PipelineState::Error);
    assert!(status.active_camera.is_none());
    assert!(!harness.backend.is_open(&camera.device_path));

    // Commands that need a camera are refused until reset
    harness.handle.select_camera(camera.clone());
    harness.wait_for("rejection", |m| matches!(m, PipelineMessage::Error(_)));

    harness.handle.reset();
    harness.wait_for_status("idle", |s| s.state == PipelineState::Idle);

    harness.handle.select_camera(camera);
    harness.wait_for_status("streaming again", |s| s.state == PipelineState::Streaming);
}

#[test]
fn test_malformed_frames_within_budget_keep_streaming() {
    let harness = Harness::start(
        ConfigBuilder::new(CameraModel::Lepton2)
            .malformed_frame_budget(3)
            .build(),
    );
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.backend.inject_n(Fault::Malformed, 3);
    harness.wait_for_frames(10);
    let messages = harness.handle.drain();
    assert!(!messages.iter().any(|m| matches!(m, PipelineMessage::Error(_))));
}

#[test]
fn test_permission_denied_is_reported_with_hint() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Boson).build());
    harness.backend.fail_next_open(OpenError::PermissionDenied);
    let camera = harness.attach(0);

    let msg = harness.wait_for("open failure", |m| matches!(m, PipelineMessage::OpenFailed { .. }));
    match msg {
        PipelineMessage::OpenFailed { device, error, hint } => {
            assert_eq!(device, camera.device_path);
            assert_eq!(error, OpenError::PermissionDenied);
            assert!(hint.is_some_and(|h| h.contains("udev")));
        }
        _ => unreachable!(),
    }
    // Not retried
    assert_eq!(harness.backend.open_attempts(), 1);
    assert!(!harness.backend.is_open(Path::new("synthetic://0")));
}

#[test]
fn test_busy_device_is_retried() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    harness.backend.fail_next_open(OpenError::AlreadyOpen);
    harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);
    assert_eq!(harness.backend.open_attempts(), 2);
}

#[test]
fn test_flip_is_reported_in_status() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    harness.handle.toggle_flip(FlipAxis::Horizontal);
    let status = harness.wait_for_status("flipped", |s| s.flip.horizontal);
    assert!(!status.flip.vertical);
}

#[test]
fn test_quit_sends_shutdown_and_closes_camera() {
    let harness = Harness::start(ConfigBuilder::new(CameraModel::Lepton2).build());
    let camera = harness.attach(0);
    harness.wait_for_status("streaming", |s| s.state == PipelineState::Streaming);

    harness.handle.quit();
    harness.wait_for("shutdown", |m| matches!(m, PipelineMessage::Shutdown));
    assert!(!harness.backend.is_open(&camera.device_path));
}
