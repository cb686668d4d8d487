//! Camera acquisition
//!
//! Everything that touches a camera goes through two traits:
//!
//! - [`CameraBackend`] opens a device for a [`CameraIdentity`]
//! - [`FrameSource`] is the open handle; it yields [`RawFrame`]s
//!
//! The controller only ever holds `Box<dyn FrameSource>`, so the real V4L2
//! backend and the in-process synthetic camera are interchangeable.
//!
//! # Components
//!
//! - [`SysfsMonitor`] - Hotplug detection over `/sys/class/video4linux`
//! - [`SyntheticBackend`] - Scripted camera with injectable faults
//! - [`V4l2Backend`] - Real devices (feature `camera-v4l2`)

pub mod monitor;
pub mod synthetic;
#[cfg(feature = "camera-v4l2")]
pub mod v4l2;

pub use monitor::{diff_scan, scan_devices, MonitorHandle, SysfsMonitor};
pub use synthetic::{Fault, SyntheticBackend, SYNTHETIC_SCHEME};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Backend;

use crate::error::{OpenError, ReadError};
use crate::types::{CameraIdentity, RawFrame};
use std::time::Duration;

/// An open camera
///
/// Implementations must be `Send`: the handle is opened on the controller
/// thread and moved into the capture thread.
pub trait FrameSource: Send {
    /// Camera this handle was opened for
    fn identity(&self) -> &CameraIdentity;

    /// Frame size as (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Expected time between frames
    fn frame_interval(&self) -> Duration;

    /// Block for the next frame
    ///
    /// Never blocks longer than the watchdog timeout given at open; a read
    /// that times out returns [`ReadError::DeviceStalled`].
    fn read(&mut self) -> Result<RawFrame, ReadError>;

    /// Release the device. Safe to call more than once.
    fn close(&mut self);

    /// Whether [`close`](Self::close) has not been called yet
    fn is_open(&self) -> bool;
}

/// Opens cameras
pub trait CameraBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Open `identity`, with reads bounded by `watchdog`
    fn open(
        &self,
        identity: &CameraIdentity,
        watchdog: Duration,
    ) -> Result<Box<dyn FrameSource>, OpenError>;
}

/// Retry policy for [`open_with_retry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Open a camera, retrying transient failures
///
/// `NotFound` and `AlreadyOpen` are retried (a freshly attached device node can
/// take a moment to become usable, and a previous handle may still be closing).
/// `PermissionDenied` is returned immediately.
pub fn open_with_retry(
    backend: &dyn CameraBackend,
    identity: &CameraIdentity,
    watchdog: Duration,
    policy: RetryPolicy,
) -> Result<Box<dyn FrameSource>, OpenError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match backend.open(identity, watchdog) {
            Ok(source) => {
                tracing::info!(
                    device = %identity.device_path.display(),
                    backend = backend.name(),
                    attempt,
                    "Opened camera"
                );
                return Ok(source);
            }
            Err(e) if e.is_retryable() && attempt < attempts => {
                tracing::warn!(
                    device = %identity.device_path.display(),
                    attempt,
                    "Open failed ({}), retrying in {:?}",
                    e,
                    policy.delay
                );
                std::thread::sleep(policy.delay);
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    device = %identity.device_path.display(),
                    attempt,
                    "Open failed: {}",
                    e
                );
                return Err(e);
            }
        }
    }
}
