//! Capture thread
//!
//! One [`CaptureSession`] per open camera. The thread loops read → flip →
//! colormap → present → record at the camera's own pace and reports anything
//! the controller has to act on as a [`CaptureNotice`].
//!
//! The active LUT, flip flags and recorder live in [`SharedState`] behind a
//! single mutex. The LUT and flip are snapshotted once per frame, so a frame
//! is always rendered with exactly one table. Recorder writes happen with the
//! lock held, so the controller can take the recorder out between two frames
//! and never observes a write in progress.

use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use super::processor;
use super::sink::PresentationSink;
use crate::camera::FrameSource;
use crate::colormap::Lut;
use crate::error::{ReadError, RecorderError};
use crate::recorder::Recorder;
use crate::types::{CameraIdentity, Flip};

/// State shared between the controller and the capture thread
#[derive(Debug)]
pub struct SharedState {
    pub lut: Arc<Lut>,
    pub flip: Flip,
    pub recorder: Option<Recorder>,
}

/// Handle to [`SharedState`]
#[derive(Debug, Clone)]
pub struct SharedPipeline(Arc<Mutex<SharedState>>);

impl SharedPipeline {
    pub fn new(lut: Arc<Lut>) -> Self {
        Self(Arc::new(Mutex::new(SharedState {
            lut,
            flip: Flip::default(),
            recorder: None,
        })))
    }

    /// Lock the shared state. A panic on the other side does not poison it
    /// for us: every field is valid on its own.
    pub fn lock(&self) -> MutexGuard<'_, SharedState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What happened in the capture thread
#[derive(Debug)]
pub enum CaptureEvent {
    /// The camera went away mid-read
    Detached,
    /// Too many consecutive bad reads; the last one is attached
    Failed(ReadError),
    /// The recorder rejected a frame and was taken out of the shared state.
    /// The controller finalizes it.
    RecordingFailed {
        error: RecorderError,
        recorder: Recorder,
    },
}

/// A [`CaptureEvent`] tagged with the session it came from
#[derive(Debug)]
pub struct CaptureNotice {
    pub session: u64,
    pub event: CaptureEvent,
}

/// A running capture thread
pub struct CaptureSession {
    id: u64,
    identity: CameraIdentity,
    dimensions: (u32, u32),
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("id", &self.id)
            .field("device", &self.identity.device_path)
            .finish()
    }
}

impl CaptureSession {
    /// Start capturing from `source`
    ///
    /// `budget` is the number of consecutive malformed or stalled reads
    /// tolerated; one more ends the session with [`CaptureEvent::Failed`].
    pub fn spawn(
        id: u64,
        mut source: Box<dyn FrameSource>,
        shared: SharedPipeline,
        sink: Arc<dyn PresentationSink>,
        notices: Sender<CaptureNotice>,
        budget: u32,
    ) -> std::io::Result<Self> {
        let identity = source.identity().clone();
        let dimensions = source.dimensions();
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name(format!("capture-{}", id))
            .spawn(move || {
                let device = source.identity().device_path.clone();
                tracing::debug!(session = id, device = %device.display(), "Capture thread started");

                let notify = |event: CaptureEvent| {
                    let _ = notices.send(CaptureNotice { session: id, event });
                };

                let mut failures = 0u32;
                while !thread_stop.load(Ordering::SeqCst) {
                    let raw = match source.read() {
                        Ok(raw) => raw,
                        Err(ReadError::DeviceDetached) => {
                            tracing::warn!(device = %device.display(), "Camera detached during read");
                            notify(CaptureEvent::Detached);
                            break;
                        }
                        Err(e) => {
                            failures += 1;
                            tracing::warn!(
                                device = %device.display(),
                                failures,
                                budget,
                                "Bad read: {}",
                                e
                            );
                            if failures > budget {
                                notify(CaptureEvent::Failed(e));
                                break;
                            }
                            continue;
                        }
                    };
                    // In-flight frame from a session that is being torn down
                    if thread_stop.load(Ordering::SeqCst) {
                        break;
                    }
                    failures = 0;

                    let (lut, flip) = {
                        let state = shared.lock();
                        (Arc::clone(&state.lut), state.flip)
                    };
                    let frame = processor::apply(&raw.flipped(flip), &lut);
                    sink.show(frame.clone());

                    let failed = {
                        let mut state = shared.lock();
                        match state.recorder.as_mut().map(|r| r.write(&frame)) {
                            Some(Err(error)) => state.recorder.take().map(|r| (error, r)),
                            _ => None,
                        }
                    };
                    if let Some((error, recorder)) = failed {
                        notify(CaptureEvent::RecordingFailed { error, recorder });
                    }
                }

                source.close();
                tracing::debug!(session = id, device = %device.display(), "Capture thread stopped");
            })?;

        Ok(Self {
            id,
            identity,
            dimensions,
            stop,
            thread: Some(thread),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    /// Signal the thread and wait for it; the device is closed when this returns
    ///
    /// Waits for at most one read (bounded by the watchdog).
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!(session = self.id, "Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
