//! Video recording
//!
//! A [`Recorder`] owns a dedicated writer thread. Frames are handed over
//! through a bounded queue with `try_send`, so the capture thread never waits
//! on the encoder: when the queue is full the frame is dropped and counted.
//!
//! ```text
//! capture thread ──try_send──► [bounded queue] ──► writer thread ──► VideoEncoder
//! ```
//!
//! An encoder failure is remembered by the writer and reported as
//! [`RecorderError::WriteFailed`] on the next [`Recorder::write`]. Stopping
//! closes the queue, lets the writer drain everything already accepted, and
//! finalizes the file.
//!
//! # Encoders
//!
//! - [`FfmpegEncoderFactory`] - MPEG-4/XVID `.avi` through an `ffmpeg` child process
//! - [`MemoryEncoderFactory`] - Keeps frame metadata in memory (tests, dry runs)

pub mod ffmpeg;
pub mod memory;

pub use ffmpeg::{FfmpegEncoder, FfmpegEncoderFactory};
pub use memory::{MemoryEncoderFactory, RecordedFile};

use crossbeam_channel::{bounded, Sender, TrySendError};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::RecorderError;
use crate::types::ColorFrame;

/// Default recording file name pattern (`strftime`)
pub const FILE_NAME_PATTERN: &str = "flir-%M%H-%d%m%y.avi";

/// Timestamped recording path inside `dir`
pub fn default_recording_path(dir: &Path) -> PathBuf {
    dir.join(chrono::Local::now().format(FILE_NAME_PATTERN).to_string())
}

/// Parameters fixed for the lifetime of one recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingParams {
    pub path: PathBuf,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// Sink for encoded video
#[cfg_attr(test, mockall::automock)]
pub trait VideoEncoder: Send {
    /// Append one frame
    fn write_frame(&mut self, frame: &ColorFrame) -> io::Result<()>;

    /// Flush and close the output. Called exactly once.
    fn finish(&mut self) -> io::Result<()>;
}

/// Creates encoders for new recordings
pub trait EncoderFactory: Send + Sync {
    fn create(&self, params: &RecordingParams) -> Result<Box<dyn VideoEncoder>, RecorderError>;
}

impl<F> EncoderFactory for F
where
    F: Fn(&RecordingParams) -> Result<Box<dyn VideoEncoder>, RecorderError> + Send + Sync,
{
    fn create(&self, params: &RecordingParams) -> Result<Box<dyn VideoEncoder>, RecorderError> {
        self(params)
    }
}

/// Outcome of a finished recording
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub path: PathBuf,
    /// Frames the encoder accepted
    pub frames_written: u64,
    /// Frames dropped because the queue was full
    pub frames_dropped: u64,
    pub duration: Duration,
    /// First encoder error, if the recording ended because of one
    pub error: Option<String>,
}

struct WriterOutcome {
    written: u64,
}

/// One active recording
pub struct Recorder {
    params: RecordingParams,
    queue: Option<Sender<ColorFrame>>,
    writer: Option<JoinHandle<WriterOutcome>>,
    error: Arc<OnceLock<String>>,
    dropped: u64,
    started: Instant,
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("params", &self.params)
            .field("dropped", &self.dropped)
            .field("failed", &self.error.get().is_some())
            .finish()
    }
}

impl Recorder {
    /// Start recording
    ///
    /// The encoder is created before this returns, so a bad path or a missing
    /// `ffmpeg` fails here with [`RecorderError::StartFailed`].
    pub fn start(
        factory: &dyn EncoderFactory,
        params: RecordingParams,
        queue_frames: usize,
    ) -> Result<Self, RecorderError> {
        if params.width == 0 || params.height == 0 {
            return Err(RecorderError::StartFailed(format!(
                "invalid frame size {}x{}",
                params.width, params.height
            )));
        }
        if !(params.fps.is_finite() && params.fps > 0.0) {
            return Err(RecorderError::StartFailed(format!("invalid frame rate {}", params.fps)));
        }

        let mut encoder = factory.create(&params)?;
        let (tx, rx) = bounded::<ColorFrame>(queue_frames.max(1));
        let error = Arc::new(OnceLock::new());
        let writer_error = Arc::clone(&error);
        let path = params.path.clone();

        let writer = std::thread::Builder::new()
            .name("recorder".into())
            .spawn(move || {
                let mut written = 0u64;
                for frame in rx.iter() {
                    if let Err(e) = encoder.write_frame(&frame) {
                        tracing::error!(path = %path.display(), "Encoder write failed: {}", e);
                        let _ = writer_error.set(e.to_string());
                        break;
                    }
                    written += 1;
                }
                // Stop accepting before finalizing so pending try_sends fail fast
                drop(rx);
                if let Err(e) = encoder.finish() {
                    tracing::error!(path = %path.display(), "Encoder finish failed: {}", e);
                    let _ = writer_error.set(e.to_string());
                }
                WriterOutcome { written }
            })
            .map_err(|e| RecorderError::StartFailed(e.to_string()))?;

        tracing::info!(
            path = %params.path.display(),
            width = params.width,
            height = params.height,
            fps = params.fps,
            "Recording started"
        );

        Ok(Self {
            params,
            queue: Some(tx),
            writer: Some(writer),
            error,
            dropped: 0,
            started: Instant::now(),
        })
    }

    pub fn params(&self) -> &RecordingParams {
        &self.params
    }

    pub fn path(&self) -> &Path {
        &self.params.path
    }

    /// Frames dropped so far because the writer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Queue a frame for writing. Never blocks.
    pub fn write(&mut self, frame: &ColorFrame) -> Result<(), RecorderError> {
        if let Some(error) = self.error.get() {
            return Err(RecorderError::WriteFailed(error.clone()));
        }
        let queue = self.queue.as_ref().ok_or(RecorderError::NotStarted)?;
        if frame.dimensions() != (self.params.width, self.params.height) {
            return Err(RecorderError::WriteFailed(format!(
                "frame size {}x{} does not match recording {}x{}",
                frame.width(),
                frame.height(),
                self.params.width,
                self.params.height
            )));
        }

        match queue.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                tracing::debug!(
                    sequence = frame.sequence(),
                    dropped = self.dropped,
                    "Recorder queue full, frame dropped"
                );
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(RecorderError::WriteFailed(
                self.error
                    .get()
                    .cloned()
                    .unwrap_or_else(|| "writer thread exited".to_string()),
            )),
        }
    }

    /// Drain the queue, finalize the file and report what was written
    pub fn stop(mut self) -> RecordingSummary {
        self.finalize()
    }

    fn finalize(&mut self) -> RecordingSummary {
        drop(self.queue.take());
        let written = match self.writer.take().map(JoinHandle::join) {
            Some(Ok(outcome)) => outcome.written,
            Some(Err(_)) => {
                let _ = self.error.set("writer thread panicked".to_string());
                0
            }
            None => 0,
        };

        let summary = RecordingSummary {
            path: self.params.path.clone(),
            frames_written: written,
            frames_dropped: self.dropped,
            duration: self.started.elapsed(),
            error: self.error.get().cloned(),
        };
        tracing::info!(
            path = %summary.path.display(),
            frames = summary.frames_written,
            dropped = summary.frames_dropped,
            "Recording stopped"
        );
        summary
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.writer.is_some() {
            self.finalize();
        }
    }
}
