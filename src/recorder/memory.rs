//! In-memory encoder
//!
//! Keeps the sequence number and LUT of every written frame instead of pixel
//! data. Failure modes are configurable so recording error paths can be
//! exercised without filling a disk.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{EncoderFactory, RecordingParams, VideoEncoder};
use crate::colormap::LutName;
use crate::error::RecorderError;
use crate::types::ColorFrame;

/// What a memory encoder captured for one path
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFile {
    pub params: RecordingParams,
    pub sequences: Vec<u64>,
    pub luts: Vec<LutName>,
    /// Whether `finish` ran
    pub finished: bool,
}

#[derive(Debug, Default)]
struct Shared {
    files: BTreeMap<PathBuf, RecordedFile>,
    fail_after: Option<usize>,
    fail_start: Option<String>,
}

/// Factory for [`MemoryEncoder`]s sharing one store
#[derive(Debug, Clone, Default)]
pub struct MemoryEncoderFactory {
    shared: Arc<Mutex<Shared>>,
    write_delay: Duration,
}

impl MemoryEncoderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per frame, to simulate a slow disk
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encoders created from now on fail after writing `frames` frames
    pub fn fail_after(&self, frames: usize) {
        self.lock().fail_after = Some(frames);
    }

    /// The next encoder creation fails with `StartFailed(reason)`
    pub fn fail_next_start(&self, reason: impl Into<String>) {
        self.lock().fail_start = Some(reason.into());
    }

    /// What was recorded at `path`
    pub fn file(&self, path: &Path) -> Option<RecordedFile> {
        self.lock().files.get(path).cloned()
    }

    /// Every recording made through this factory, by path
    pub fn files(&self) -> Vec<RecordedFile> {
        self.lock().files.values().cloned().collect()
    }
}

impl EncoderFactory for MemoryEncoderFactory {
    fn create(&self, params: &RecordingParams) -> Result<Box<dyn VideoEncoder>, RecorderError> {
        let mut shared = self.lock();
        if let Some(reason) = shared.fail_start.take() {
            return Err(RecorderError::StartFailed(reason));
        }
        shared.files.insert(
            params.path.clone(),
            RecordedFile {
                params: params.clone(),
                sequences: Vec::new(),
                luts: Vec::new(),
                finished: false,
            },
        );
        Ok(Box::new(MemoryEncoder {
            path: params.path.clone(),
            shared: Arc::clone(&self.shared),
            remaining: shared.fail_after,
            write_delay: self.write_delay,
        }))
    }
}

/// Encoder writing into a [`MemoryEncoderFactory`]'s store
pub struct MemoryEncoder {
    path: PathBuf,
    shared: Arc<Mutex<Shared>>,
    remaining: Option<usize>,
    write_delay: Duration,
}

impl VideoEncoder for MemoryEncoder {
    fn write_frame(&mut self, frame: &ColorFrame) -> io::Result<()> {
        if let Some(remaining) = self.remaining.as_mut() {
            if *remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "No space left on device"));
            }
            *remaining -= 1;
        }
        if !self.write_delay.is_zero() {
            std::thread::sleep(self.write_delay);
        }
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = shared.files.get_mut(&self.path) {
            file.sequences.push(frame.sequence());
            file.luts.push(frame.lut());
        }
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        let mut shared = self.shared.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = shared.files.get_mut(&self.path) {
            file.finished = true;
        }
        Ok(())
    }
}
