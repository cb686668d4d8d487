//! Presentation hand-off
//!
//! The capture thread calls [`PresentationSink::show`] once per processed
//! frame and must never wait on the display. [`FrameSlot`] is the standard
//! sink: a single slot where an untaken frame is overwritten by the next one,
//! so a slow display always sees the newest frame and memory stays bounded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

use crate::types::ColorFrame;

/// Receiver of processed frames
pub trait PresentationSink: Send + Sync {
    /// Hand over one frame. Must not block.
    fn show(&self, frame: ColorFrame);

    /// Drop any frame not yet presented. Called when a camera session ends.
    fn discard(&self) {}
}

type Waker = Box<dyn Fn() + Send + Sync>;

/// Latest-frame-wins slot
#[derive(Default)]
pub struct FrameSlot {
    latest: Mutex<Option<ColorFrame>>,
    shown: AtomicU64,
    dropped: AtomicU64,
    waker: OnceLock<Waker>,
}

impl std::fmt::Debug for FrameSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSlot")
            .field("shown", &self.shown())
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `waker` after every new frame (e.g. to request a repaint).
    /// Only the first waker set is kept.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        let _ = self.waker.set(Box::new(waker));
    }

    /// Take the newest frame, if one arrived since the last take
    pub fn take(&self) -> Option<ColorFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Frames handed to the slot
    pub fn shown(&self) -> u64 {
        self.shown.load(Ordering::Relaxed)
    }

    /// Frames overwritten before anyone took them
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl PresentationSink for FrameSlot {
    fn show(&self, frame: ColorFrame) {
        let replaced = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(frame);
        self.shown.fetch_add(1, Ordering::Relaxed);
        if replaced.is_some() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        if let Some(waker) = self.waker.get() {
            waker();
        }
    }

    fn discard(&self) {
        let stale = self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(frame) = stale {
            tracing::debug!(sequence = frame.sequence(), "Discarded undisplayed frame");
        }
    }
}
