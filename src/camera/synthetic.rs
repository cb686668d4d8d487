//! Synthetic camera for demo mode and tests
//!
//! [`SyntheticBackend`] produces a moving diagonal gradient at a configurable
//! interval. Faults can be queued from any thread holding a clone of the
//! backend, which makes it possible to drive the controller through every
//! failure path without hardware:
//!
//! ```ignore
//! let backend = SyntheticBackend::new(Duration::from_millis(5));
//! backend.fail_next_open(OpenError::AlreadyOpen);
//! backend.inject(Fault::Malformed);
//! backend.unplug(Path::new("synthetic://0"));
//! ```

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{CameraBackend, FrameSource};
use crate::error::{OpenError, ReadError};
use crate::types::{
    CameraIdentity, CameraModel, RawFrame, FLIR_VENDOR_ID, LEPTON_BRIDGE_PRODUCT_ID,
    LEPTON_BRIDGE_VENDOR_ID,
};

/// Device path prefix of synthetic cameras
pub const SYNTHETIC_SCHEME: &str = "synthetic://";

/// Read-side fault, consumed by the next read of any open synthetic camera
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Return a frame whose buffer does not match its dimensions
    Malformed,
    /// Produce nothing until the watchdog expires
    Stall,
    /// Behave as if the cable was pulled
    Detach,
}

#[derive(Debug, Default)]
struct SyntheticState {
    open_failures: VecDeque<OpenError>,
    read_faults: VecDeque<Fault>,
    open_devices: HashSet<PathBuf>,
    unplugged: HashSet<PathBuf>,
    open_attempts: usize,
    closes: usize,
    frames: u64,
}

/// Backend producing synthetic cameras
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    interval: Duration,
    state: Arc<Mutex<SyntheticState>>,
}

impl SyntheticBackend {
    /// Create a backend whose cameras deliver a frame every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(SyntheticState::default())),
        }
    }

    /// Identity of synthetic camera `index`, carrying the USB ids of `model`
    pub fn identity(index: usize, model: CameraModel) -> CameraIdentity {
        let (vendor_id, product_id) = match model {
            CameraModel::Boson => (FLIR_VENDOR_ID, 0x4007),
            CameraModel::Lepton3 | CameraModel::Lepton2 => {
                (LEPTON_BRIDGE_VENDOR_ID, LEPTON_BRIDGE_PRODUCT_ID)
            }
        };
        let mut identity = CameraIdentity::new(
            vendor_id,
            product_id,
            model,
            format!("{}{}", SYNTHETIC_SCHEME, index),
        );
        identity.product_name = Some(format!("Synthetic {}", model));
        identity
    }

    fn lock(&self) -> MutexGuard<'_, SyntheticState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next open attempt with `error`
    pub fn fail_next_open(&self, error: OpenError) {
        self.lock().open_failures.push_back(error);
    }

    /// Queue a read fault
    pub fn inject(&self, fault: Fault) {
        self.lock().read_faults.push_back(fault);
    }

    /// Queue the same read fault `count` times
    pub fn inject_n(&self, fault: Fault, count: usize) {
        let mut state = self.lock();
        for _ in 0..count {
            state.read_faults.push_back(fault);
        }
    }

    /// Make a device disappear: opens fail with `NotFound`, reads with `DeviceDetached`
    pub fn unplug(&self, device: &Path) {
        self.lock().unplugged.insert(device.to_path_buf());
    }

    /// Undo [`unplug`](Self::unplug)
    pub fn replug(&self, device: &Path) {
        self.lock().unplugged.remove(device);
    }

    /// Whether `device` is currently held open
    pub fn is_open(&self, device: &Path) -> bool {
        self.lock().open_devices.contains(device)
    }

    /// Number of open attempts so far, failed ones included
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Number of handles released
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Frames delivered across all handles
    pub fn frames_produced(&self) -> u64 {
        self.lock().frames
    }
}

impl CameraBackend for SyntheticBackend {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn open(
        &self,
        identity: &CameraIdentity,
        watchdog: Duration,
    ) -> Result<Box<dyn FrameSource>, OpenError> {
        let mut state = self.lock();
        state.open_attempts += 1;
        if !is_synthetic(&identity.device_path) {
            tracing::warn!(
                device = %identity.device_path.display(),
                "Synthetic backend cannot open a real device"
            );
            return Err(OpenError::NotFound);
        }
        if let Some(error) = state.open_failures.pop_front() {
            return Err(error);
        }
        if state.unplugged.contains(&identity.device_path) {
            return Err(OpenError::NotFound);
        }
        if !state.open_devices.insert(identity.device_path.clone()) {
            return Err(OpenError::AlreadyOpen);
        }
        drop(state);

        let (width, height) = identity.model.resolution();
        Ok(Box::new(SyntheticSource {
            identity: identity.clone(),
            backend: self.clone(),
            width,
            height,
            interval: self.interval,
            watchdog,
            sequence: 0,
            next_due: Instant::now(),
            open: true,
        }))
    }
}

/// Whether `device` names a synthetic camera rather than a device node
pub fn is_synthetic(device: &Path) -> bool {
    device
        .to_str()
        .is_some_and(|path| path.starts_with(SYNTHETIC_SCHEME))
}

struct SyntheticSource {
    identity: CameraIdentity,
    backend: SyntheticBackend,
    width: u32,
    height: u32,
    interval: Duration,
    watchdog: Duration,
    sequence: u64,
    next_due: Instant,
    open: bool,
}

impl SyntheticSource {
    fn gradient(&self) -> Vec<u16> {
        let shift = self.sequence * 2;
        let mut samples = Vec::with_capacity((self.width * self.height) as usize);
        for y in 0..self.height as u64 {
            for x in 0..self.width as u64 {
                samples.push(((x + y + shift) % 256) as u16);
            }
        }
        samples
    }
}

impl FrameSource for SyntheticSource {
    fn identity(&self) -> &CameraIdentity {
        &self.identity
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn frame_interval(&self) -> Duration {
        self.interval
    }

    fn read(&mut self) -> Result<RawFrame, ReadError> {
        if !self.open {
            return Err(ReadError::DeviceDetached);
        }

        let fault = {
            let mut state = self.backend.lock();
            if state.unplugged.contains(&self.identity.device_path) {
                return Err(ReadError::DeviceDetached);
            }
            state.read_faults.pop_front()
        };

        match fault {
            Some(Fault::Malformed) => {
                self.sequence += 1;
                let short = vec![0u16; (self.width * self.height) as usize / 2];
                return RawFrame::new(self.width, self.height, 8, self.sequence, short);
            }
            Some(Fault::Stall) => {
                std::thread::sleep(self.watchdog);
                return Err(ReadError::DeviceStalled);
            }
            Some(Fault::Detach) => {
                self.backend.unplug(&self.identity.device_path);
                return Err(ReadError::DeviceDetached);
            }
            None => {}
        }

        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due = Instant::now() + self.interval;

        self.sequence += 1;
        let frame = RawFrame::new(self.width, self.height, 8, self.sequence, self.gradient())?;
        self.backend.lock().frames += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        let mut state = self.backend.lock();
        state.open_devices.remove(&self.identity.device_path);
        state.closes += 1;
        tracing::debug!(device = %self.identity.device_path.display(), "Closed synthetic camera");
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.close();
    }
}
