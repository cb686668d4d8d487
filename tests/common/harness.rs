//! A running pipeline on synthetic cameras, with helpers to drive it

use crossbeam_channel::{unbounded, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thermview::camera::SyntheticBackend;
use thermview::colormap::{ColorMapRegistry, LutName};
use thermview::config::AppConfig;
use thermview::pipeline::{PipelineBuilder, PipelineHandle, PipelineMessage, PresentationSink};
use thermview::recorder::MemoryEncoderFactory;
use thermview::types::{CameraIdentity, ColorFrame, DeviceEvent, PipelineStatus};

use super::test_timeout;

/// Synthetic frame period used by the harness
pub const FRAME_INTERVAL: Duration = Duration::from_millis(4);

/// What the sink saw of one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SeenFrame {
    pub sequence: u64,
    pub lut: LutName,
    pub dimensions: (u32, u32),
    /// Every checked pixel came from the frame's own LUT
    pub single_lut: bool,
}

/// Sink that keeps a record of every frame and checks its pixels
///
/// The synthetic camera's sample at (x, y) is `(x + y + 2 * sequence) % 256`,
/// so the expected color of every pixel is known.
pub struct CollectingSink {
    registry: ColorMapRegistry,
    frames: Mutex<Vec<SeenFrame>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self {
            registry: ColorMapRegistry::default(),
            frames: Mutex::new(Vec::new()),
        }
    }

    pub fn frames(&self) -> Vec<SeenFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    fn matches_lut(&self, frame: &ColorFrame) -> bool {
        let lut = self.registry.get(frame.lut());
        let shift = frame.sequence() * 2;
        (0..frame.height()).step_by(3).all(|y| {
            (0..frame.width()).step_by(7).all(|x| {
                let sample = ((x as u64 + y as u64 + shift) % 256) as u16;
                frame.pixel(x, y) == lut.color(sample)
            })
        })
    }
}

impl PresentationSink for CollectingSink {
    fn show(&self, frame: ColorFrame) {
        let seen = SeenFrame {
            sequence: frame.sequence(),
            lut: frame.lut(),
            dimensions: frame.dimensions(),
            single_lut: self.matches_lut(&frame),
        };
        self.frames.lock().unwrap().push(seen);
    }
}

/// Controller thread plus the fakes around it
pub struct Harness {
    pub handle: PipelineHandle,
    pub backend: SyntheticBackend,
    pub encoder: MemoryEncoderFactory,
    pub sink: Arc<CollectingSink>,
    pub devices: Sender<DeviceEvent>,
    model: thermview::types::CameraModel,
    thread: Option<JoinHandle<()>>,
}

impl Harness {
    pub fn start(config: AppConfig) -> Self {
        Self::start_with(config, MemoryEncoderFactory::new())
    }

    pub fn start_with(config: AppConfig, encoder: MemoryEncoderFactory) -> Self {
        let model = config.camera.camera_type;
        let backend = SyntheticBackend::new(FRAME_INTERVAL);
        let sink = Arc::new(CollectingSink::new());
        let (devices, device_rx) = unbounded();

        let (controller, handle) = PipelineBuilder::new(config)
            .backend(Arc::new(backend.clone()))
            .encoder(Arc::new(encoder.clone()))
            .sink(sink.clone())
            .build(device_rx);
        let thread = std::thread::spawn(move || controller.run());

        Self {
            handle,
            backend,
            encoder,
            sink,
            devices,
            model,
            thread: Some(thread),
        }
    }

    /// Announce synthetic camera `index` of the configured type
    pub fn attach(&self, index: usize) -> CameraIdentity {
        let identity = SyntheticBackend::identity(index, self.model);
        self.devices
            .send(DeviceEvent::attached(identity.clone()))
            .unwrap();
        identity
    }

    /// Unplug a camera: reads start failing and the hotplug event is sent
    pub fn unplug(&self, identity: &CameraIdentity) {
        self.backend.unplug(&identity.device_path);
        self.devices
            .send(DeviceEvent::detached(identity.clone()))
            .unwrap();
    }

    /// Wait for the first message matching `pred`, discarding the others
    pub fn wait_for(&self, what: &str, pred: impl Fn(&PipelineMessage) -> bool) -> PipelineMessage {
        let deadline = Instant::now() + test_timeout();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.handle.receiver.recv_timeout(remaining) {
                Ok(msg) if pred(&msg) => return msg,
                Ok(_) => {}
                Err(_) => panic!("timed out waiting for {}", what),
            }
        }
    }

    /// Wait for a status snapshot matching `pred`
    pub fn wait_for_status(&self, what: &str, pred: impl Fn(&PipelineStatus) -> bool) -> PipelineStatus {
        match self.wait_for(what, |msg| matches!(msg, PipelineMessage::Status(s) if pred(s))) {
            PipelineMessage::Status(status) => status,
            _ => unreachable!(),
        }
    }

    /// Wait until the sink has seen at least `count` more frames
    pub fn wait_for_frames(&self, count: usize) {
        let target = self.sink.count() + count;
        super::wait_until("frames", || self.sink.count() >= target);
    }

    /// Messages that arrive within `window`
    pub fn collect_for(&self, window: Duration) -> Vec<PipelineMessage> {
        std::thread::sleep(window);
        self.handle.drain()
    }

    /// Quit and wait for the controller thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.handle.quit();
        if let Some(thread) = self.thread.take() {
            thread.join().expect("controller thread panicked");
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.handle.quit();
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
