//! V4L2 camera backend
//!
//! Opens `/dev/videoN` with libv4l, asks for the model's resolution and
//! native frame rate, and streams through memory-mapped buffers. Thermal
//! cameras expose one of three useful pixel formats:
//!
//! | FourCC | Layout                 | Sample            | Depth |
//! |--------|------------------------|-------------------|-------|
//! | `GREY` | 1 byte per pixel       | the byte          | 8     |
//! | `YUYV` | 2 bytes per pixel      | luma (even bytes) | 8     |
//! | `Y16 ` | 2 bytes LE per pixel   | the word          | 14    |
//!
//! Boson and Lepton radiometric output uses 14 of the 16 bits, so `Y16`
//! frames are tagged 14-bit and rescaled onto the LUT by the processor.

use ouroboros::self_referencing;
use std::io;
use std::time::Duration;
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use super::{CameraBackend, FrameSource};
use crate::error::{OpenError, ReadError};
use crate::types::{CameraIdentity, RawFrame};

const ENOENT: i32 = 2;
const EPERM: i32 = 1;
const EACCES: i32 = 13;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;

const BUFFER_COUNT: u32 = 4;

/// Significant bits in Boson/Lepton `Y16` output
const Y16_SENSOR_BITS: u8 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelLayout {
    Grey,
    Yuyv,
    Y16,
}

impl PixelLayout {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"GREY" => Some(PixelLayout::Grey),
            b"YUYV" => Some(PixelLayout::Yuyv),
            b"Y16 " => Some(PixelLayout::Y16),
            _ => None,
        }
    }

    /// Bit depth of the samples this layout produces
    fn bit_depth(self) -> u8 {
        match self {
            PixelLayout::Grey | PixelLayout::Yuyv => 8,
            PixelLayout::Y16 => Y16_SENSOR_BITS,
        }
    }

    /// Unpack one captured buffer into samples of [`bit_depth`](Self::bit_depth) bits
    fn samples(self, buf: &[u8], width: u32, height: u32) -> Option<Vec<u16>> {
        let pixels = width as usize * height as usize;
        match self {
            PixelLayout::Grey => {
                if buf.len() < pixels {
                    return None;
                }
                Some(buf[..pixels].iter().map(|&b| b as u16).collect())
            }
            PixelLayout::Yuyv => {
                if buf.len() < pixels * 2 {
                    return None;
                }
                Some(buf[..pixels * 2].iter().step_by(2).map(|&b| b as u16).collect())
            }
            PixelLayout::Y16 => {
                if buf.len() < pixels * 2 {
                    return None;
                }
                let max = (1u16 << Y16_SENSOR_BITS) - 1;
                Some(
                    buf[..pixels * 2]
                        .chunks_exact(2)
                        .map(|px| u16::from_le_bytes([px[0], px[1]]).min(max))
                        .collect(),
                )
            }
        }
    }
}

fn open_error(e: &io::Error) -> OpenError {
    match e.raw_os_error() {
        Some(EPERM) | Some(EACCES) => OpenError::PermissionDenied,
        Some(EBUSY) => OpenError::AlreadyOpen,
        Some(ENOENT) | Some(ENODEV) => OpenError::NotFound,
        _ => match e.kind() {
            io::ErrorKind::PermissionDenied => OpenError::PermissionDenied,
            _ => OpenError::NotFound,
        },
    }
}

fn read_error(e: &io::Error) -> ReadError {
    if e.raw_os_error() == Some(ENODEV) {
        return ReadError::DeviceDetached;
    }
    match e.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ReadError::DeviceStalled,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => ReadError::DeviceDetached,
        _ => ReadError::MalformedFrame,
    }
}

#[self_referencing]
struct V4l2Stream {
    device: Device,
    #[borrows(device)]
    #[not_covariant]
    stream: MmapStream<'this>,
}

/// Backend opening real V4L2 devices
#[derive(Debug, Clone, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn name(&self) -> &str {
        "v4l2"
    }

    fn open(
        &self,
        identity: &CameraIdentity,
        watchdog: Duration,
    ) -> Result<Box<dyn FrameSource>, OpenError> {
        let path = &identity.device_path;
        let device = Device::with_path(path).map_err(|e| open_error(&e))?;

        let (width, height) = identity.model.resolution();
        let mut format = device.format().map_err(|e| open_error(&e))?;
        format.width = width;
        format.height = height;

        let mut negotiated = None;
        for fourcc in [b"GREY", b"YUYV", b"Y16 "] {
            format.fourcc = FourCC::new(fourcc);
            match device.set_format(&format) {
                Ok(actual) if PixelLayout::from_fourcc(actual.fourcc).is_some() => {
                    negotiated = Some(actual);
                    break;
                }
                Ok(actual) => {
                    tracing::debug!(device = %path.display(), "Driver substituted {}", actual.fourcc);
                }
                Err(e) if e.raw_os_error() == Some(EBUSY) => return Err(OpenError::AlreadyOpen),
                Err(e) => {
                    tracing::debug!(device = %path.display(), "set_format {:?} failed: {}", fourcc, e);
                }
            }
        }
        let format = match negotiated {
            Some(format) => format,
            None => {
                // Use whatever the driver is already set to, if we can read it
                let current = device.format().map_err(|e| open_error(&e))?;
                if PixelLayout::from_fourcc(current.fourcc).is_none() {
                    tracing::error!(
                        device = %path.display(),
                        "No supported pixel format (driver offers {})",
                        current.fourcc
                    );
                    return Err(OpenError::NotFound);
                }
                current
            }
        };
        let layout = PixelLayout::from_fourcc(format.fourcc).ok_or(OpenError::NotFound)?;

        let fps = identity.model.native_fps();
        if let Err(e) = device.set_params(&v4l::video::capture::Parameters::with_fps(fps)) {
            tracing::warn!(device = %path.display(), "Failed to set {} fps: {}", fps, e);
        }

        let stream = V4l2StreamTryBuilder {
            device,
            stream_builder: |device: &Device| {
                let mut stream = MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)?;
                stream.set_timeout(watchdog);
                Ok::<_, io::Error>(stream)
            },
        }
        .try_build()
        .map_err(|e| open_error(&e))?;

        tracing::info!(
            device = %path.display(),
            width = format.width,
            height = format.height,
            fourcc = %format.fourcc,
            "V4L2 stream ready"
        );

        Ok(Box::new(V4l2Source {
            identity: identity.clone(),
            width: format.width,
            height: format.height,
            layout,
            interval: identity.model.frame_interval(),
            sequence: 0,
            stream: Some(stream),
        }))
    }
}

struct V4l2Source {
    identity: CameraIdentity,
    width: u32,
    height: u32,
    layout: PixelLayout,
    interval: Duration,
    sequence: u64,
    stream: Option<V4l2Stream>,
}

impl FrameSource for V4l2Source {
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
        let stream = self.stream.as_mut().ok_or(ReadError::DeviceDetached)?;
        let (layout, width, height) = (self.layout, self.width, self.height);
        let samples = stream.with_stream_mut(|stream| match stream.next() {
            Ok((buf, _meta)) => Ok(layout.samples(buf, width, height)),
            Err(e) => Err(read_error(&e)),
        })?;
        self.sequence += 1;
        let samples = samples.ok_or(ReadError::MalformedFrame)?;
        RawFrame::new(width, height, layout.bit_depth(), self.sequence, samples)
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(device = %self.identity.device_path.display(), "Closed V4L2 device");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for V4l2Source {
    fn drop(&mut self) {
        self.close();
    }
}
