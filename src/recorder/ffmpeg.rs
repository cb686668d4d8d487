//! ffmpeg-backed encoder
//!
//! Frames are piped as raw `rgb24` into an `ffmpeg` child process that
//! encodes MPEG-4 Part 2 tagged `XVID` into an `.avi` container.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;

use super::{EncoderFactory, RecordingParams, VideoEncoder};
use crate::config::RecordingConfig;
use crate::error::RecorderError;
use crate::types::ColorFrame;

/// Launches one `ffmpeg` per recording
#[derive(Debug, Clone)]
pub struct FfmpegEncoderFactory {
    ffmpeg_path: PathBuf,
    codec: String,
    fourcc: String,
    quality: u8,
}

impl FfmpegEncoderFactory {
    pub fn from_config(config: &RecordingConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            codec: config.codec.clone(),
            fourcc: config.fourcc.clone(),
            quality: config.quality.clamp(1, 31),
        }
    }

    /// The full ffmpeg command line for `params`
    pub fn command(&self, params: &RecordingParams) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", params.width, params.height))
            .arg("-r")
            .arg(format!("{}", params.fps))
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg(&self.codec)
            .arg("-vtag")
            .arg(&self.fourcc)
            .arg("-q:v")
            .arg(self.quality.to_string())
            .arg(&params.path);
        cmd
    }
}

impl Default for FfmpegEncoderFactory {
    fn default() -> Self {
        Self::from_config(&RecordingConfig::default())
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn create(&self, params: &RecordingParams) -> Result<Box<dyn VideoEncoder>, RecorderError> {
        if let Some(dir) = params.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                return Err(RecorderError::StartFailed(format!(
                    "output directory {} does not exist",
                    dir.display()
                )));
            }
        }

        let mut child = self
            .command(params)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RecorderError::StartFailed(format!(
                    "failed to launch {}: {}",
                    self.ffmpeg_path.display(),
                    e
                ))
            })?;

        let stdin = child.stdin.take();
        let stderr = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                let _ = stderr.read_to_string(&mut text);
                text
            })
        });

        tracing::debug!(path = %params.path.display(), pid = child.id(), "Spawned ffmpeg");
        Ok(Box::new(FfmpegEncoder {
            child,
            stdin,
            stderr,
            finished: false,
        }))
    }
}

/// A running ffmpeg process
pub struct FfmpegEncoder {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: Option<JoinHandle<String>>,
    finished: bool,
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &ColorFrame) -> io::Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "encoder closed"))?;
        stdin.write_all(frame.as_rgb())
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // EOF on stdin makes ffmpeg flush and write the index
        drop(self.stdin.take());
        let status = self.child.wait()?;
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::Other,
                format!("ffmpeg exited with {}: {}", status, stderr.trim()),
            ))
        }
    }
}

impl Drop for FfmpegEncoder {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            tracing::warn!("ffmpeg did not finish cleanly: {}", e);
        }
    }
}
