//! Frame sampling using FFmpeg via ffmpeg-sidecar.

use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel, OutputVideoFrame};
use ffmpeg_sidecar::iter::FfmpegIterator;
use serde::{Deserialize, Serialize};
use shotlist_core::{
    Frame, FrameImage, MediaError, MediaResult, PixelFormat, Result, ShotlistError,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Options for opening a decode session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Frames per second to sample from the video (default: 2.0).
    pub sample_rate: f64,
    /// FFmpeg binary to run. Resolved from `PATH` when unset.
    pub ffmpeg_binary: Option<PathBuf>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            sample_rate: 2.0,
            ffmpeg_binary: None,
        }
    }
}

impl DecodeOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ShotlistError::InvalidConfig(format!(
                "sample_rate must be a positive number, got {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Search PATH for an ffmpeg binary, falling back to the sidecar location.
    pub fn find_ffmpeg_binary() -> PathBuf {
        which::which("ffmpeg").unwrap_or_else(|_| ffmpeg_sidecar::paths::ffmpeg_path())
    }

    fn resolved_binary(&self) -> PathBuf {
        self.ffmpeg_binary
            .clone()
            .unwrap_or_else(Self::find_ffmpeg_binary)
    }
}

/// A decode session yielding frames sampled at a fixed rate.
///
/// Spawns FFmpeg with an `fps` filter and reads raw RGB frames from its
/// stdout. The child process is owned by this value and is killed and reaped
/// when the decoder is dropped, whether iteration finished, failed or was
/// abandoned. Restart by opening a new decoder.
pub struct VideoDecoder {
    path: PathBuf,
    sample_rate: f64,
    child: FfmpegChild,
    events: FfmpegIterator,
    last_error: Option<String>,
    frames_read: u64,
    finished: bool,
    reaped: bool,
}

impl VideoDecoder {
    /// Open a video file for sampling.
    pub fn open<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> MediaResult<Self> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            return Err(MediaError::NotFound { path });
        }
        match std::fs::File::open(&path).and_then(|f| f.metadata()) {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                return Err(MediaError::Unreadable {
                    path,
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "not a regular file",
                    ),
                })
            }
            Err(source) => return Err(MediaError::Unreadable { path, source }),
        }

        let binary = options.resolved_binary();
        let filter = format!("fps={}", options.sample_rate);

        info!(
            video = %path.display(),
            ffmpeg = %binary.display(),
            sample_rate = options.sample_rate,
            "Opening decode session"
        );

        let mut child = FfmpegCommand::new_with_path(&binary)
            .hide_banner()
            .input(&path)
            .args(["-an", "-vf", filter.as_str()])
            .rawvideo()
            .spawn()
            .map_err(|e| MediaError::Spawn {
                binary: binary.clone(),
                message: e.to_string(),
            })?;

        let events = match child.iter() {
            Ok(events) => events,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MediaError::Spawn {
                    binary,
                    message: e.to_string(),
                });
            }
        };

        Ok(Self {
            path,
            sample_rate: options.sample_rate,
            child,
            events,
            last_error: None,
            frames_read: 0,
            finished: false,
            reaped: false,
        })
    }

    /// Get the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sampling rate in frames per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Number of sampled frames yielded so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    #[cfg(test)]
    fn child_id(&mut self) -> u32 {
        self.child.as_inner().id()
    }

    fn corrupt(&mut self, message: String) -> MediaError {
        self.finished = true;
        MediaError::CorruptStream {
            path: self.path.clone(),
            message,
        }
    }

    /// Reap the child at end of stream and turn a failed exit into an error.
    fn finish(&mut self) -> MediaResult<()> {
        self.finished = true;
        let status = self.child.wait().map_err(|e| MediaError::CorruptStream {
            path: self.path.clone(),
            message: format!("failed to wait for ffmpeg: {e}"),
        })?;
        self.reaped = true;

        if status.success() {
            info!(frames = self.frames_read, "Decode session complete");
            return Ok(());
        }

        let message = self
            .last_error
            .take()
            .unwrap_or_else(|| format!("ffmpeg exited with {status}"));
        Err(MediaError::CorruptStream {
            path: self.path.clone(),
            message,
        })
    }
}

/// Turn a raw FFmpeg output frame into a [`Frame`].
///
/// The `fps` filter emits frames on a uniform grid, so the timestamp is
/// `frame_num / sample_rate`.
pub fn frame_from_output(frame: OutputVideoFrame, sample_rate: f64) -> MediaResult<Frame> {
    let format = match frame.pix_fmt.as_str() {
        "rgb24" => PixelFormat::Rgb8,
        "rgba" => PixelFormat::Rgba8,
        "gray" => PixelFormat::Gray8,
        other => {
            return Err(MediaError::InvalidFrame(format!(
                "unsupported pixel format {other}"
            )))
        }
    };
    let image = FrameImage::new(frame.width, frame.height, format, frame.data)?;
    let timestamp = f64::from(frame.frame_num) / sample_rate;
    Ok(Frame::new(timestamp, image))
}

impl Iterator for VideoDecoder {
    type Item = MediaResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            match self.events.next() {
                Some(FfmpegEvent::OutputFrame(frame)) => {
                    let result = frame_from_output(frame, self.sample_rate);
                    match result {
                        Ok(frame) => {
                            self.frames_read += 1;
                            return Some(Ok(frame));
                        }
                        Err(e) => {
                            self.finished = true;
                            return Some(Err(e));
                        }
                    }
                }
                Some(FfmpegEvent::Log(LogLevel::Fatal, message)) => {
                    return Some(Err(self.corrupt(message)));
                }
                Some(FfmpegEvent::Log(LogLevel::Error, message))
                | Some(FfmpegEvent::Error(message)) => {
                    warn!(message = %message, "ffmpeg reported an error");
                    self.last_error = Some(message);
                }
                Some(_) => {}
                None => return self.finish().err().map(Err),
            }
        }
    }
}

impl Drop for VideoDecoder {
    fn drop(&mut self) {
        if !self.reaped {
            if let Err(e) = self.child.kill() {
                debug!(error = %e, "ffmpeg already exited");
            }
            let _ = self.child.wait();
        }
        debug!(
            video = %self.path.display(),
            frames = self.frames_read,
            "Decode session released"
        );
    }
}
