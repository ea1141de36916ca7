//! FFmpeg video encoder
//!
//! Raw frames are piped into an `ffmpeg` child process that writes a single
//! H.264 MP4 at a fixed frame rate.

use crate::capture::traits::{CapturedFrame, EncoderFactory, FrameGeometry, VideoEncoder};
use crate::recorder::channel::{RecordingError, RecordingResult};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Opens `FfmpegEncoder`s, checking once per session that ffmpeg is installed
#[derive(Debug, Clone)]
pub struct FfmpegEncoderFactory {
    program: String,
}

impl Default for FfmpegEncoderFactory {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
        }
    }
}

impl FfmpegEncoderFactory {
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl EncoderFactory for FfmpegEncoderFactory {
    fn create(
        &self,
        output_path: &Path,
        geometry: FrameGeometry,
        fps: u32,
    ) -> RecordingResult<Box<dyn VideoEncoder>> {
        if Command::new(&self.program).arg("-version").output().is_err() {
            return Err(RecordingError::ConfigurationError(format!(
                "{} not found. Please install FFmpeg and make sure it is on PATH",
                self.program
            )));
        }

        Ok(Box::new(FfmpegEncoder::spawn(&self.program, output_path, geometry, fps)?))
    }
}

pub struct FfmpegEncoder {
    process: Option<Child>,
    frame_count: u64,
    geometry: FrameGeometry,
    output_path: PathBuf,
}

impl FfmpegEncoder {
    fn spawn(program: &str, output_path: &Path, geometry: FrameGeometry, fps: u32) -> RecordingResult<Self> {
        let args = encoder_args(output_path, geometry, fps);
        let process = Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RecordingError::EncodingError(format!("Failed to start FFmpeg: {}", e)))?;

        tracing::info!(
            "Started FFmpeg encoder: {}x{} @ {}fps, output: {:?}",
            geometry.width,
            geometry.height,
            fps,
            output_path
        );

        Ok(Self {
            process: Some(process),
            frame_count: 0,
            geometry,
            output_path: output_path.to_path_buf(),
        })
    }
}

/// Command line for raw frames on stdin -> H.264 MP4
pub(crate) fn encoder_args(output_path: &Path, geometry: FrameGeometry, fps: u32) -> Vec<String> {
    let video_size = format!("{}x{}", geometry.width, geometry.height);
    let framerate = fps.to_string();
    let output = output_path.to_string_lossy();

    [
        "-y",
        "-loglevel", "error",
        "-nostats",
        "-f", "rawvideo",
        "-pixel_format", geometry.pixel_format.ffmpeg_name(),
        "-video_size", video_size.as_str(),
        "-framerate", framerate.as_str(),
        "-i", "-",
        // yuv420p needs even dimensions
        "-vf", "scale=trunc(iw/2)*2:trunc(ih/2)*2",
        "-c:v", "libx264",
        "-preset", "ultrafast",
        "-pix_fmt", "yuv420p",
        "-movflags", "+faststart",
        &*output,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl VideoEncoder for FfmpegEncoder {
    fn write_frame(&mut self, frame: &CapturedFrame) -> RecordingResult<()> {
        if frame.width != self.geometry.width || frame.height != self.geometry.height {
            return Err(RecordingError::EncodingError(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width, frame.height, self.geometry.width, self.geometry.height
            )));
        }

        let stdin = self
            .process
            .as_mut()
            .and_then(|p| p.stdin.as_mut())
            .ok_or_else(|| RecordingError::EncodingError("encoder already finished".to_string()))?;

        let row_len = frame.width as usize * 4;
        let stride = frame.bytes_per_row as usize;
        let rows = frame.height as usize;
        if stride < row_len || rows == 0 || frame.data.len() < stride * (rows - 1) + row_len {
            return Err(RecordingError::EncodingError(format!(
                "frame buffer too small ({} bytes, stride {})",
                frame.data.len(),
                stride
            )));
        }

        if stride == row_len {
            stdin.write_all(&frame.data[..row_len * rows])?;
        } else {
            // Strip row padding
            for row in frame.data.chunks(stride).take(rows) {
                stdin.write_all(&row[..row_len])?;
            }
        }

        self.frame_count += 1;
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn finish(mut self: Box<Self>) -> RecordingResult<PathBuf> {
        if let Some(mut process) = self.process.take() {
            // Close stdin to signal EOF
            drop(process.stdin.take());
            let output = process.wait_with_output()?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                tracing::error!("FFmpeg exited with status {}: {}", output.status, stderr);
                return Err(RecordingError::EncodingError(format!(
                    "FFmpeg exited with status {}: {}",
                    output.status,
                    stderr.trim()
                )));
            }
        }

        tracing::info!(
            "FFmpeg finished: {} frames, output: {:?}",
            self.frame_count,
            self.output_path
        );
        Ok(self.output_path.clone())
    }
}
