//! Display capture channel
//!
//! Grabs frames of the primary display at a fixed rate on a background thread
//! and feeds them to a video encoder. The encoder is finished on that same
//! thread, so once `stop` returns the video file is closed.

use crate::capture::traits::{EncoderFactory, FrameSource, VideoEncoder};
use crate::capture::window::sleep_while;
use crate::recorder::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use async_trait::async_trait;
use parking_lot::Mutex as ParkingMutex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub struct DisplayCaptureChannel {
    /// Channel identifier
    id: String,

    /// Where frames come from
    source: Arc<dyn FrameSource>,

    /// Opens the encoder for this session
    encoders: Arc<dyn EncoderFactory>,

    /// Video file to produce
    output_path: PathBuf,

    /// Capture FPS
    fps: u32,

    /// Whether currently recording
    is_recording: Arc<AtomicBool>,

    /// Output files created
    output_files: Arc<ParkingMutex<Vec<String>>>,

    /// Capture loop, yields the finished video path
    thread_handle: Option<JoinHandle<RecordingResult<PathBuf>>>,
}

impl DisplayCaptureChannel {
    pub fn new(
        source: Arc<dyn FrameSource>,
        encoders: Arc<dyn EncoderFactory>,
        output_path: PathBuf,
        fps: u32,
    ) -> Self {
        Self {
            id: "display".to_string(),
            source,
            encoders,
            output_path,
            fps: fps.max(1),
            is_recording: Arc::new(AtomicBool::new(false)),
            output_files: Arc::new(ParkingMutex::new(Vec::new())),
            thread_handle: None,
        }
    }
}

fn capture_loop(
    source: Arc<dyn FrameSource>,
    mut encoder: Box<dyn VideoEncoder>,
    fps: u32,
    is_recording: Arc<AtomicBool>,
) -> RecordingResult<PathBuf> {
    let frame_duration = Duration::from_secs_f64(1.0 / fps as f64);

    while is_recording.load(Ordering::SeqCst) {
        let frame_start = Instant::now();

        match source.grab() {
            Ok(frame) => {
                if let Err(e) = encoder.write_frame(&frame) {
                    tracing::error!("Encoder rejected frame, ending capture: {}", e);
                    break;
                }
                let count = encoder.frame_count();
                if count % (fps as u64 * 10) == 0 {
                    tracing::debug!(
                        "Captured {} frames ({:.1}s) at {}x{}",
                        count,
                        count as f64 / fps as f64,
                        frame.width,
                        frame.height
                    );
                }
            }
            Err(e) => tracing::warn!("Frame grab failed, skipping: {}", e),
        }

        sleep_while(&is_recording, frame_duration.saturating_sub(frame_start.elapsed()));
    }

    encoder.finish()
}

#[async_trait]
impl RecordingChannel for DisplayCaptureChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Display
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }

        if let Some(parent) = self.output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Resolution is fixed for the whole session
        let geometry = self.source.geometry()?;
        let encoder = self.encoders.create(&self.output_path, geometry, self.fps)?;

        self.output_files.lock().clear();
        self.is_recording.store(true, Ordering::SeqCst);

        let source = self.source.clone();
        let fps = self.fps;
        let is_recording = self.is_recording.clone();

        let handle = std::thread::Builder::new()
            .name("display-capture".to_string())
            .spawn(move || capture_loop(source, encoder, fps, is_recording))
            .map_err(|e| {
                self.is_recording.store(false, Ordering::SeqCst);
                RecordingError::IoError(e)
            })?;
        self.thread_handle = Some(handle);

        tracing::info!(
            "Display capture started ({}x{} @ {}fps) -> {:?}",
            geometry.width,
            geometry.height,
            self.fps,
            self.output_path
        );
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.is_recording.store(false, Ordering::SeqCst);

        let Some(handle) = self.thread_handle.take() else {
            return Ok(());
        };

        let path = handle
            .join()
            .map_err(|_| RecordingError::CaptureError("capture thread panicked".to_string()))??;
        self.output_files.lock().push(path.to_string_lossy().to_string());

        tracing::info!("Display capture stopped");
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    fn output_files(&self) -> Vec<String> {
        self.output_files.lock().clone()
    }
}
