//! Session recorder
//!
//! Starts and stops the display, input and window channels together and merges
//! what the input and window channels observed into one activity log.

pub mod channel;

use crate::activity::{merge_logs, ActivityEvent};
use crate::capture::{CaptureBackend, DisplayCaptureChannel, InputTrackingChannel, WindowMonitorChannel};
use channel::{ChannelType, RecordingChannel};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use channel::{RecordingError, RecordingResult};

/// Knobs for one recorder
#[derive(Debug, Clone, Copy)]
pub struct RecorderSettings {
    pub fps: u32,
    pub window_poll_interval: Duration,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            fps: 10,
            window_poll_interval: Duration::from_secs(1),
        }
    }
}

/// Owns at most one active recording
pub struct SessionRecorder {
    backend: CaptureBackend,
    settings: RecorderSettings,
    channels: Vec<Box<dyn RecordingChannel>>,
    video_path: Option<PathBuf>,
}

impl SessionRecorder {
    pub fn new(backend: CaptureBackend, settings: RecorderSettings) -> Self {
        Self {
            backend,
            settings,
            channels: Vec::new(),
            video_path: None,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.channels.is_empty()
    }

    /// Video file of the active recording
    pub fn video_path(&self) -> Option<&Path> {
        self.video_path.as_deref()
    }

    /// Start recording into `video_path`.
    ///
    /// Returns `Ok(false)` without side effects when a recording is already
    /// active. If any channel fails to start, the ones already running are
    /// stopped again and the error is returned.
    pub async fn start(&mut self, video_path: &Path) -> RecordingResult<bool> {
        if self.is_active() {
            tracing::debug!("Recorder already active, ignoring start");
            return Ok(false);
        }

        let pending: Vec<Box<dyn RecordingChannel>> = vec![
            Box::new(DisplayCaptureChannel::new(
                self.backend.frames.clone(),
                self.backend.encoders.clone(),
                video_path.to_path_buf(),
                self.settings.fps,
            )),
            Box::new(InputTrackingChannel::new(self.backend.input.clone())),
            Box::new(WindowMonitorChannel::new(
                self.backend.windows.clone(),
                self.settings.window_poll_interval,
            )),
        ];

        let mut started: Vec<Box<dyn RecordingChannel>> = Vec::with_capacity(pending.len());
        for mut channel in pending {
            if let Err(e) = channel.start().await {
                tracing::error!("Failed to start {} channel: {}", channel.id(), e);
                for mut running in started {
                    if let Err(stop_err) = running.stop().await {
                        tracing::warn!("Failed to stop {} channel: {}", running.id(), stop_err);
                    }
                }
                return Err(e);
            }
            started.push(channel);
        }

        self.channels = started;
        self.video_path = Some(video_path.to_path_buf());
        tracing::info!("Recording started: {:?}", video_path);
        Ok(true)
    }

    /// Stop every channel, wait for them to release their resources and
    /// return the merged activity log. A no-op returning an empty log when
    /// nothing is recording.
    pub async fn stop(&mut self) -> RecordingResult<Vec<ActivityEvent>> {
        if !self.is_active() {
            return Ok(Vec::new());
        }

        let mut first_error = None;
        let mut input_events = Vec::new();
        let mut window_events = Vec::new();

        for mut channel in std::mem::take(&mut self.channels) {
            if let Err(e) = channel.stop().await {
                tracing::error!("Failed to stop {} channel: {}", channel.id(), e);
                first_error.get_or_insert(e);
            }

            match channel.channel_type() {
                ChannelType::Input => input_events.extend(channel.take_events()),
                ChannelType::Window => window_events.extend(channel.take_events()),
                ChannelType::Display => {
                    for file in channel.output_files() {
                        tracing::debug!("Display channel wrote {}", file);
                    }
                }
            }
        }

        self.video_path = None;

        if let Some(e) = first_error {
            return Err(e);
        }

        let log = merge_logs(input_events, window_events);
        tracing::info!("Recording stopped ({} activity events)", log.len());
        Ok(log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;
    use crate::capture::InputSignal;
    use crate::testing::{fake_backend, FakeBackendHandles};

    fn settings() -> RecorderSettings {
        RecorderSettings {
            fps: 50,
            window_poll_interval: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_stop_before_start_returns_empty_log() {
        let (backend, _handles) = fake_backend(Some("Excel"));
        let mut recorder = SessionRecorder::new(backend, settings());

        let log = recorder.stop().await.unwrap();
        assert!(log.is_empty());
        assert!(!recorder.is_active());
    }

    #[tokio::test]
    async fn test_second_start_has_no_effect() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, handles) = fake_backend(Some("Excel"));
        let mut recorder = SessionRecorder::new(backend, settings());

        assert!(recorder.start(&dir.path().join("a.mp4")).await.unwrap());
        assert!(!recorder.start(&dir.path().join("b.mp4")).await.unwrap());

        assert_eq!(handles.input.attach_count(), 1);
        assert_eq!(handles.encoders.created(), 1);
        assert_eq!(recorder.video_path(), Some(dir.path().join("a.mp4").as_path()));

        recorder.stop().await.unwrap();
        assert!(!dir.path().join("b.mp4").exists());
    }

    #[tokio::test]
    async fn test_stop_merges_input_and_window_events() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("session.mp4");
        let (backend, FakeBackendHandles { input, windows, .. }) = fake_backend(Some("Excel"));
        let mut recorder = SessionRecorder::new(backend, settings());

        recorder.start(&video).await.unwrap();
        input.fire(InputSignal::MousePress { x: 1.0, y: 2.0 });
        input.fire(InputSignal::KeyPress);
        windows.wait_for_calls(2, Duration::from_secs(5));
        let log = recorder.stop().await.unwrap();

        assert!(video.exists());
        assert!(!recorder.is_active());
        assert!(!input.is_attached());
        assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(log.iter().any(|e| e.kind == ActivityKind::Click));
        assert!(log.iter().any(|e| e.kind == ActivityKind::KeyActivity));
        assert!(log.iter().any(|e| e.detail == "Active Window: Excel"));

        // State is cleared for reuse
        assert!(recorder.stop().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_channel_start_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (backend, handles) = fake_backend(Some("Excel"));
        handles.input.fail_next_attach();
        let mut recorder = SessionRecorder::new(backend, settings());

        let result = recorder.start(&dir.path().join("x.mp4")).await;

        assert!(result.is_err());
        assert!(!recorder.is_active());
        assert!(handles.encoders.finished());
    }
}
