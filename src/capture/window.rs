//! Focused window monitoring
//!
//! Polls the focused window title at a fixed interval and records one
//! window-change event per poll. A failed lookup is logged and skipped.

use crate::activity::ActivityEvent;
use crate::capture::traits::WindowProbe;
use crate::recorder::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use async_trait::async_trait;
use chrono::Local;
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Granularity at which a sleeping loop re-checks its stop flag
const STOP_CHECK_SLICE: Duration = Duration::from_millis(50);

pub struct WindowMonitorChannel {
    id: String,
    probe: Arc<dyn WindowProbe>,
    interval: Duration,
    is_recording: Arc<AtomicBool>,
    events: Arc<ParkingMutex<Vec<ActivityEvent>>>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowMonitorChannel {
    pub fn new(probe: Arc<dyn WindowProbe>, interval: Duration) -> Self {
        Self {
            id: "window".to_string(),
            probe,
            interval,
            is_recording: Arc::new(AtomicBool::new(false)),
            events: Arc::new(ParkingMutex::new(Vec::new())),
            thread_handle: None,
        }
    }
}

fn monitor_loop(
    probe: Arc<dyn WindowProbe>,
    interval: Duration,
    is_recording: Arc<AtomicBool>,
    events: Arc<ParkingMutex<Vec<ActivityEvent>>>,
) {
    tracing::debug!("Window monitor started (interval={:?})", interval);

    while is_recording.load(Ordering::SeqCst) {
        match probe.active_window_title() {
            Ok(title) => events.lock().push(ActivityEvent::window(Local::now(), title.as_deref())),
            Err(e) => tracing::warn!("Failed to read active window: {}", e),
        }

        sleep_while(&is_recording, interval);
    }

    tracing::debug!("Window monitor exited");
}

/// Sleep for `duration`, waking early once `flag` clears
pub(crate) fn sleep_while(flag: &AtomicBool, duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        if !flag.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(STOP_CHECK_SLICE));
    }
}

#[async_trait]
impl RecordingChannel for WindowMonitorChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Window
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }

        self.events.lock().clear();
        self.is_recording.store(true, Ordering::SeqCst);

        let probe = self.probe.clone();
        let interval = self.interval;
        let is_recording = self.is_recording.clone();
        let events = self.events.clone();

        let handle = std::thread::Builder::new()
            .name("window-monitor".to_string())
            .spawn(move || monitor_loop(probe, interval, is_recording, events))
            .map_err(|e| {
                self.is_recording.store(false, Ordering::SeqCst);
                RecordingError::IoError(e)
            })?;

        self.thread_handle = Some(handle);
        tracing::info!("Window monitoring started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.is_recording.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                return Err(RecordingError::CaptureError(
                    "window monitor thread panicked".to_string(),
                ));
            }
        }

        tracing::info!("Window monitoring stopped (events={})", self.events.lock().len());
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    fn take_events(&mut self) -> Vec<ActivityEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn output_files(&self) -> Vec<String> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::ActivityKind;
    use crate::testing::FakeWindowProbe;

    #[tokio::test]
    async fn test_failures_are_skipped_and_missing_window_recorded() {
        let probe = Arc::new(FakeWindowProbe::scripted(vec![
            Ok(Some("Excel".to_string())),
            Err(RecordingError::PlatformError("boom".to_string())),
            Ok(None),
        ]));
        let mut channel = WindowMonitorChannel::new(probe.clone(), Duration::from_millis(5));

        channel.start().await.unwrap();
        probe.wait_until_exhausted(Duration::from_secs(5));
        channel.stop().await.unwrap();

        let events = channel.take_events();
        assert!(events.len() >= 2);
        assert!(events.iter().all(|e| e.kind == ActivityKind::WindowChange));
        assert_eq!(events[0].detail, "Active Window: Excel");
        assert_eq!(events[1].detail, "Active Window: None");
    }

    #[tokio::test]
    async fn test_stop_returns_within_one_interval() {
        let probe = Arc::new(FakeWindowProbe::fixed(Some("Editor")));
        let mut channel = WindowMonitorChannel::new(probe, Duration::from_secs(1));

        channel.start().await.unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        channel.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!channel.is_recording());
    }

    #[test]
    fn test_sleep_while_returns_early_when_flag_clears() {
        let flag = AtomicBool::new(false);
        let started = Instant::now();
        sleep_while(&flag, Duration::from_secs(5));
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
