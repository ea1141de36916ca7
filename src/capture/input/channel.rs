use crate::activity::{ActivityEvent, ActivityKind};
use crate::capture::input::types::InputSignal;
use crate::capture::traits::{InputHook, InputListener};
use crate::recorder::channel::{ChannelType, RecordingChannel, RecordingError, RecordingResult};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct InputTrackingChannel {
    id: String,
    hook: Arc<dyn InputHook>,
    is_recording: Arc<AtomicBool>,
    events: Arc<ParkingMutex<Vec<ActivityEvent>>>,
}

impl InputTrackingChannel {
    pub fn new(hook: Arc<dyn InputHook>) -> Self {
        Self {
            id: "input".to_string(),
            hook,
            is_recording: Arc::new(AtomicBool::new(false)),
            events: Arc::new(ParkingMutex::new(Vec::new())),
        }
    }

    fn listener(&self) -> InputListener {
        let is_recording = self.is_recording.clone();
        let events = self.events.clone();

        Arc::new(move |signal: InputSignal| {
            if !is_recording.load(Ordering::SeqCst) {
                return;
            }
            record_signal(&mut events.lock(), signal, Local::now());
        })
    }
}

/// Append the event for `signal`. Key presses within the same second as the
/// previous key-activity entry collapse into it.
pub(crate) fn record_signal(events: &mut Vec<ActivityEvent>, signal: InputSignal, now: DateTime<Local>) {
    match signal {
        InputSignal::MousePress { x, y } => events.push(ActivityEvent::click(now, x, y)),
        InputSignal::KeyPress => {
            let repeated = events.last().is_some_and(|last| {
                last.kind == ActivityKind::KeyActivity && last.timestamp.timestamp() == now.timestamp()
            });
            if !repeated {
                events.push(ActivityEvent::key_activity(now));
            }
        }
    }
}

#[async_trait]
impl RecordingChannel for InputTrackingChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn channel_type(&self) -> ChannelType {
        ChannelType::Input
    }

    async fn start(&mut self) -> RecordingResult<()> {
        if self.is_recording.load(Ordering::SeqCst) {
            return Err(RecordingError::AlreadyRecording);
        }

        // Clear previous buffers
        self.events.lock().clear();

        self.is_recording.store(true, Ordering::SeqCst);
        if let Err(e) = self.hook.attach(self.listener()) {
            self.is_recording.store(false, Ordering::SeqCst);
            return Err(e);
        }

        tracing::info!("Input tracking started");
        Ok(())
    }

    async fn stop(&mut self) -> RecordingResult<()> {
        if !self.is_recording.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.is_recording.store(false, Ordering::SeqCst);
        self.hook.detach();

        tracing::info!("Input tracking stopped (events={})", self.events.lock().len());
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
    use crate::testing::FakeInputHook;
    use chrono::TimeZone;

    #[test]
    fn test_key_presses_collapse_within_a_second() {
        let t0 = Local.with_ymd_and_hms(2024, 5, 2, 10, 0, 1).unwrap();
        let t1 = Local.with_ymd_and_hms(2024, 5, 2, 10, 0, 2).unwrap();
        let mut events = Vec::new();

        record_signal(&mut events, InputSignal::KeyPress, t0);
        record_signal(&mut events, InputSignal::KeyPress, t0);
        record_signal(&mut events, InputSignal::MousePress { x: 5.0, y: 6.0 }, t0);
        record_signal(&mut events, InputSignal::KeyPress, t0);
        record_signal(&mut events, InputSignal::KeyPress, t1);

        let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ActivityKind::KeyActivity,
                ActivityKind::Click,
                ActivityKind::KeyActivity,
                ActivityKind::KeyActivity,
            ]
        );
    }

    #[tokio::test]
    async fn test_signals_only_recorded_while_running() {
        let hook = Arc::new(FakeInputHook::default());
        let mut channel = InputTrackingChannel::new(hook.clone());

        hook.fire(InputSignal::MousePress { x: 1.0, y: 1.0 });
        channel.start().await.unwrap();
        assert!(hook.is_attached());

        hook.fire(InputSignal::MousePress { x: 10.0, y: 20.0 });
        channel.stop().await.unwrap();
        assert!(!hook.is_attached());
        hook.fire(InputSignal::MousePress { x: 3.0, y: 3.0 });

        let events = channel.take_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].detail, "Mouse Click at (10, 20)");
        assert!(channel.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let hook = Arc::new(FakeInputHook::default());
        let mut channel = InputTrackingChannel::new(hook.clone());

        channel.start().await.unwrap();
        assert!(matches!(channel.start().await, Err(RecordingError::AlreadyRecording)));
        assert_eq!(hook.attach_count(), 1);
        channel.stop().await.unwrap();
    }
}
