//! Activity log model
//!
//! An activity log is the time-ordered list of input and focused-window
//! observations made while a session was recording. It is handed to the model
//! next to the video so the analysis can anchor what it sees on screen.

use chrono::{DateTime, Local};

/// What a single activity event observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Click,
    KeyActivity,
    WindowChange,
}

/// A single timestamped observation of user input or focused-window change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Local>,
    pub kind: ActivityKind,
    pub detail: String,
}

impl ActivityEvent {
    pub fn new(timestamp: DateTime<Local>, kind: ActivityKind, detail: impl Into<String>) -> Self {
        Self {
            timestamp,
            kind,
            detail: detail.into(),
        }
    }

    pub fn click(timestamp: DateTime<Local>, x: f64, y: f64) -> Self {
        Self::new(
            timestamp,
            ActivityKind::Click,
            format!("Mouse Click at ({}, {})", x.round() as i64, y.round() as i64),
        )
    }

    /// Keys themselves are never recorded, only that typing happened.
    pub fn key_activity(timestamp: DateTime<Local>) -> Self {
        Self::new(timestamp, ActivityKind::KeyActivity, "Keyboard Activity Detected")
    }

    pub fn window(timestamp: DateTime<Local>, title: Option<&str>) -> Self {
        let detail = match title {
            Some(title) => format!("Active Window: {}", title),
            None => "Active Window: None".to_string(),
        };
        Self::new(timestamp, ActivityKind::WindowChange, detail)
    }

    /// `[HH:MM:SS] detail`, the line format used in the prompt
    pub fn to_log_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.detail)
    }
}

/// Merge input events (`input`) and window events (`windows`) by timestamp.
///
/// The sort is stable: for equal timestamps input events come before window
/// events and each source keeps its own relative order.
pub fn merge_logs(input: Vec<ActivityEvent>, windows: Vec<ActivityEvent>) -> Vec<ActivityEvent> {
    let mut merged = input;
    merged.extend(windows);
    merged.sort_by_key(|event| event.timestamp);
    merged
}

/// Render a log as prompt text, one line per event
pub fn format_log(events: &[ActivityEvent]) -> String {
    events
        .iter()
        .map(ActivityEvent::to_log_line)
        .collect::<Vec<_>>()
        .join("\n")
}
