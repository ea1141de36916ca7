//! Session and stage types

use crate::activity::ActivityEvent;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

/// One record -> analyze -> report cycle
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub video_path: PathBuf,
    pub language: String,
    pub start_time: DateTime<Local>,
    /// Merged log, filled in when recording stops
    pub activity_log: Vec<ActivityEvent>,
}

impl Session {
    pub fn new(video_path: PathBuf, language: &str, start_time: DateTime<Local>) -> Self {
        Self {
            id: Uuid::new_v4(),
            video_path,
            language: language.to_string(),
            start_time,
            activity_log: Vec::new(),
        }
    }
}

/// Current phase of the controller, with the data that phase owns
#[derive(Debug, Default)]
pub enum Stage {
    #[default]
    Idle,
    Recording {
        session: Session,
    },
    Analyzing {
        session: Session,
    },
    Done {
        session: Session,
        report_path: PathBuf,
    },
}

/// Variant of a `Stage` without its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Idle,
    Recording,
    Analyzing,
    Done,
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Idle => StageKind::Idle,
            Stage::Recording { .. } => StageKind::Recording,
            Stage::Analyzing { .. } => StageKind::Analyzing,
            Stage::Done { .. } => StageKind::Done,
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            Stage::Idle => None,
            Stage::Recording { session } | Stage::Analyzing { session } | Stage::Done { session, .. } => {
                Some(session)
            }
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Idle => write!(f, "idle"),
            StageKind::Recording => write!(f, "recording"),
            StageKind::Analyzing => write!(f, "analyzing"),
            StageKind::Done => write!(f, "done"),
        }
    }
}

/// `HH:MM:SS`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
