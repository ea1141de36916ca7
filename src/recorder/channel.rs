//! Recording channel trait
//!
//! A session is recorded by three channels running side by side: the display
//! capture, the input tracker and the focused-window monitor.

use crate::activity::ActivityEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while starting, running or stopping a channel
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Already recording")]
    AlreadyRecording,

    #[error("Capture error: {0}")]
    CaptureError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Platform error: {0}")]
    PlatformError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

pub type RecordingResult<T> = Result<T, RecordingError>;

/// One capture source of a session
///
/// `start` and `stop` are called by the `SessionRecorder` only. A channel
/// that observes user activity hands it over through `take_events` once
/// stopped.
#[async_trait]
pub trait RecordingChannel: Send + Sync {
    /// Short name used in logs ("display", "input", "window")
    fn id(&self) -> &str;

    fn channel_type(&self) -> ChannelType;

    /// Begin capturing. Fails with `AlreadyRecording` when running.
    async fn start(&mut self) -> RecordingResult<()>;

    /// Halt and release files, hooks and threads. A no-op when not running.
    async fn stop(&mut self) -> RecordingResult<()>;

    fn is_recording(&self) -> bool;

    /// Drain what was observed since `start`, oldest first
    fn take_events(&mut self) -> Vec<ActivityEvent> {
        Vec::new()
    }

    /// Files written by the last run
    fn output_files(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelType {
    /// Primary display video
    Display,
    /// Mouse presses and typing
    Input,
    /// Focused window polling
    Window,
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelType::Display => write!(f, "display"),
            ChannelType::Input => write!(f, "input"),
            ChannelType::Window => write!(f, "window"),
        }
    }
}
