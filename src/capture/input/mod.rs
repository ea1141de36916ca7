//! Input tracking (mouse, keyboard)
//!
//! Implements a `RecordingChannel` that turns global hook notifications into
//! click and key-activity events. Key identities are never stored.

pub mod channel;
pub mod types;

pub use channel::InputTrackingChannel;
pub use types::InputSignal;
