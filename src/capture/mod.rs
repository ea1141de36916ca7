//! Capture sources of a recording session
//!
//! This module provides the display, input and focused-window channels and
//! the traits they use to reach the platform.

pub mod display;
pub mod encoder;
pub mod input;
pub mod traits;
pub mod window;

#[cfg(feature = "desktop")]
pub mod desktop;

// Re-export traits
pub use traits::{
    CaptureBackend, CapturedFrame, EncoderFactory, FrameGeometry, FrameSource, InputHook, InputListener,
    PixelFormat, VideoEncoder, WindowProbe,
};

pub use display::DisplayCaptureChannel;
pub use encoder::FfmpegEncoderFactory;
pub use input::{InputSignal, InputTrackingChannel};
pub use window::WindowMonitorChannel;
