//! Seams to the platform
//!
//! Screenshot acquisition, video encoding, global input hooks and focused
//! window lookup all live outside this crate. The recorder only talks to them
//! through these traits.

use crate::capture::input::types::InputSignal;
use crate::recorder::channel::RecordingResult;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Pixel layout of a captured frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra,
    Rgba,
}

impl PixelFormat {
    /// Name understood by ffmpeg's `-pixel_format`
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Bgra => "bgra",
            PixelFormat::Rgba => "rgba",
        }
    }
}

/// One raw frame, 4 bytes per pixel
#[derive(Debug)]
pub struct CapturedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Row stride, may include padding
    pub bytes_per_row: u32,
}

/// Size and layout of the frames a source produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

/// Produces raw frames of the primary display
pub trait FrameSource: Send + Sync {
    /// Geometry of the primary display, queried once per session
    fn geometry(&self) -> RecordingResult<FrameGeometry>;

    /// Grab one frame
    fn grab(&self) -> RecordingResult<CapturedFrame>;
}

/// Writes frames into a video container
pub trait VideoEncoder: Send {
    fn write_frame(&mut self, frame: &CapturedFrame) -> RecordingResult<()>;

    fn frame_count(&self) -> u64;

    /// Flush and close the video file, returning its path
    fn finish(self: Box<Self>) -> RecordingResult<PathBuf>;
}

/// Opens a `VideoEncoder` for one session
pub trait EncoderFactory: Send + Sync {
    fn create(
        &self,
        output_path: &Path,
        geometry: FrameGeometry,
        fps: u32,
    ) -> RecordingResult<Box<dyn VideoEncoder>>;
}

/// Callback invoked from the hook's own thread for every notification
pub type InputListener = Arc<dyn Fn(InputSignal) + Send + Sync>;

/// Global mouse/keyboard hook
pub trait InputHook: Send + Sync {
    /// Start delivering notifications to `listener`
    fn attach(&self, listener: InputListener) -> RecordingResult<()>;

    /// Stop delivering. No notification reaches the old listener after this returns.
    fn detach(&self);
}

/// Accessor for the currently focused window
pub trait WindowProbe: Send + Sync {
    /// Title of the focused window, `None` when nothing has focus
    fn active_window_title(&self) -> RecordingResult<Option<String>>;
}

/// The set of platform collaborators a recorder drives
#[derive(Clone)]
pub struct CaptureBackend {
    pub frames: Arc<dyn FrameSource>,
    pub encoders: Arc<dyn EncoderFactory>,
    pub input: Arc<dyn InputHook>,
    pub windows: Arc<dyn WindowProbe>,
}
