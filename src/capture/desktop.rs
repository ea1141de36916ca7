//! Desktop implementations of the capture seams
//!
//! `xcap` grabs the primary monitor and finds the focused window, `rdev`
//! delivers global mouse and keyboard presses. Enabled with the `desktop`
//! feature.

use crate::capture::encoder::FfmpegEncoderFactory;
use crate::capture::input::types::InputSignal;
use crate::capture::traits::{
    CaptureBackend, CapturedFrame, FrameGeometry, FrameSource, InputHook, InputListener, PixelFormat, WindowProbe,
};
use crate::recorder::channel::{RecordingError, RecordingResult};
use parking_lot::Mutex as ParkingMutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Once};
use xcap::{Monitor, Window};

/// Capture backend wired to the real desktop
pub fn desktop_backend() -> CaptureBackend {
    CaptureBackend {
        frames: Arc::new(PrimaryMonitorSource),
        encoders: Arc::new(FfmpegEncoderFactory::default()),
        input: Arc::new(RdevInputHook),
        windows: Arc::new(FocusedWindowProbe),
    }
}

/// Frames of the primary monitor
pub struct PrimaryMonitorSource;

impl PrimaryMonitorSource {
    fn primary() -> RecordingResult<Monitor> {
        let monitors = Monitor::all()
            .map_err(|e| RecordingError::CaptureError(format!("Failed to enumerate monitors: {}", e)))?;

        let mut fallback = None;
        for monitor in monitors {
            if monitor.is_primary().unwrap_or(false) {
                return Ok(monitor);
            }
            fallback.get_or_insert(monitor);
        }

        fallback.ok_or_else(|| RecordingError::CaptureError("No monitors found".to_string()))
    }
}

impl FrameSource for PrimaryMonitorSource {
    fn geometry(&self) -> RecordingResult<FrameGeometry> {
        let image = Self::primary()?
            .capture_image()
            .map_err(|e| RecordingError::CaptureError(format!("Failed to capture screen: {}", e)))?;

        Ok(FrameGeometry {
            width: image.width(),
            height: image.height(),
            pixel_format: PixelFormat::Rgba,
        })
    }

    fn grab(&self) -> RecordingResult<CapturedFrame> {
        let image = Self::primary()?
            .capture_image()
            .map_err(|e| RecordingError::CaptureError(format!("Failed to capture screen: {}", e)))?;

        let width = image.width();
        let height = image.height();
        Ok(CapturedFrame {
            data: image.into_raw(),
            width,
            height,
            bytes_per_row: width * 4,
        })
    }
}

/// Title of the focused window via `xcap`
pub struct FocusedWindowProbe;

impl WindowProbe for FocusedWindowProbe {
    fn active_window_title(&self) -> RecordingResult<Option<String>> {
        let windows = Window::all()
            .map_err(|e| RecordingError::PlatformError(format!("Failed to list windows: {}", e)))?;

        Ok(windows
            .iter()
            .find(|w| w.is_focused().unwrap_or(false))
            .and_then(|w| w.title().ok()))
    }
}

/// Listener currently receiving hook notifications.
/// `rdev::listen` blocks forever and cannot be cancelled, so one listener
/// thread is spawned for the process and sessions swap the listener.
static LISTENER: ParkingMutex<Option<InputListener>> = parking_lot::const_mutex(None);
static LISTENER_THREAD: Once = Once::new();
/// Set when `rdev::listen` has returned; it is never restarted
static LISTENER_FAILED: AtomicBool = AtomicBool::new(false);
static MOUSE_X: AtomicI32 = AtomicI32::new(0);
static MOUSE_Y: AtomicI32 = AtomicI32::new(0);

/// Global input hook backed by `rdev`
pub struct RdevInputHook;

impl InputHook for RdevInputHook {
    fn attach(&self, listener: InputListener) -> RecordingResult<()> {
        listener_alive(&LISTENER_FAILED)?;
        *LISTENER.lock() = Some(listener);

        let mut spawn_error = None;
        LISTENER_THREAD.call_once(|| {
            let spawned = std::thread::Builder::new()
                .name("input-hook".to_string())
                .spawn(run_listener);
            if let Err(e) = spawned {
                spawn_error = Some(e);
            }
        });

        match spawn_error {
            Some(e) => {
                *LISTENER.lock() = None;
                Err(RecordingError::IoError(e))
            }
            None => Ok(()),
        }
    }

    fn detach(&self) {
        *LISTENER.lock() = None;
    }
}

fn run_listener() {
    use rdev::{listen, Event, EventType};

    tracing::debug!("Starting rdev listener");

    let callback = |event: Event| {
        let signal = match event.event_type {
            EventType::MouseMove { x, y } => {
                MOUSE_X.store(x as i32, Ordering::Relaxed);
                MOUSE_Y.store(y as i32, Ordering::Relaxed);
                return;
            }
            EventType::ButtonPress(_) => InputSignal::MousePress {
                x: MOUSE_X.load(Ordering::Relaxed) as f64,
                y: MOUSE_Y.load(Ordering::Relaxed) as f64,
            },
            EventType::KeyPress(_) => InputSignal::KeyPress,
            _ => return,
        };

        if let Some(listener) = LISTENER.lock().as_ref() {
            listener(signal);
        }
    };

    match listen(callback) {
        Err(error) => tracing::error!("Global input hook failed: {:?}", error),
        Ok(()) => tracing::error!("Global input hook exited"),
    }
    LISTENER_FAILED.store(true, Ordering::SeqCst);
    *LISTENER.lock() = None;
}

fn listener_alive(failed: &AtomicBool) -> RecordingResult<()> {
    if failed.load(Ordering::SeqCst) {
        return Err(RecordingError::PlatformError(
            "Global input hook is not running (missing permission or unsupported session)".to_string(),
        ));
    }
    Ok(())
}
