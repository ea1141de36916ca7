//! In-process stand-ins for the platform and the remote model

use crate::activity::ActivityEvent;
use crate::analysis::{AnalysisError, Analyzer, FileState, ModelBackend, RemoteFile};
use crate::capture::input::types::InputSignal;
use crate::capture::traits::{
    CaptureBackend, CapturedFrame, EncoderFactory, FrameGeometry, FrameSource, InputHook, InputListener,
    PixelFormat, VideoEncoder, WindowProbe,
};
use crate::controller::{Notification, SessionObserver, StageKind};
use crate::recorder::channel::{RecordingError, RecordingResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Poll `condition` until it holds or `timeout` passes
fn wait_until(timeout: Duration, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(2));
    }
}

#[derive(Default)]
pub struct FakeInputHook {
    listener: Mutex<Option<InputListener>>,
    attaches: AtomicUsize,
    fail_next: AtomicBool,
}

impl FakeInputHook {
    /// Deliver `signal` the way the platform hook would
    pub fn fire(&self, signal: InputSignal) {
        let listener = self.listener.lock().clone();
        if let Some(listener) = listener {
            listener(signal);
        }
    }

    pub fn is_attached(&self) -> bool {
        self.listener.lock().is_some()
    }

    pub fn attach_count(&self) -> usize {
        self.attaches.load(Ordering::SeqCst)
    }

    pub fn fail_next_attach(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

impl InputHook for FakeInputHook {
    fn attach(&self, listener: InputListener) -> RecordingResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RecordingError::PlatformError("hook refused".to_string()));
        }
        self.attaches.fetch_add(1, Ordering::SeqCst);
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    fn detach(&self) {
        *self.listener.lock() = None;
    }
}

/// Returns scripted results first, then a fixed answer
pub struct FakeWindowProbe {
    script: Mutex<VecDeque<RecordingResult<Option<String>>>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

impl FakeWindowProbe {
    pub fn scripted(script: Vec<RecordingResult<Option<String>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fixed(title: Option<&str>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: title.map(str::to_string),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn wait_until_exhausted(&self, timeout: Duration) {
        wait_until(timeout, || self.script.lock().is_empty());
    }

    pub fn wait_for_calls(&self, n: usize, timeout: Duration) {
        wait_until(timeout, || self.calls() >= n);
    }
}

impl WindowProbe for FakeWindowProbe {
    fn active_window_title(&self) -> RecordingResult<Option<String>> {
        let next = self.script.lock().pop_front();
        self.calls.fetch_add(1, Ordering::SeqCst);
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// Solid frames of a fixed size
pub struct FakeFrameSource {
    width: u32,
    height: u32,
    fail_every: Option<usize>,
    grabs: AtomicUsize,
}

impl FakeFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fail_every: None,
            grabs: AtomicUsize::new(0),
        }
    }

    /// Every `n`th grab fails
    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n.max(1));
        self
    }

    pub fn wait_for_grabs(&self, n: usize, timeout: Duration) {
        wait_until(timeout, || self.grabs.load(Ordering::SeqCst) >= n);
    }
}

impl FrameSource for FakeFrameSource {
    fn geometry(&self) -> RecordingResult<FrameGeometry> {
        Ok(FrameGeometry {
            width: self.width,
            height: self.height,
            pixel_format: PixelFormat::Bgra,
        })
    }

    fn grab(&self) -> RecordingResult<CapturedFrame> {
        let count = self.grabs.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_every.is_some_and(|n| count % n == 0) {
            return Err(RecordingError::CaptureError(format!("grab {} failed", count)));
        }

        Ok(CapturedFrame {
            data: vec![0x7f; (self.width * self.height * 4) as usize],
            width: self.width,
            height: self.height,
            bytes_per_row: self.width * 4,
        })
    }
}

/// Encoders that append raw frame bytes to the output file
#[derive(Default)]
pub struct FakeEncoderFactory {
    created: AtomicUsize,
    finished: Arc<AtomicBool>,
}

impl FakeEncoderFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Whether the last encoder was finished
    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl EncoderFactory for FakeEncoderFactory {
    fn create(
        &self,
        output_path: &Path,
        _geometry: FrameGeometry,
        _fps: u32,
    ) -> RecordingResult<Box<dyn VideoEncoder>> {
        let file = File::create(output_path)?;
        self.created.fetch_add(1, Ordering::SeqCst);
        self.finished.store(false, Ordering::SeqCst);

        Ok(Box::new(FakeEncoder {
            file,
            path: output_path.to_path_buf(),
            frames: 0,
            finished: self.finished.clone(),
        }))
    }
}

struct FakeEncoder {
    file: File,
    path: PathBuf,
    frames: u64,
    finished: Arc<AtomicBool>,
}

impl VideoEncoder for FakeEncoder {
    fn write_frame(&mut self, frame: &CapturedFrame) -> RecordingResult<()> {
        self.file.write_all(&frame.data)?;
        self.frames += 1;
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn finish(mut self: Box<Self>) -> RecordingResult<PathBuf> {
        self.file.flush()?;
        self.finished.store(true, Ordering::SeqCst);
        Ok(self.path.clone())
    }
}

/// Handles to the fakes inside a `fake_backend`
pub struct FakeBackendHandles {
    pub frames: Arc<FakeFrameSource>,
    pub encoders: Arc<FakeEncoderFactory>,
    pub input: Arc<FakeInputHook>,
    pub windows: Arc<FakeWindowProbe>,
}

/// A capture backend made of fakes, with `window_title` always focused
pub fn fake_backend(window_title: Option<&str>) -> (CaptureBackend, FakeBackendHandles) {
    let handles = FakeBackendHandles {
        frames: Arc::new(FakeFrameSource::new(4, 4)),
        encoders: Arc::new(FakeEncoderFactory::default()),
        input: Arc::new(FakeInputHook::default()),
        windows: Arc::new(FakeWindowProbe::fixed(window_title)),
    };

    let backend = CaptureBackend {
        frames: handles.frames.clone(),
        encoders: handles.encoders.clone(),
        input: handles.input.clone(),
        windows: handles.windows.clone(),
    };

    (backend, handles)
}

/// Model backend walking through scripted file states
pub struct FakeModelBackend {
    states: Mutex<VecDeque<FileState>>,
    response: Result<String, String>,
    uploads: AtomicUsize,
    refreshes: AtomicUsize,
    generations: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl FakeModelBackend {
    /// `states[0]` is the state right after upload, each refresh yields the
    /// next one
    pub fn new(states: Vec<FileState>, response: &str) -> Self {
        Self {
            states: Mutex::new(states.into()),
            response: Ok(response.to_string()),
            uploads: AtomicUsize::new(0),
            refreshes: AtomicUsize::new(0),
            generations: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// File becomes active at once, generation fails with `message`
    pub fn failing_generation(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            ..Self::new(vec![FileState::Active], "")
        }
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generations.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.upload_calls() + self.refresh_calls() + self.generate_calls()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().clone()
    }

    fn next_file(&self) -> RemoteFile {
        let state = self.states.lock().pop_front().unwrap_or(FileState::Active);
        RemoteFile {
            name: "files/fake".to_string(),
            uri: "https://example.invalid/files/fake".to_string(),
            mime_type: "video/mp4".to_string(),
            state,
            error: None,
        }
    }
}

#[async_trait]
impl ModelBackend for FakeModelBackend {
    async fn upload(&self, _path: &Path, _mime_type: &str) -> Result<RemoteFile, AnalysisError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_file())
    }

    async fn refresh(&self, _file: &RemoteFile) -> Result<RemoteFile, AnalysisError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        Ok(self.next_file())
    }

    async fn generate(&self, _file: &RemoteFile, prompt: &str) -> Result<String, AnalysisError> {
        self.generations.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.to_string());
        self.response.clone().map_err(AnalysisError::RemoteProcessing)
    }
}

/// Arguments of one `analyze` call
#[derive(Debug, Clone)]
pub struct AnalyzerCall {
    pub video_path: PathBuf,
    pub log: Vec<ActivityEvent>,
    pub language: String,
}

/// Analyzer with a canned answer
pub struct FakeAnalyzer {
    response: Result<String, String>,
    calls: Mutex<Vec<AnalyzerCall>>,
}

impl FakeAnalyzer {
    pub fn replying(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fails with a remote processing error carrying `message`
    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn last_call(&self) -> Option<AnalyzerCall> {
        self.calls.lock().last().cloned()
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(
        &self,
        video_path: &Path,
        activity_log: &[ActivityEvent],
        language: &str,
    ) -> Result<String, AnalysisError> {
        self.calls.lock().push(AnalyzerCall {
            video_path: video_path.to_path_buf(),
            log: activity_log.to_vec(),
            language: language.to_string(),
        });
        self.response.clone().map_err(AnalysisError::RemoteProcessing)
    }
}

/// Keeps every notification it receives
#[derive(Default)]
pub struct RecordingObserver {
    received: Mutex<Vec<Notification>>,
}

impl RecordingObserver {
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().clone()
    }

    pub fn stages(&self) -> Vec<StageKind> {
        self.received
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::StageChanged(kind) => Some(*kind),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Error(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for RecordingObserver {
    fn notify(&self, notification: &Notification) {
        self.received.lock().push(notification.clone());
    }
}
