//! Remote analysis of a finished recording
//!
//! The video is uploaded to the hosted model, polled until the remote side has
//! processed it, and then sent with the prompt in a single generation request.

pub mod gemini;
pub mod prompt;

use crate::activity::ActivityEvent;
use crate::config::AppConfig;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub use gemini::GeminiBackend;
pub use prompt::build_prompt;

const VIDEO_MIME_TYPE: &str = "video/mp4";

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Video file not found at: {0:?}")]
    ResourceNotFound(PathBuf),

    #[error("Remote processing failed: {0}")]
    RemoteProcessing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Processing state of an uploaded file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Processing,
    Active,
    Failed,
    Unspecified,
}

impl FileState {
    pub fn from_api(state: &str) -> Self {
        match state {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Unspecified,
        }
    }
}

/// A file held by the remote service
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    /// Resource name, e.g. `files/abc123`
    pub name: String,
    pub uri: String,
    pub mime_type: String,
    pub state: FileState,
    /// Reason reported by the service when processing failed
    pub error: Option<String>,
}

/// The hosted model's REST surface
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, AnalysisError>;

    /// Fetch the current state of an uploaded file
    async fn refresh(&self, file: &RemoteFile) -> Result<RemoteFile, AnalysisError>;

    /// One generation request with the file attached
    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, AnalysisError>;
}

/// Turns a recording into the model's free-text analysis
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        video_path: &Path,
        activity_log: &[ActivityEvent],
        language: &str,
    ) -> Result<String, AnalysisError>;
}

pub struct AnalysisClient {
    backend: Arc<dyn ModelBackend>,
    poll_interval: Duration,
}

impl AnalysisClient {
    pub fn new(backend: Arc<dyn ModelBackend>, poll_interval: Duration) -> Self {
        Self {
            backend,
            poll_interval,
        }
    }

    /// Client talking to Gemini with `api_key`. Fails when no key is configured.
    pub fn from_config(config: &AppConfig, api_key: Option<&str>) -> Result<Self, AnalysisError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AnalysisError::Configuration("API Key not configured.".to_string()))?;

        let backend = GeminiBackend::new(api_key, &config.api_base, config.models.clone())?;
        Ok(Self::new(Arc::new(backend), config.analysis_poll_interval()))
    }
}

#[async_trait]
impl Analyzer for AnalysisClient {
    async fn analyze(
        &self,
        video_path: &Path,
        activity_log: &[ActivityEvent],
        language: &str,
    ) -> Result<String, AnalysisError> {
        if !tokio::fs::try_exists(video_path).await.unwrap_or(false) {
            return Err(AnalysisError::ResourceNotFound(video_path.to_path_buf()));
        }

        tracing::info!("Uploading video {:?}", video_path);
        let mut file = self.backend.upload(video_path, VIDEO_MIME_TYPE).await?;
        tracing::info!("Video uploaded as {} (state {:?})", file.name, file.state);

        while file.state == FileState::Processing {
            tracing::debug!("Waiting for video processing...");
            tokio::time::sleep(self.poll_interval).await;
            file = self.backend.refresh(&file).await?;
        }

        if file.state == FileState::Failed {
            let reason = file.error.unwrap_or_else(|| "Video processing failed.".to_string());
            return Err(AnalysisError::RemoteProcessing(reason));
        }

        tracing::info!("Video processed, generating analysis ({} log lines)", activity_log.len());
        let prompt = build_prompt(activity_log, language);
        let text = self.backend.generate(&file, &prompt).await?;

        tracing::info!("Analysis received ({} chars)", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeModelBackend;

    fn video(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("recording.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_video_fails_before_any_remote_call() {
        let backend = Arc::new(FakeModelBackend::new(vec![FileState::Active], "unused"));
        let client = AnalysisClient::new(backend.clone(), Duration::ZERO);

        let result = client.analyze(Path::new("/nonexistent/video.mp4"), &[], "English").await;

        assert!(matches!(result, Err(AnalysisError::ResourceNotFound(_))));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_processing_is_remote_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeModelBackend::new(
            vec![FileState::Processing, FileState::Failed],
            "unused",
        ));
        let client = AnalysisClient::new(backend.clone(), Duration::ZERO);

        let result = client.analyze(&video(&dir), &[], "English").await;

        assert!(matches!(result, Err(AnalysisError::RemoteProcessing(_))));
        assert_eq!(backend.generate_calls(), 0);
    }

    #[tokio::test]
    async fn test_polls_until_active_then_generates_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeModelBackend::new(
            vec![FileState::Processing, FileState::Processing, FileState::Processing, FileState::Active],
            "## Analysis",
        ));
        let client = AnalysisClient::new(backend.clone(), Duration::from_millis(1));

        let text = client.analyze(&video(&dir), &[], "Português").await.unwrap();

        assert_eq!(text, "## Analysis");
        assert_eq!(backend.upload_calls(), 1);
        assert_eq!(backend.refresh_calls(), 3);
        assert_eq!(backend.generate_calls(), 1);
        assert!(backend.last_prompt().unwrap().contains("Português"));
    }

    #[tokio::test]
    async fn test_generation_error_propagates_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let backend = Arc::new(FakeModelBackend::failing_generation("quota exceeded"));
        let client = AnalysisClient::new(backend, Duration::ZERO);

        let result = client.analyze(&video(&dir), &[], "English").await;

        match result {
            Err(AnalysisError::RemoteProcessing(message)) => assert_eq!(message, "quota exceeded"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = AppConfig::default();
        assert!(matches!(
            AnalysisClient::from_config(&config, None),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(matches!(
            AnalysisClient::from_config(&config, Some("   ")),
            Err(AnalysisError::Configuration(_))
        ));
    }
}
