//! Gemini REST backend
//!
//! Uses the resumable upload protocol of the Files API, polls files by
//! resource name and calls `generateContent` on the first model of the
//! configured list that exists. When none does, the first listed model that
//! supports `generateContent` is tried.

use crate::analysis::{AnalysisError, FileState, ModelBackend, RemoteFile};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GeminiBackend {
    client: Client,
    api_key: String,
    api_base: String,
    models: Vec<String>,
}

impl GeminiBackend {
    pub fn new(api_key: &str, api_base: &str, models: Vec<String>) -> Result<Self, AnalysisError> {
        if models.is_empty() {
            return Err(AnalysisError::Configuration("No models configured".to_string()));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AnalysisError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            models,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    error: Option<ApiStatus>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiStatus,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelList {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelInfo {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

impl From<FileResource> for RemoteFile {
    fn from(resource: FileResource) -> Self {
        RemoteFile {
            name: resource.name,
            uri: resource.uri,
            mime_type: resource.mime_type,
            state: FileState::from_api(&resource.state),
            error: resource.error.map(|e| e.message).filter(|m| !m.is_empty()),
        }
    }
}

/// Concatenated text parts of the first candidate
fn response_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    (!text.is_empty()).then_some(text)
}

/// First listed model that can generate content and is not in `tried`,
/// without its `models/` prefix
fn pick_listed_model(list: ModelList, tried: &[String]) -> Option<String> {
    list.models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|g| g == "generateContent"))
        .map(|m| m.name.strip_prefix("models/").unwrap_or(&m.name).to_string())
        .find(|name| !tried.contains(name))
}

/// The service's own message for a failed call, or the raw body
fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => envelope.error.message,
        _ if body.trim().is_empty() => format!("HTTP {}", status),
        _ => format!("HTTP {}: {}", status, body.trim()),
    }
}

fn request_error(e: reqwest::Error) -> AnalysisError {
    AnalysisError::RemoteProcessing(e.to_string())
}

async fn ensure_success(response: Response) -> Result<Response, AnalysisError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AnalysisError::RemoteProcessing(api_error_message(status, &body)))
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn upload(&self, path: &Path, mime_type: &str) -> Result<RemoteFile, AnalysisError> {
        let bytes = tokio::fs::read(path).await?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string());

        let start = self
            .client
            .post(self.url("upload/v1beta/files"))
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await
            .map_err(request_error)?;
        let start = ensure_success(start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AnalysisError::RemoteProcessing("Upload session URL missing from response".to_string()))?
            .to_string();

        tracing::debug!("Uploading {} bytes", bytes.len());
        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(request_error)?;

        let uploaded: UploadResponse = ensure_success(response).await?.json().await.map_err(request_error)?;
        Ok(uploaded.file.into())
    }

    async fn refresh(&self, file: &RemoteFile) -> Result<RemoteFile, AnalysisError> {
        let response = self
            .client
            .get(self.url(&format!("v1beta/{}", file.name)))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(request_error)?;

        let resource: FileResource = ensure_success(response).await?.json().await.map_err(request_error)?;
        Ok(resource.into())
    }

    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, AnalysisError> {
        let body = json!({
            "contents": [{
                "parts": [
                    { "file_data": { "mime_type": file.mime_type, "file_uri": file.uri } },
                    { "text": prompt }
                ]
            }]
        });

        for model in &self.models {
            if let Some(text) = self.generate_with(model, &body).await? {
                return Ok(text);
            }
        }

        tracing::warn!("No configured model available, listing models");
        if let Some(model) = self.discover_model().await {
            if let Some(text) = self.generate_with(&model, &body).await? {
                return Ok(text);
            }
        }

        Err(AnalysisError::RemoteProcessing(format!(
            "No suitable model found (tried {})",
            self.models.join(", ")
        )))
    }
}

impl GeminiBackend {
    /// `None` when the model does not exist
    async fn generate_with(&self, model: &str, body: &serde_json::Value) -> Result<Option<String>, AnalysisError> {
        tracing::debug!("Generating with model '{}'", model);
        let response = self
            .client
            .post(self.url(&format!("v1beta/models/{}:generateContent", model)))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(request_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!("Model '{}' not available", model);
            return Ok(None);
        }

        let parsed: GenerateResponse = ensure_success(response).await?.json().await.map_err(request_error)?;
        response_text(parsed)
            .map(Some)
            .ok_or_else(|| AnalysisError::RemoteProcessing(format!("Model '{}' returned no text", model)))
    }

    async fn list_models(&self) -> Result<ModelList, AnalysisError> {
        let response = self
            .client
            .get(self.url("v1beta/models"))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(request_error)?;
        ensure_success(response).await?.json().await.map_err(request_error)
    }

    async fn discover_model(&self) -> Option<String> {
        match self.list_models().await {
            Ok(list) => {
                let model = pick_listed_model(list, &self.models);
                if let Some(model) = &model {
                    tracing::info!("Using listed model '{}'", model);
                }
                model
            }
            Err(e) => {
                tracing::warn!("Could not list models: {}", e);
                None
            }
        }
    }
}
