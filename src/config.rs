//! Application settings and the API credential
//!
//! Settings live in `<config_dir>/process-analyst/config.json`; a missing or
//! unreadable file yields defaults. The Gemini key is kept in a `.env` file
//! next to it, read with `dotenv` without touching the process environment,
//! and can be overridden by `GOOGLE_API_KEY`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "process-analyst";
const CONFIG_FILE: &str = "config.json";
const CREDENTIALS_FILE: &str = ".env";

/// Name of the credential, both in the credentials file and in the environment
pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine a configuration directory")]
    NoConfigDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub reports_dir: PathBuf,
    pub recordings_dir: PathBuf,
    /// Files kept per directory by the start-up cleanup
    pub keep_files: usize,
    pub fps: u32,
    pub window_poll_ms: u64,
    pub analysis_poll_ms: u64,
    pub default_language: String,
    /// Models tried in order until one exists
    pub models: Vec<String>,
    pub api_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);

        Self {
            reports_dir: data_dir.join("reports"),
            recordings_dir: data_dir.join("data"),
            data_dir,
            keep_files: 10,
            fps: 10,
            window_poll_ms: 1000,
            analysis_poll_ms: 2000,
            default_language: "Português".to_string(),
            models: vec![
                "gemini-2.5-flash".to_string(),
                "gemini-2.0-flash".to_string(),
                "gemini-pro".to_string(),
            ],
            api_base: "https://generativelanguage.googleapis.com".to_string(),
        }
    }
}

impl AppConfig {
    /// `<config_dir>/process-analyst`
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Using default configuration ({:?}): {}", path, e);
                Self::default()
            }),
            None => Self::default(),
        }
    }

    /// Load from `path`. A missing file is not an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Create the data, reports and recordings directories
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.data_dir, &self.reports_dir, &self.recordings_dir] {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn window_poll_interval(&self) -> Duration {
        Duration::from_millis(self.window_poll_ms.max(1))
    }

    pub fn analysis_poll_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_poll_ms)
    }
}

/// Reads and writes the API key file
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store next to the configuration file
    pub fn open_default() -> Result<Self, ConfigError> {
        let dir = AppConfig::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(dir.join(CREDENTIALS_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The API key. A non-empty `GOOGLE_API_KEY` in the environment wins
    /// over the file.
    pub fn api_key(&self) -> Option<String> {
        if let Some(key) = std::env::var(API_KEY_VAR).ok().filter(|k| !k.trim().is_empty()) {
            return Some(key.trim().to_string());
        }
        self.stored_key()
    }

    /// The key in the file, ignoring the environment. The last non-empty
    /// entry wins.
    pub fn stored_key(&self) -> Option<String> {
        let entries = dotenv::from_path_iter(&self.path).ok()?;
        entries
            .filter_map(|entry| match entry {
                Ok(pair) => Some(pair),
                Err(e) => {
                    tracing::warn!("Skipping unreadable line in {:?}: {}", self.path, e);
                    None
                }
            })
            .filter(|(key, value)| key == API_KEY_VAR && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
            .last()
    }

    /// Write `key` to the file, keeping any other entries
    pub fn save_api_key(&self, key: &str) -> Result<(), ConfigError> {
        let existing = fs::read_to_string(&self.path).unwrap_or_default();
        let mut lines: Vec<String> = existing
            .lines()
            .filter(|line| !defines_api_key(line))
            .map(str::to_string)
            .collect();
        lines.push(format!("{}={}", API_KEY_VAR, key.trim()));

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, lines.join("\n") + "\n")?;
        tracing::info!("API key saved to {:?}", self.path);
        Ok(())
    }
}

/// Whether a `.env` line assigns the API key
fn defines_api_key(line: &str) -> bool {
    let line = line.trim_start();
    let line = line.strip_prefix("export ").unwrap_or(line);
    line.strip_prefix(API_KEY_VAR)
        .is_some_and(|rest| rest.trim_start().starts_with('='))
}
