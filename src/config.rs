use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, SublateError};

/// Default configuration file name, looked up in the working directory
/// unless overridden with `--config`.
pub const CONFIG_FILE_NAME: &str = "sublate.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub translate: TranslateConfig,
    pub transcriber: TranscriberConfig,
    pub media: MediaConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Base URL of an OpenAI-compatible chat-completions API
    pub api_base_url: String,
    /// API key; empty means unconfigured
    pub api_key: String,
    /// Model to use for translation
    pub model: String,
    /// Target language for translation (e.g. Chinese, Japanese)
    pub target_language: String,
    /// Maximum number of concurrent translation requests
    pub max_workers: usize,
    /// Serialized-size budget per request chunk, in characters
    pub chunk_size_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Path to the whisper CLI binary
    pub binary_path: String,
    /// Default whisper model (e.g. tiny, base, small, medium, large)
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to the ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to the ffprobe binary
    pub ffprobe_path: String,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            target_language: "Chinese".to_string(),
            max_workers: crate::translate::DEFAULT_MAX_WORKERS,
            chunk_size_limit: crate::translate::DEFAULT_CHUNK_SIZE_LIMIT,
        }
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            binary_path: "whisper".to_string(),
            model: "base".to_string(),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl TranslateConfig {
    /// Verify the operator supplied API credentials. This is a fatal
    /// precondition; translation never starts without both values.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.api_base_url.trim().is_empty() {
            return Err(SublateError::Config(
                "API base URL must be configured (config file or --api-base-url)".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(SublateError::Config(
                "API key must be configured (config file or --api-key)".to_string(),
            ));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SublateError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| SublateError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| SublateError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| SublateError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Default configuration file path in the working directory.
pub fn default_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}
