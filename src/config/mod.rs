//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Generative AI client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenAiConfig {
    /// Base URL of the generative language API
    #[serde(default = "default_genai_base_url")]
    pub base_url: String,

    /// Model used when checking the key
    #[serde(default = "default_model")]
    pub model: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Environment variable holding the fallback API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

fn default_genai_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash-image".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_api_key_env() -> String {
    "API_KEY".to_string()
}

impl Default for GenAiConfig {
    fn default() -> Self {
        Self {
            base_url: default_genai_base_url(),
            model: default_model(),
            timeout_seconds: default_timeout(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: usize,

    /// Limit for JSON bodies (data URLs and documents)
    #[serde(default = "default_max_json_body")]
    pub max_json_body_bytes: usize,
}

fn default_max_files() -> usize {
    10
}

fn default_max_file_size() -> usize {
    50 * 1024 * 1024
}

fn default_max_json_body() -> usize {
    50 * 1024 * 1024
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_file_size_bytes: default_max_file_size(),
            max_json_body_bytes: default_max_json_body(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Prefix for issued file URLs; `http://localhost:<port>` when unset
    #[serde(default)]
    pub public_base_url: Option<String>,

    /// Origins allowed in addition to the built-in local network patterns
    #[serde(default)]
    pub allowed_origins: Vec<String>,

    /// Accept any origin
    #[serde(default)]
    pub dev_mode: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: None,
            allowed_origins: Vec::new(),
            dev_mode: false,
        }
    }
}

impl ServerConfig {
    /// Base URL for issued file URLs, without a trailing slash.
    pub fn base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub uploads: UploadConfig,

    #[serde(default)]
    pub genai: GenAiConfig,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./storage")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            uploads: UploadConfig::default(),
            genai: GenAiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.uploads.max_files == 0 {
            return Err(ConfigError::ValidationError(
                "uploads.max_files must be greater than 0".to_string(),
            ));
        }

        if self.uploads.max_file_size_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "uploads.max_file_size_bytes must be greater than 0".to_string(),
            ));
        }

        if self.genai.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "genai.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(url) = &self.server.public_base_url {
            let parsed = url::Url::parse(url).map_err(|e| {
                ConfigError::ValidationError(format!("server.public_base_url: {e}"))
            })?;
            // Issued URLs must start with the category for delete-by-url to invert them.
            if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
                return Err(ConfigError::ValidationError(format!(
                    "server.public_base_url must be an origin without a path: {url}"
                )));
            }
        }

        Ok(())
    }
}
