//! Generative AI client handle.
//!
//! A [`GenAiClient`] is immutable: changing the API key builds a new handle
//! with [`GenAiClient::with_api_key`] rather than swapping a shared global.
//! Whoever issues generative requests owns the handle it was given.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::GenAiConfig;

/// Errors from the generative AI client.
#[derive(Debug, Error)]
pub enum GenAiError {
    #[error("No API key configured")]
    MissingApiKey,

    #[error("Generative API unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Trait for generative backends.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Whether the backend accepts our credentials. `Ok(false)` means the
    /// service answered and rejected them.
    async fn health_check(&self) -> Result<bool, GenAiError>;
}

/// Pick the API key: a non-blank explicit key first, then the environment.
pub fn resolve_api_key(explicit: Option<&str>, env_value: Option<String>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .or_else(|| {
            env_value
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
        })
}

/// Handle to the Gemini generative language API.
#[derive(Clone)]
pub struct GenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GenAiClient {
    pub fn new(config: &GenAiConfig, api_key: impl Into<String>) -> Result<Self, GenAiError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
        })
    }

    /// A new handle sharing the connection pool but using `api_key`.
    pub fn with_api_key(&self, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..self.clone()
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn model_url(&self) -> String {
        format!("{}/v1beta/models/{}", self.base_url, self.model)
    }
}

impl fmt::Debug for GenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<empty>" })
            .finish()
    }
}

#[async_trait]
impl GenerativeBackend for GenAiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn health_check(&self) -> Result<bool, GenAiError> {
        if !self.has_api_key() {
            return Err(GenAiError::MissingApiKey);
        }

        let url = self.model_url();
        debug!("Checking API key against {}", url);

        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .map_err(|e| GenAiError::Unavailable(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!("API key rejected with {}", response.status());
                Ok(false)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(GenAiError::Unavailable(format!(
                    "{} returned {}: {}",
                    url, status, body
                )))
            }
        }
    }
}
