use std::time::Duration;

use kiosk_model::{ModelError, Source};
use thiserror::Error;

/// Failures talking to the remote asset provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited")]
    RateLimited,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("provider returned {status}: {message}")]
    Status { status: u16, message: String },
}

impl ProviderError {
    /// Whether the bounded backoff policy should try again.
    ///
    /// Unauthorized responses are retried like any other transient failure;
    /// they keep failing until the API key is corrected externally.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Network(err) => {
                err.is_connect() || err.is_timeout() || err.is_request()
            }
            ProviderError::Timeout(_)
            | ProviderError::Unauthorized(_)
            | ProviderError::RateLimited => true,
            ProviderError::NotFound(_) => false,
            ProviderError::Status { status, .. } => *status >= 500,
        }
    }
}

#[derive(Error, Debug)]
pub enum KioskError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed provider payload: {0}")]
    Decode(String),

    #[error("no assets found for {0}")]
    NoAssetsFound(Source),

    #[error("render failed: {0}")]
    Render(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("operation cancelled")]
    Cancelled,
}

impl KioskError {
    /// Errors a display client may reasonably retry on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KioskError::Provider(_)
                | KioskError::Decode(_)
                | KioskError::NoAssetsFound(_)
                | KioskError::Cancelled
        )
    }
}

impl From<serde_json::Error> for KioskError {
    fn from(err: serde_json::Error) -> Self {
        KioskError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KioskError>;
