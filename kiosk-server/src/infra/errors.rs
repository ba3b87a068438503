use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use kiosk_config::OverrideError;
use kiosk_core::KioskError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Whether the client should simply try again on its next tick.
    pub retryable: bool,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "message": self.message,
                "status": self.status.as_u16(),
                "retryable": self.retryable,
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<KioskError> for AppError {
    fn from(err: KioskError) -> Self {
        let retryable = err.is_retryable();
        let mapped = match &err {
            KioskError::Provider(provider) if provider.is_transient() => {
                Self::unavailable(err.to_string())
            }
            KioskError::Provider(_) | KioskError::Decode(_) => {
                Self::bad_gateway(err.to_string())
            }
            KioskError::NoAssetsFound(_) => Self::not_found(err.to_string()),
            KioskError::Config(_) | KioskError::Model(_) => {
                Self::bad_request(err.to_string())
            }
            KioskError::Cancelled => Self::unavailable(err.to_string()),
            KioskError::Render(_) => Self::internal(err.to_string()),
        };

        if mapped.status.is_server_error() {
            tracing::error!(error = %err, status = %mapped.status, "request failed");
        } else {
            tracing::debug!(error = %err, status = %mapped.status, "request rejected");
        }
        mapped.retryable(retryable)
    }
}

impl From<OverrideError> for AppError {
    fn from(err: OverrideError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_core::ProviderError;
    use kiosk_model::Source;

    #[test]
    fn maps_pipeline_errors_to_statuses() {
        let cases = [
            (
                KioskError::Provider(ProviderError::RateLimited),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                KioskError::Provider(ProviderError::NotFound("a".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (KioskError::Decode("bad json".into()), StatusCode::BAD_GATEWAY),
            (KioskError::NoAssetsFound(Source::Favourites), StatusCode::NOT_FOUND),
            (KioskError::Config("unknown user 'x'".into()), StatusCode::BAD_REQUEST),
            (KioskError::Render("bad bytes".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn provider_failures_are_retryable() {
        let err = AppError::from(KioskError::Decode("truncated".into()));
        assert!(err.retryable);
        let err = AppError::from(KioskError::Config("nope".into()));
        assert!(!err.retryable);
    }
}
