use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found")]
    NotFound,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}

/// Failures raised by the chat-completion provider.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM features are disabled (no API key configured)")]
    Disabled,
    #[error("Rate limited by LLM provider")]
    RateLimited,
    #[error("LLM provider quota exhausted")]
    QuotaExhausted,
    #[error("LLM provider rejected the credential")]
    Unauthorized,
    #[error("LLM provider server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },
    #[error("LLM API error: {0}")]
    ApiError(String),
    #[error("LLM request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid LLM response: {0}")]
    InvalidResponse(String),
    #[error("LLM returned empty content")]
    EmptyResponse,
}

impl LlmError {
    /// Transient failures worth another attempt after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited | LlmError::ServerError { .. })
    }

    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Disabled => "disabled",
            LlmError::RateLimited => "rate_limited",
            LlmError::QuotaExhausted => "insufficient_quota",
            LlmError::Unauthorized => "auth",
            LlmError::ServerError { .. } => "server_error",
            LlmError::ApiError(_) => "api_error",
            LlmError::Timeout => "timeout",
            LlmError::Network(_) => "network",
            LlmError::InvalidResponse(_) => "invalid_response",
            LlmError::EmptyResponse => "empty_response",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limits_and_server_errors_retry() {
        assert!(LlmError::RateLimited.is_retryable());
        assert!(LlmError::ServerError { status: 503, message: "busy".into() }.is_retryable());

        assert!(!LlmError::Unauthorized.is_retryable());
        assert!(!LlmError::QuotaExhausted.is_retryable());
        assert!(!LlmError::EmptyResponse.is_retryable());
        assert!(!LlmError::InvalidResponse("bad json".into()).is_retryable());
        assert!(!LlmError::Timeout.is_retryable());
        assert!(!LlmError::Disabled.is_retryable());
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let response = AppError::Validation("tickers is required".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
