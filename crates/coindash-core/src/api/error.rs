use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

const DEFAULT_SERVER_MESSAGE: &str = "An error occurred";
const NETWORK_MESSAGE: &str = "Network error - please check your connection";
const UNKNOWN_MESSAGE: &str = "An unexpected error occurred";

pub const CODE_UNKNOWN: &str = "UNKNOWN_ERROR";
pub const CODE_NETWORK: &str = "NETWORK_ERROR";
pub const CODE_CANCELLED: &str = "CANCELLED";

/// Classification of a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The server answered with a non-success status and (usually) a body.
    Validation,
    /// The server answered 401 and the credentials could not be recovered.
    Unauthorized,
    /// No response was received.
    Network,
    /// Anything else: undecodable bodies, bad header values, serialization.
    Unknown,
    /// The caller abandoned the request.
    Cancelled,
}

/// Structured error returned by every gateway call.
#[derive(Error, Debug, Clone, Serialize)]
#[error("{message} ({code})")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: code.into(),
            details: None,
            timestamp: Utc::now(),
            status: None,
        }
    }

    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    /// Build an error from a non-success response.
    ///
    /// JSON bodies contribute `message` (or `detail`), `code` and `details`.
    /// Plain-text bodies become the message, truncated.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let kind = if status == reqwest::StatusCode::UNAUTHORIZED {
            ErrorKind::Unauthorized
        } else {
            ErrorKind::Validation
        };

        let parsed = serde_json::from_str::<Value>(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        let message = field("message")
            .or_else(|| field("detail"))
            .or_else(|| {
                let trimmed = body.trim();
                (parsed.is_none() && !trimmed.is_empty()).then(|| Self::truncate_body(trimmed))
            })
            .unwrap_or_else(|| DEFAULT_SERVER_MESSAGE.to_string());
        let code = field("code").unwrap_or_else(|| CODE_UNKNOWN.to_string());

        let mut error = Self::new(kind, message, code);
        error.details = parsed.as_ref().and_then(|v| v.get("details")).cloned();
        error.status = Some(status.as_u16());
        error
    }

    /// Classify a transport-level failure from reqwest.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
            return Self::network();
        }
        if let Some(status) = err.status() {
            return Self::from_status(status, "");
        }
        Self::unknown(err.to_string())
    }

    pub fn network() -> Self {
        Self::new(ErrorKind::Network, NETWORK_MESSAGE, CODE_NETWORK)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.is_empty() {
            Self::new(ErrorKind::Unknown, UNKNOWN_MESSAGE, CODE_UNKNOWN)
        } else {
            Self::new(ErrorKind::Unknown, message, CODE_UNKNOWN)
        }
    }

    /// A response body that did not match the expected shape.
    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::unknown(format!("Invalid response: {}", err))
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Request cancelled", CODE_CANCELLED)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_json_body() {
        let body = r#"{"message":"Coin not found","code":"NOT_FOUND","details":{"id":"dogecoin2"}}"#;
        let err = ApiError::from_status(StatusCode::NOT_FOUND, body);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.message, "Coin not found");
        assert_eq!(err.code, "NOT_FOUND");
        assert_eq!(err.status, Some(404));
        assert_eq!(err.details, Some(serde_json::json!({"id": "dogecoin2"})));
    }

    #[test]
    fn test_from_status_detail_field() {
        // Django REST style errors carry `detail` instead of `message`
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Coin already in watchlist"}"#,
        );
        assert_eq!(err.message, "Coin already in watchlist");
        assert_eq!(err.code, CODE_UNKNOWN);
    }

    #[test]
    fn test_from_status_unauthorized() {
        let err = ApiError::from_status(StatusCode::UNAUTHORIZED, "");
        assert!(err.is_unauthorized());
        assert_eq!(err.message, DEFAULT_SERVER_MESSAGE);
    }

    #[test]
    fn test_from_status_plain_text_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 100);
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, &body);
        assert!(err.message.contains("truncated"));
        assert!(err.message.contains(&format!("{} total bytes", body.len())));
    }

    #[test]
    fn test_display_includes_code() {
        assert_eq!(
            ApiError::network().to_string(),
            "Network error - please check your connection (NETWORK_ERROR)"
        );
    }

    #[test]
    fn test_unknown_empty_message() {
        let err = ApiError::unknown("");
        assert_eq!(err.message, UNKNOWN_MESSAGE);
        assert_eq!(err.kind, ErrorKind::Unknown);
    }
}
