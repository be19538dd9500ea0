//! Core error types.

use thiserror::Error;

/// Coarse error classification used for retry decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS, TLS, or socket-level failures
    Network,
    /// The peer answered with a 4xx status
    Client,
    /// The peer answered with a 5xx status
    Server,
    /// Credentials were rejected or missing
    Authentication,
    /// Rate limited by the peer
    RateLimit,
    /// A frame or body could not be decoded
    Parsing,
    /// Local configuration or argument problems
    Configuration,
    /// The caller cancelled the operation
    Cancelled,
    /// Anything else
    Unknown,
}

/// Error type shared by every component of the pipeline.
#[derive(Error, Debug, Clone)]
pub enum FlowError {
    /// Request could not be sent or the transport failed
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// Connection could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Request or stream timed out
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Non-2xx response; `message` carries the body text
    #[error("API error {code}: {message}")]
    ApiError {
        code: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// 401/403 response
    #[error("Authentication error {code}: {message}")]
    AuthenticationError { code: u16, message: String },

    /// 429 response
    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    /// The body stream failed mid-way
    #[error("Stream error: {0}")]
    StreamError(String),

    /// The transport returned a response without any body reader
    #[error("Response has no body stream")]
    MissingBody,

    /// Payload could not be interpreted
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid JSON
    #[error("JSON error: {0}")]
    JsonError(String),

    /// Realtime socket failure
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// No API key configured
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    /// Invalid argument supplied by the caller
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The operation was cancelled through its cancel handle
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal invariant broken
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl FlowError {
    /// Build an `ApiError` without details.
    pub fn api_error(code: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::ApiError { code, .. } => Some(*code),
            Self::AuthenticationError { code, .. } => Some(*code),
            Self::RateLimitError(_) => Some(429),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_)
            | Self::ConnectionError(_)
            | Self::TimeoutError(_)
            | Self::StreamError(_)
            | Self::MissingBody
            | Self::WebSocketError(_) => ErrorCategory::Network,
            Self::ApiError { code, .. } if *code >= 500 => ErrorCategory::Server,
            Self::ApiError { .. } => ErrorCategory::Client,
            Self::AuthenticationError { .. } | Self::MissingApiKey(_) => {
                ErrorCategory::Authentication
            }
            Self::RateLimitError(_) => ErrorCategory::RateLimit,
            Self::ParseError(_) | Self::JsonError(_) => ErrorCategory::Parsing,
            Self::ConfigurationError(_) | Self::InvalidParameter(_) => {
                ErrorCategory::Configuration
            }
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::InternalError(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether retrying the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Server | ErrorCategory::RateLimit
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_categories_follow_status() {
        assert_eq!(
            FlowError::api_error(404, "nope").category(),
            ErrorCategory::Client
        );
        assert_eq!(
            FlowError::api_error(503, "down").category(),
            ErrorCategory::Server
        );
        assert!(FlowError::api_error(503, "down").is_retryable());
        assert!(!FlowError::api_error(400, "bad").is_retryable());
    }

    #[test]
    fn cancelled_is_not_retryable() {
        assert!(!FlowError::Cancelled.is_retryable());
        assert_eq!(FlowError::Cancelled.status_code(), None);
    }

    #[test]
    fn authentication_error_reports_its_own_status() {
        let forbidden = FlowError::AuthenticationError {
            code: 403,
            message: "no access to this workflow".to_string(),
        };
        assert_eq!(forbidden.status_code(), Some(403));
        assert_eq!(forbidden.category(), ErrorCategory::Authentication);
        assert_eq!(
            forbidden.to_string(),
            "Authentication error 403: no access to this workflow"
        );
    }

    #[test]
    fn display_includes_body_text() {
        let err = FlowError::api_error(500, "upstream exploded");
        assert_eq!(err.to_string(), "API error 500: upstream exploded");
    }
}
