//! Type Conversions for FlowError
//!
//! This module contains From trait implementations for converting
//! common error types into FlowError.

use super::types::FlowError;

impl From<reqwest::Error> for FlowError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::TimeoutError(err.to_string());
        }
        if err.is_connect() {
            return Self::ConnectionError(err.to_string());
        }
        Self::HttpError(err.to_string())
    }
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FlowError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocketError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: FlowError = json_err.into();
        assert!(matches!(err, FlowError::JsonError(_)));
    }

    #[test]
    fn test_from_websocket_error() {
        let ws_err = tokio_tungstenite::tungstenite::Error::ConnectionClosed;
        let err: FlowError = ws_err.into();
        assert!(matches!(err, FlowError::WebSocketError(_)));
    }
}
