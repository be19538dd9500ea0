//! HTTP error classification
//!
//! Maps non-2xx responses to `FlowError`, always keeping the response body
//! text so callers can see what the server said.

use crate::error::FlowError;
use reqwest::header::HeaderMap;

/// Classify an HTTP failure.
pub fn classify_http_error(status: u16, body_text: &str, headers: &HeaderMap) -> FlowError {
    fn header_val(headers: &HeaderMap, name: &str) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }
    let ids_suffix = ["x-request-id", "x-trace-id", "traceparent"]
        .iter()
        .filter_map(|k| header_val(headers, k).map(|v| format!("{k}={v}")))
        .collect::<Vec<_>>()
        .join(",");
    let ids_suffix = if ids_suffix.is_empty() {
        String::new()
    } else {
        format!(" ids=[{ids_suffix}]")
    };

    match status {
        401 | 403 => FlowError::AuthenticationError {
            code: status,
            message: format!("http={status}{ids_suffix} body={body_text}"),
        },
        429 => {
            let retry_after = header_val(headers, "retry-after").unwrap_or_default();
            FlowError::RateLimitError(format!(
                "http=429 retry_after={retry_after}{ids_suffix} body={body_text}"
            ))
        }
        _ => {
            let details = serde_json::from_str::<serde_json::Value>(body_text).ok();
            let message = if body_text.trim().is_empty() {
                reqwest::StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body_text.to_string()
            };
            FlowError::ApiError {
                code: status,
                message,
                details,
            }
        }
    }
}
