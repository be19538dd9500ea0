//! HTTP Interceptor interfaces
//!
//! Interceptors observe requests before send, responses, errors, and every
//! decoded stream event. They are also the diagnostic sink for frames the
//! decoder had to drop and for streams that finished without any text. The
//! hooks are best-effort and should avoid expensive work.

use crate::error::FlowError;
use crate::streaming::StreamEvent;
use reqwest::header::HeaderMap;

/// Context passed to interceptors describing the request.
#[derive(Clone, Debug)]
pub struct HttpRequestContext {
    pub request_id: String,
    /// Target provider from the routing metadata, when the call has one.
    pub provider: Option<String>,
    pub url: String,
    pub stream: bool,
}

impl HttpRequestContext {
    pub fn new(url: impl Into<String>, stream: bool) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            provider: None,
            url: url.into(),
            stream,
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

/// HTTP interceptor trait
pub trait HttpInterceptor: Send + Sync {
    /// Called before sending a request. Interceptors may add headers.
    /// Returning an error short-circuits the request.
    fn on_before_send(
        &self,
        _ctx: &HttpRequestContext,
        _headers: &mut HeaderMap,
        _body: Option<&serde_json::Value>,
    ) -> Result<(), FlowError> {
        Ok(())
    }

    /// Called after a successful (2xx) response head is received.
    fn on_response(
        &self,
        _ctx: &HttpRequestContext,
        _status: u16,
        _headers: &HeaderMap,
    ) -> Result<(), FlowError> {
        Ok(())
    }

    /// Called when an error occurs during sending, classification or streaming.
    fn on_error(&self, _ctx: &HttpRequestContext, _error: &FlowError) {}

    /// Called for every decoded stream event, including unparsable ones.
    fn on_stream_event(
        &self,
        _ctx: &HttpRequestContext,
        _event: &StreamEvent,
    ) -> Result<(), FlowError> {
        Ok(())
    }

    /// Called when the decoder dropped a line it could not parse.
    fn on_unparsable(&self, _ctx: &HttpRequestContext, _raw: &str) {}

    /// Called when a stream drained successfully without producing any text.
    fn on_empty_response(&self, _ctx: &HttpRequestContext) {}
}

/// A simple logging interceptor backed by `tracing` (no sensitive data).
#[derive(Clone, Default)]
pub struct LoggingInterceptor;

impl HttpInterceptor for LoggingInterceptor {
    fn on_before_send(
        &self,
        ctx: &HttpRequestContext,
        _headers: &mut HeaderMap,
        _body: Option<&serde_json::Value>,
    ) -> Result<(), FlowError> {
        tracing::debug!(target: "flowstream::http", request_id=%ctx.request_id, url=%ctx.url, stream=%ctx.stream, "sending request");
        Ok(())
    }

    fn on_response(
        &self,
        ctx: &HttpRequestContext,
        status: u16,
        _headers: &HeaderMap,
    ) -> Result<(), FlowError> {
        tracing::debug!(target: "flowstream::http", request_id=%ctx.request_id, url=%ctx.url, status=%status, "response received");
        Ok(())
    }

    fn on_error(&self, ctx: &HttpRequestContext, error: &FlowError) {
        tracing::warn!(target: "flowstream::http", request_id=%ctx.request_id, url=%ctx.url, error=%error, "request error");
    }

    fn on_stream_event(
        &self,
        ctx: &HttpRequestContext,
        event: &StreamEvent,
    ) -> Result<(), FlowError> {
        let kind = match event {
            StreamEvent::Delta { .. } => "delta",
            StreamEvent::Done => "done",
            StreamEvent::Unparsable { .. } => "unparsable",
        };
        tracing::trace!(target: "flowstream::stream", request_id=%ctx.request_id, kind, "stream event");
        Ok(())
    }

    fn on_unparsable(&self, ctx: &HttpRequestContext, raw: &str) {
        let sample: String = raw.chars().take(120).collect();
        tracing::debug!(target: "flowstream::stream", request_id=%ctx.request_id, sample=%sample, "dropped unparsable line");
    }

    fn on_empty_response(&self, ctx: &HttpRequestContext) {
        tracing::warn!(target: "flowstream::stream", request_id=%ctx.request_id, url=%ctx.url, "stream completed without any text");
    }
}
