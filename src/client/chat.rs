//! Model streaming client
//!
//! Sends a chat request to the model endpoint and assembles the streamed
//! answer. Streaming bodies are decoded line by line; a plain
//! `application/json` body is accepted as a non-streaming fallback.

use crate::config::ChatConfig;
use crate::error::FlowError;
use crate::execution::{
    HttpHeaderBuilder, HttpInterceptor, HttpRequestContext, HttpTransport, HttpTransportRequest,
    ReqwestTransport, classify_http_error,
};
use crate::streaming::{
    AggregatedResponse, EventStream, ResponseAggregator, StreamEvent, decode_byte_stream,
    extract_body_text,
};
use crate::types::{ChatMessage, ChatRequestBody};
use crate::utils::{CancelHandle, make_cancellable_stream};
use futures_util::{Stream, StreamExt};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use secrecy::ExposeSecret;
use std::pin::Pin;
use std::sync::Arc;

/// Lazy, finite stream of delta texts.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, FlowError>> + Send>>;

/// A delta stream together with the handle that cancels it.
///
/// The stream is consumed at most once; dropping it closes the connection.
pub struct ChatStreamHandle {
    pub stream: DeltaStream,
    pub cancel: CancelHandle,
}

impl ChatStreamHandle {
    /// Drain the stream into the concatenated text.
    pub async fn collect_text(self) -> Result<String, FlowError> {
        let mut stream = self.stream;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            text.push_str(&delta?);
        }
        Ok(text)
    }
}

/// Client for the model streaming endpoint.
#[derive(Clone)]
pub struct ChatClient {
    config: Arc<ChatConfig>,
    transport: Arc<dyn HttpTransport>,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.config.endpoint)
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

impl ChatClient {
    /// Create a client using a `reqwest` transport built from `config.http`.
    pub fn new(config: ChatConfig) -> Result<Self, FlowError> {
        let http = config.http.build_client()?;
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new(http))))
    }

    pub fn with_transport(config: ChatConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Send `messages` and return the fully assembled answer.
    ///
    /// Cancelling `cancel` at any point before completion makes the call
    /// return `FlowError::Cancelled` promptly.
    pub async fn aggregate(
        &self,
        messages: &[ChatMessage],
        cancel: &CancelHandle,
    ) -> Result<AggregatedResponse, FlowError> {
        self.aggregate_with_callback(messages, cancel, |_| {}).await
    }

    /// Like [`ChatClient::aggregate`], additionally invoking `on_delta` for
    /// every non-empty delta as it arrives.
    pub async fn aggregate_with_callback<F>(
        &self,
        messages: &[ChatMessage],
        cancel: &CancelHandle,
        mut on_delta: F,
    ) -> Result<AggregatedResponse, FlowError>
    where
        F: FnMut(&str),
    {
        let (ctx, mut events) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FlowError::Cancelled),
            opened = self.open(messages) => opened?,
        };

        let mut aggregator = ResponseAggregator::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        target: "flowstream::stream",
                        request_id = %ctx.request_id,
                        "stream cancelled"
                    );
                    return Err(FlowError::Cancelled);
                }
                next = events.next() => next,
            };
            let Some(item) = next else { break };
            let event = match item {
                Ok(event) => event,
                Err(e) => {
                    self.notify_error(&ctx, &e);
                    return Err(e);
                }
            };
            self.observe(&ctx, &event)?;
            if let Some(text) = aggregator.process(&event)
                && !text.is_empty()
            {
                on_delta(&text);
            }
        }

        let response = aggregator.finish();
        self.report_completion(&ctx, &response);
        Ok(response)
    }

    /// Streaming variant: yields every non-empty delta text as it arrives.
    ///
    /// The request is only sent once the returned stream is first polled.
    pub fn stream(&self, messages: Vec<ChatMessage>) -> ChatStreamHandle {
        let cancel = CancelHandle::new();
        let client = self.clone();

        let s = async_stream::stream! {
            let (ctx, mut events) = match client.open(&messages).await {
                Ok(v) => v,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut aggregator = ResponseAggregator::new();
            while let Some(item) = events.next().await {
                match item {
                    Ok(event) => {
                        if let Err(e) = client.observe(&ctx, &event) {
                            yield Err(e);
                            return;
                        }
                        match aggregator.process(&event) {
                            Some(text) if !text.is_empty() => {
                                yield Ok(text);
                            }
                            _ => {}
                        }
                    }
                    Err(e) => {
                        client.notify_error(&ctx, &e);
                        yield Err(e);
                        return;
                    }
                }
            }
            client.report_completion(&ctx, &aggregator.finish());
        };

        ChatStreamHandle {
            stream: make_cancellable_stream(Box::pin(s), &cancel),
            cancel,
        }
    }

    fn build_request(
        &self,
        ctx: &HttpRequestContext,
        messages: &[ChatMessage],
    ) -> Result<HttpTransportRequest, FlowError> {
        let cfg = &self.config;
        let body = serde_json::to_value(ChatRequestBody::new(
            messages,
            &cfg.provider,
            &cfg.model,
        ))?;
        let mut headers = HttpHeaderBuilder::new()
            .with_custom_headers(&cfg.http.headers)?
            .with_bearer_auth(cfg.api_key.expose_secret())?
            .with_json_content_type()
            .with_event_stream_accept(cfg.http.stream_disable_compression)
            .build();
        for it in &self.interceptors {
            it.on_before_send(ctx, &mut headers, Some(&body))?;
        }
        Ok(HttpTransportRequest {
            ctx: ctx.clone(),
            method: Method::POST,
            url: cfg.endpoint.clone(),
            headers,
            body: Some(body),
            timeout: None,
        })
    }

    /// Send the request and turn a successful response into an event stream.
    async fn open(
        &self,
        messages: &[ChatMessage],
    ) -> Result<(HttpRequestContext, EventStream), FlowError> {
        let ctx = HttpRequestContext::new(&self.config.endpoint, true)
            .with_provider(&self.config.provider);
        let request = self.build_request(&ctx, messages)?;

        let response = match self.transport.execute_stream(request).await {
            Ok(r) => r,
            Err(e) => {
                self.notify_error(&ctx, &e);
                return Err(e);
            }
        };

        if !(200..300).contains(&response.status) {
            let text = match response.body {
                Some(body) => match body.collect_bytes().await {
                    Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                    Err(e) => format!("<failed to read error body: {e}>"),
                },
                None => String::new(),
            };
            let error = classify_http_error(response.status, &text, &response.headers);
            self.notify_error(&ctx, &error);
            return Err(error);
        }

        for it in &self.interceptors {
            it.on_response(&ctx, response.status, &response.headers)?;
        }

        let Some(body) = response.body else {
            let error = FlowError::MissingBody;
            self.notify_error(&ctx, &error);
            return Err(error);
        };

        if is_plain_json(&response.headers) {
            let bytes = body.collect_bytes().await.inspect_err(|e| self.notify_error(&ctx, e))?;
            return Ok((ctx, events_from_json_body(bytes)));
        }

        let idle = self.config.http.stream_idle_timeout;
        Ok((ctx, decode_byte_stream(body.into_stream(), idle)))
    }

    fn observe(&self, ctx: &HttpRequestContext, event: &StreamEvent) -> Result<(), FlowError> {
        for it in &self.interceptors {
            it.on_stream_event(ctx, event)?;
        }
        if let StreamEvent::Unparsable { raw } = event {
            for it in &self.interceptors {
                it.on_unparsable(ctx, raw);
            }
        }
        Ok(())
    }

    fn notify_error(&self, ctx: &HttpRequestContext, error: &FlowError) {
        for it in &self.interceptors {
            it.on_error(ctx, error);
        }
    }

    fn report_completion(&self, ctx: &HttpRequestContext, response: &AggregatedResponse) {
        if response.is_empty() {
            tracing::warn!(
                target: "flowstream::stream",
                request_id = %ctx.request_id,
                deltas = response.delta_count,
                unparsable = response.unparsable_count,
                "model stream completed with empty text"
            );
            for it in &self.interceptors {
                it.on_empty_response(ctx);
            }
        } else {
            tracing::debug!(
                target: "flowstream::stream",
                request_id = %ctx.request_id,
                chars = response.text.len(),
                deltas = response.delta_count,
                "model stream completed"
            );
        }
    }
}

fn is_plain_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let ct = ct.to_ascii_lowercase();
            ct.contains("application/json") && !ct.contains("ndjson")
        })
        .unwrap_or(false)
}

/// Events for a complete non-streaming body.
///
/// A body that is not a single JSON document is decoded line by line instead.
fn events_from_json_body(bytes: Vec<u8>) -> EventStream {
    let events: Vec<Result<StreamEvent, FlowError>> =
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => {
                let (text, source) = extract_body_text(&value);
                vec![Ok(StreamEvent::Delta { text, source })]
            }
            Err(_) => {
                let mut decoder = crate::streaming::StreamDecoder::new();
                let mut events = decoder.push(&bytes);
                events.extend(decoder.finish());
                events.into_iter().map(Ok).collect()
            }
        };
    Box::pin(futures_util::stream::iter(events))
}
