//! HTTP transport abstraction.
//!
//! Requests go through an injectable transport so callers (and tests) can
//! observe the final URL/headers/body and return a synthetic response without
//! going through `reqwest`.

use crate::error::FlowError;
use crate::execution::interceptor::HttpRequestContext;
use crate::streaming::ByteStream;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::Method;
use reqwest::header::HeaderMap;
use std::time::Duration;

/// Transport-level request data.
#[derive(Debug, Clone)]
pub struct HttpTransportRequest {
    pub ctx: HttpRequestContext,
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    /// Whole-request timeout; ignored for streaming requests.
    pub timeout: Option<Duration>,
}

/// Transport-level response data.
#[derive(Debug, Clone)]
pub struct HttpTransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Streaming response body.
pub struct HttpTransportStreamBody {
    stream: ByteStream,
}

impl HttpTransportStreamBody {
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, FlowError>> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }

    pub fn into_stream(self) -> ByteStream {
        self.stream
    }

    /// Read the remaining body into memory.
    pub async fn collect_bytes(self) -> Result<Vec<u8>, FlowError> {
        let mut stream = self.stream;
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl std::fmt::Debug for HttpTransportStreamBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransportStreamBody").finish_non_exhaustive()
    }
}

/// Streaming response head plus body.
///
/// `body` is `None` when the transport has no body reader at all, which is
/// different from a body that yields zero bytes.
#[derive(Debug)]
pub struct HttpTransportStreamResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Option<HttpTransportStreamBody>,
}

/// Custom HTTP transport.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute a request and read the whole body.
    async fn execute_json(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, FlowError>;

    /// Execute a request and return the body as a byte stream.
    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportStreamResponse, FlowError>;
}

/// Default transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn build(&self, request: &HttpTransportRequest) -> reqwest::RequestBuilder {
        let mut rb = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            rb = rb.json(body);
        }
        rb
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute_json(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportResponse, FlowError> {
        let mut rb = self.build(&request);
        if let Some(t) = request.timeout {
            rb = rb.timeout(t);
        }
        let resp = rb.send().await?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| FlowError::HttpError(format!("HTTP body read failed: {e}")))?
            .to_vec();

        Ok(HttpTransportResponse {
            status,
            headers,
            body,
        })
    }

    async fn execute_stream(
        &self,
        request: HttpTransportRequest,
    ) -> Result<HttpTransportStreamResponse, FlowError> {
        let resp = self.build(&request).send().await?;

        let status = resp.status().as_u16();
        let headers = resp.headers().clone();
        let byte_stream = resp.bytes_stream().map(|r| {
            r.map_err(|e| FlowError::StreamError(format!("HTTP byte stream error: {e}")))
        });

        Ok(HttpTransportStreamResponse {
            status,
            headers,
            body: Some(HttpTransportStreamBody::from_stream(byte_stream)),
        })
    }
}
