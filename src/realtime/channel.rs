//! WebSocket subscription feeding the execution store.

use super::message::apply_message;
use crate::config::ExecutionApiConfig;
use crate::error::FlowError;
use crate::store::ExecutionStore;
use crate::utils::CancelHandle;
use futures_util::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{self, HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

type ErrorCallback = Arc<dyn Fn(FlowError) + Send + Sync>;

/// Opens realtime subscriptions for executions.
#[derive(Debug, Clone)]
pub struct RealtimeChannel {
    store: ExecutionStore,
    config: ExecutionApiConfig,
}

impl RealtimeChannel {
    pub fn new(store: ExecutionStore, config: ExecutionApiConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    /// WebSocket URL of the channel for `execution_id`.
    pub fn url_for(&self, execution_id: &str) -> Result<String, FlowError> {
        let base = self.config.realtime_base()?;
        Ok(format!(
            "{}/executions/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(execution_id)
        ))
    }

    fn handshake_request(&self, url: &str) -> Result<http::Request<()>, FlowError> {
        let mut req = url.into_client_request()?;
        let headers = req.headers_mut();
        for (name, value) in &self.config.http.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                FlowError::ConfigurationError(format!("Invalid header name '{name}': {e}"))
            })?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| FlowError::ConfigurationError(format!("Invalid header value: {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = &self.config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| FlowError::ConfigurationError(format!("Invalid API token: {e}")))?;
            value.set_sensitive(true);
            headers.insert(http::header::AUTHORIZATION, value);
        }
        Ok(req)
    }

    /// Start listening for updates of `execution_id`.
    ///
    /// Connection and transport failures end the subscription and are passed
    /// to `on_error`; malformed messages are passed to `on_error` and the
    /// connection stays open. Must be called within a tokio runtime.
    pub fn subscribe<F>(&self, execution_id: impl Into<String>, on_error: F) -> Subscription
    where
        F: Fn(FlowError) + Send + Sync + 'static,
    {
        let execution_id = execution_id.into();
        let cancel = CancelHandle::new();
        let gate = Arc::new(Mutex::new(true));
        let worker = Worker {
            channel: self.clone(),
            execution_id: execution_id.clone(),
            cancel: cancel.clone(),
            gate: gate.clone(),
            on_error: Arc::new(on_error),
        };
        let handle = tokio::spawn(worker.run());
        Subscription {
            execution_id,
            cancel,
            gate,
            handle: Some(handle),
        }
    }
}

/// Live subscription to one execution. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    execution_id: String,
    cancel: CancelHandle,
    gate: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Stop applying messages and close the connection.
    ///
    /// Once this returns no further store write happens.
    /// Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner) = false;
        self.cancel.cancel();
    }

    /// Whether the reader task is still running.
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait for the reader task to end.
    pub async fn closed(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(target: "flowstream::realtime", id = %self.execution_id, error = %e, "realtime task ended abnormally");
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct Worker {
    channel: RealtimeChannel,
    execution_id: String,
    cancel: CancelHandle,
    gate: Arc<Mutex<bool>>,
    on_error: ErrorCallback,
}

impl Worker {
    /// Run `f` only while the subscription is open.
    fn while_open<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let open = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if *open { Some(f()) } else { None }
    }

    fn is_open(&self) -> bool {
        *self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The callback runs without the gate held so it may unsubscribe.
    fn report(&self, error: FlowError) {
        if self.is_open() {
            tracing::debug!(target: "flowstream::realtime", id = %self.execution_id, error = %error, "realtime error");
            (self.on_error)(error);
        }
    }

    async fn connect(&self) -> Result<WsStream, FlowError> {
        let url = self.channel.url_for(&self.execution_id)?;
        let req = self.channel.handshake_request(&url)?;
        tracing::debug!(target: "flowstream::realtime", id = %self.execution_id, url = %url, "connecting");
        let (ws, _resp) = tokio_tungstenite::connect_async(req)
            .await
            .map_err(|e| FlowError::WebSocketError(format!("WebSocket connect failed: {e}")))?;
        Ok(ws)
    }

    async fn run(self) {
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return,
            r = self.connect() => r,
        };
        let mut ws = match connected {
            Ok(ws) => ws,
            Err(e) => {
                self.report(e);
                return;
            }
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let _ = ws.close(None).await;
                    tracing::debug!(target: "flowstream::realtime", id = %self.execution_id, "unsubscribed");
                    return;
                }
                next = ws.next() => next,
            };
            let Some(msg) = next else {
                tracing::debug!(target: "flowstream::realtime", id = %self.execution_id, "connection ended");
                return;
            };
            let msg = match msg {
                Ok(m) => m,
                Err(e) => {
                    self.report(FlowError::WebSocketError(format!("WebSocket recv failed: {e}")));
                    return;
                }
            };

            let text = match msg {
                Message::Text(text) => text.as_str().to_owned(),
                Message::Binary(bin) => match String::from_utf8(bin.to_vec()) {
                    Ok(text) => text,
                    Err(e) => {
                        self.report(FlowError::ParseError(format!(
                            "WebSocket binary frame is not valid UTF-8: {e}"
                        )));
                        continue;
                    }
                },
                Message::Ping(payload) => {
                    if let Err(e) = ws.send(Message::Pong(payload)).await {
                        self.report(FlowError::WebSocketError(format!(
                            "WebSocket pong send failed: {e}"
                        )));
                        return;
                    }
                    continue;
                }
                Message::Pong(_) | Message::Frame(_) => continue,
                Message::Close(_) => {
                    tracing::debug!(target: "flowstream::realtime", id = %self.execution_id, "server closed connection");
                    return;
                }
            };

            let store = &self.channel.store;
            let Some(outcome) = self.while_open(|| apply_message(store, &self.execution_id, &text))
            else {
                return;
            };
            match outcome {
                Ok(outcome) if outcome.is_terminal() => {
                    tracing::debug!(target: "flowstream::realtime", id = %self.execution_id, status = ?outcome.terminal, "execution reached terminal status");
                    let _ = ws.close(None).await;
                    return;
                }
                Ok(_) => {}
                Err(e) => self.report(e),
            }
        }
    }
}
