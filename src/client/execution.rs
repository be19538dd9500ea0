//! Execution API client
//!
//! Thin request/response wrapper around the execution endpoints. Every
//! successful call is folded into the shared [`ExecutionStore`] so that
//! readers see the same state whether it arrived by push or by request.

use crate::config::ExecutionApiConfig;
use crate::defaults;
use crate::error::FlowError;
use crate::execution::{
    HttpHeaderBuilder, HttpInterceptor, HttpRequestContext, HttpTransport, HttpTransportRequest,
    ReqwestTransport, classify_http_error,
};
use crate::store::ExecutionStore;
use crate::types::{ExecutionRecord, ExecutionStatus, ExecutionUpdate};
use reqwest::Method;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionRequest<'a> {
    workflow_id: &'a str,
    input: &'a serde_json::Value,
    triggered_by: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionResponse {
    execution_id: String,
}

/// Reply of the stop endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopExecutionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Client for starting, stopping and inspecting executions.
#[derive(Clone)]
pub struct ExecutionClient {
    config: Arc<ExecutionApiConfig>,
    transport: Arc<dyn HttpTransport>,
    store: ExecutionStore,
    interceptors: Vec<Arc<dyn HttpInterceptor>>,
}

impl std::fmt::Debug for ExecutionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionClient")
            .field("base_url", &self.config.base_url)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ExecutionClient {
    pub fn new(config: ExecutionApiConfig, store: ExecutionStore) -> Result<Self, FlowError> {
        let http = config.http.build_client()?;
        Ok(Self::with_transport(
            config,
            store,
            Arc::new(ReqwestTransport::new(http)),
        ))
    }

    pub fn with_transport(
        config: ExecutionApiConfig,
        store: ExecutionStore,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            store,
            interceptors: Vec::new(),
        }
    }

    pub fn with_interceptor(mut self, interceptor: Arc<dyn HttpInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn store(&self) -> &ExecutionStore {
        &self.store
    }

    pub fn config(&self) -> &ExecutionApiConfig {
        &self.config
    }

    /// Start `workflow_id` and register it as `pending`. Returns the new id.
    pub async fn start(
        &self,
        workflow_id: &str,
        input: serde_json::Value,
        triggered_by: &str,
    ) -> Result<String, FlowError> {
        require_non_blank("workflow_id", workflow_id)?;
        let body = serde_json::to_value(StartExecutionRequest {
            workflow_id,
            input: &input,
            triggered_by,
        })?;
        let resp: StartExecutionResponse = self
            .send_json(Method::POST, "/executions".to_string(), Some(body))
            .await?;
        if resp.execution_id.is_empty() {
            return Err(FlowError::ParseError(
                "start response carried an empty executionId".into(),
            ));
        }

        self.store.upsert(
            ExecutionRecord::new(resp.execution_id.clone(), ExecutionStatus::Pending)
                .with_workflow_id(workflow_id),
        );
        tracing::info!(
            target: "flowstream::http",
            id = %resp.execution_id,
            workflow = %workflow_id,
            "execution started"
        );
        Ok(resp.execution_id)
    }

    /// Ask the server to stop an execution.
    ///
    /// The record is completed as `stopped` only when the server reports success.
    pub async fn stop(&self, execution_id: &str) -> Result<StopExecutionResponse, FlowError> {
        require_non_blank("execution_id", execution_id)?;
        let path = format!("/executions/{}/stop", urlencoding::encode(execution_id));
        let resp: StopExecutionResponse = self.send_json(Method::POST, path, None).await?;
        if resp.success {
            self.store
                .complete(execution_id, ExecutionStatus::Stopped, None, None);
        } else {
            tracing::warn!(
                target: "flowstream::http",
                id = %execution_id,
                message = resp.message.as_deref().unwrap_or(""),
                "stop request was refused"
            );
        }
        Ok(resp)
    }

    /// Fetch the current record and fold it into the store.
    ///
    /// Returns the store's view after folding.
    pub async fn get_status(&self, execution_id: &str) -> Result<ExecutionRecord, FlowError> {
        require_non_blank("execution_id", execution_id)?;
        let path = format!("/executions/{}", urlencoding::encode(execution_id));
        let mut record: ExecutionRecord = self.send_json(Method::GET, path, None).await?;
        record.id = execution_id.to_string();

        if record.is_terminal() && self.store.contains(execution_id) {
            let mut fields = ExecutionUpdate::from_record(&record);
            fields.status = None;
            self.store.update(execution_id, fields);
            self.store.complete(
                execution_id,
                record.status,
                record.result.clone(),
                record.error.clone(),
            );
        } else {
            self.store.upsert(record.clone());
        }

        Ok(self.store.get(execution_id).unwrap_or(record))
    }

    /// Call [`ExecutionClient::get_status`] every `interval` until the
    /// execution is terminal.
    pub async fn poll_until_terminal(
        &self,
        execution_id: &str,
        interval: Duration,
    ) -> Result<ExecutionRecord, FlowError> {
        loop {
            let record = self.get_status(execution_id).await?;
            if record.is_terminal() {
                return Ok(record);
            }
            tracing::trace!(
                target: "flowstream::http",
                id = %execution_id,
                status = %record.status,
                "execution still running"
            );
            tokio::time::sleep(interval).await;
        }
    }

    /// Same as [`ExecutionClient::poll_until_terminal`] with the default interval.
    pub async fn wait_for(&self, execution_id: &str) -> Result<ExecutionRecord, FlowError> {
        self.poll_until_terminal(execution_id, defaults::execution::POLL_INTERVAL)
            .await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: String,
        body: Option<serde_json::Value>,
    ) -> Result<T, FlowError> {
        let url = format!("{}{}", self.config.base_url, path);
        let ctx = HttpRequestContext::new(&url, false);

        let mut builder = HttpHeaderBuilder::new().with_custom_headers(&self.config.http.headers)?;
        if let Some(token) = &self.config.token {
            builder = builder.with_bearer_auth(token.expose_secret())?;
        }
        if body.is_some() {
            builder = builder.with_json_content_type();
        }
        let mut headers = builder.build();
        for it in &self.interceptors {
            it.on_before_send(&ctx, &mut headers, body.as_ref())?;
        }

        let request = HttpTransportRequest {
            ctx: ctx.clone(),
            method,
            url,
            headers,
            body,
            timeout: self
                .config
                .http
                .timeout
                .or(Some(defaults::http::REQUEST_TIMEOUT)),
        };

        let result = self.exchange(&ctx, request).await;
        if let Err(e) = &result {
            for it in &self.interceptors {
                it.on_error(&ctx, e);
            }
        }
        result
    }

    async fn exchange<T: DeserializeOwned>(
        &self,
        ctx: &HttpRequestContext,
        request: HttpTransportRequest,
    ) -> Result<T, FlowError> {
        let response = self.transport.execute_json(request).await?;
        if !(200..300).contains(&response.status) {
            let text = String::from_utf8_lossy(&response.body);
            return Err(classify_http_error(
                response.status,
                &text,
                &response.headers,
            ));
        }
        for it in &self.interceptors {
            it.on_response(ctx, response.status, &response.headers)?;
        }
        serde_json::from_slice(&response.body).map_err(|e| {
            FlowError::ParseError(format!("Failed to parse response from {}: {e}", ctx.url))
        })
    }
}

fn require_non_blank(name: &str, value: &str) -> Result<(), FlowError> {
    if value.trim().is_empty() {
        return Err(FlowError::InvalidParameter(format!("{name} must not be empty")));
    }
    Ok(())
}
