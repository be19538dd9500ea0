//! Client configuration
//!
//! `ChatConfig` addresses the model streaming endpoint; `ExecutionApiConfig`
//! addresses the execution API and its realtime channel. Both can be built
//! explicitly or loaded from `FLOWSTREAM_*` environment variables.

use crate::error::FlowError;
use crate::types::HttpConfig;
use secrecy::{ExposeSecret, SecretString};

/// Configuration of the model streaming call.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Full URL the chat request is POSTed to
    pub endpoint: String,
    pub api_key: SecretString,
    /// Target provider forwarded in the routing metadata
    pub provider: String,
    /// Model name forwarded in the routing metadata
    pub model: String,
    pub http: HttpConfig,
}

impl ChatConfig {
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::default()
    }

    /// Load from `FLOWSTREAM_MODEL_ENDPOINT`, `FLOWSTREAM_API_KEY`,
    /// `FLOWSTREAM_PROVIDER` and `FLOWSTREAM_MODEL`.
    pub fn from_env() -> Result<Self, FlowError> {
        let mut builder = Self::builder();
        if let Ok(v) = std::env::var("FLOWSTREAM_MODEL_ENDPOINT") {
            builder = builder.endpoint(v);
        }
        if let Ok(v) = std::env::var("FLOWSTREAM_API_KEY") {
            builder = builder.api_key(v);
        }
        if let Ok(v) = std::env::var("FLOWSTREAM_PROVIDER") {
            builder = builder.provider(v);
        }
        if let Ok(v) = std::env::var("FLOWSTREAM_MODEL") {
            builder = builder.model(v);
        }
        builder.build()
    }
}

/// Builder for [`ChatConfig`]
#[derive(Debug, Clone, Default)]
pub struct ChatConfigBuilder {
    endpoint: Option<String>,
    api_key: Option<SecretString>,
    provider: Option<String>,
    model: Option<String>,
    http: Option<HttpConfig>,
}

impl ChatConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn http(mut self, http: HttpConfig) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Result<ChatConfig, FlowError> {
        let endpoint = self
            .endpoint
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| FlowError::ConfigurationError("model endpoint is required".into()))?;
        let api_key = self
            .api_key
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or_else(|| FlowError::MissingApiKey("an API key is required".into()))?;
        let provider = self
            .provider
            .ok_or_else(|| FlowError::ConfigurationError("provider is required".into()))?;
        let model = self
            .model
            .ok_or_else(|| FlowError::ConfigurationError("model is required".into()))?;
        Ok(ChatConfig {
            endpoint,
            api_key,
            provider,
            model,
            http: self.http.unwrap_or_default(),
        })
    }
}

/// Configuration of the execution API and realtime channel.
#[derive(Debug, Clone)]
pub struct ExecutionApiConfig {
    /// Base URL of the execution API, e.g. `https://api.example.com/v1`
    pub base_url: String,
    /// Base URL of the realtime channel; derived from `base_url` when unset
    pub realtime_url: Option<String>,
    /// Optional bearer token
    pub token: Option<SecretString>,
    pub http: HttpConfig,
}

impl ExecutionApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            realtime_url: None,
            token: None,
            http: HttpConfig::default(),
        }
    }

    pub fn with_realtime_url(mut self, url: impl Into<String>) -> Self {
        self.realtime_url = Some(url.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Load from `FLOWSTREAM_API_BASE_URL`, `FLOWSTREAM_REALTIME_URL` and
    /// `FLOWSTREAM_API_TOKEN`.
    pub fn from_env() -> Result<Self, FlowError> {
        let base_url = std::env::var("FLOWSTREAM_API_BASE_URL").map_err(|_| {
            FlowError::ConfigurationError("FLOWSTREAM_API_BASE_URL is not set".into())
        })?;
        let mut cfg = Self::new(base_url);
        if let Ok(v) = std::env::var("FLOWSTREAM_REALTIME_URL") {
            cfg = cfg.with_realtime_url(v);
        }
        if let Ok(v) = std::env::var("FLOWSTREAM_API_TOKEN") {
            cfg = cfg.with_token(v);
        }
        Ok(cfg)
    }

    /// WebSocket base URL of the realtime channel.
    pub fn realtime_base(&self) -> Result<String, FlowError> {
        match &self.realtime_url {
            Some(url) => Ok(url.clone()),
            None => to_ws_url(&self.base_url),
        }
    }
}

/// Convert an `http(s)://` URL to its `ws(s)://` counterpart.
pub fn to_ws_url(http_url: &str) -> Result<String, FlowError> {
    let u = http_url.trim_end();
    let (scheme, rest) = if let Some(r) = u.strip_prefix("https://") {
        ("wss://", r)
    } else if let Some(r) = u.strip_prefix("http://") {
        ("ws://", r)
    } else if let Some(r) = u.strip_prefix("wss://") {
        ("wss://", r)
    } else if let Some(r) = u.strip_prefix("ws://") {
        ("ws://", r)
    } else {
        return Err(FlowError::ConfigurationError(format!(
            "Unsupported URL scheme for realtime channel: {http_url}"
        )));
    };
    Ok(format!("{scheme}{rest}"))
}
