//! HTTP configuration types.
//!
//! This module defines `HttpConfig` and its builder, used to configure HTTP
//! behavior for the model client and the execution API client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// HTTP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout for non-streaming calls
    #[serde(with = "duration_option_serde")]
    pub timeout: Option<Duration>,
    /// Connection timeout
    #[serde(with = "duration_option_serde")]
    pub connect_timeout: Option<Duration>,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// Proxy settings
    pub proxy: Option<String>,
    /// User agent
    pub user_agent: Option<String>,
    /// Whether to disable compression for streaming requests.
    ///
    /// When `true`, streaming requests explicitly set `Accept-Encoding: identity`
    /// so intermediaries do not buffer long-lived responses. Default is `true`.
    pub stream_disable_compression: bool,
    /// Maximum time to wait for the next chunk of a streaming body.
    ///
    /// `None` waits forever; a stalled stream is then only detected by transport
    /// disconnects or a caller-side timeout. Serialized in milliseconds.
    #[serde(default, with = "duration_option_millis")]
    pub stream_idle_timeout: Option<Duration>,
}

/// Builder for `HttpConfig`
#[derive(Debug, Clone, Default)]
pub struct HttpConfigBuilder {
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    headers: HashMap<String, String>,
    proxy: Option<String>,
    user_agent: Option<String>,
    stream_disable_compression: Option<bool>,
    stream_idle_timeout: Option<Duration>,
}

impl HttpConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
    pub fn connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }
    pub fn user_agent<S: Into<String>>(mut self, user_agent: Option<S>) -> Self {
        self.user_agent = user_agent.map(|s| s.into());
        self
    }
    pub fn proxy<S: Into<String>>(mut self, proxy: Option<S>) -> Self {
        self.proxy = proxy.map(|s| s.into());
        self
    }
    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
    pub fn stream_disable_compression(mut self, val: bool) -> Self {
        self.stream_disable_compression = Some(val);
        self
    }
    pub fn stream_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> HttpConfig {
        let defaults = HttpConfig::default();
        HttpConfig {
            timeout: self.timeout.or(defaults.timeout),
            connect_timeout: self.connect_timeout.or(defaults.connect_timeout),
            headers: self.headers,
            proxy: self.proxy,
            user_agent: self.user_agent.or(defaults.user_agent),
            stream_disable_compression: self
                .stream_disable_compression
                .unwrap_or(defaults.stream_disable_compression),
            stream_idle_timeout: self.stream_idle_timeout,
        }
    }
}

impl HttpConfig {
    /// Returns a builder for constructing `HttpConfig`
    pub fn builder() -> HttpConfigBuilder {
        HttpConfigBuilder::new()
    }

    /// Build a `reqwest::Client` honoring this configuration.
    ///
    /// The request timeout is not applied at the client level because it would
    /// also cut long-lived streaming bodies; non-streaming callers apply it per request.
    pub fn build_client(&self) -> Result<reqwest::Client, crate::error::FlowError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = self.connect_timeout {
            builder = builder.connect_timeout(t);
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.user_agent(ua.clone());
        }
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| {
                crate::error::FlowError::ConfigurationError(format!("Invalid proxy '{proxy}': {e}"))
            })?;
            builder = builder.proxy(proxy);
        }
        builder.build().map_err(|e| {
            crate::error::FlowError::ConfigurationError(format!("Failed to build HTTP client: {e}"))
        })
    }
}

// Helper module for Duration serialization
mod duration_option_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => d.as_secs().serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// Sub-second idle timeouts are common, so this one is kept in milliseconds.
mod duration_option_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => u64::try_from(d.as_millis())
                .unwrap_or(u64::MAX)
                .serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis: Option<u64> = Option::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        // Determine default for stream_disable_compression from env var (default: true)
        let sdc = match std::env::var("FLOWSTREAM_STREAM_DISABLE_COMPRESSION") {
            Ok(val) => {
                let v = val.trim().to_lowercase();
                !(v == "false" || v == "0" || v == "off" || v == "no")
            }
            Err(_) => true,
        };
        Self {
            timeout: Some(crate::defaults::http::REQUEST_TIMEOUT),
            connect_timeout: Some(crate::defaults::http::CONNECT_TIMEOUT),
            headers: HashMap::new(),
            proxy: None,
            user_agent: Some(crate::defaults::http::USER_AGENT.to_string()),
            stream_disable_compression: sdc,
            stream_idle_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_keeps_defaults_for_unset_fields() {
        let cfg = HttpConfig::builder()
            .header("x-tenant", "acme")
            .stream_idle_timeout(Some(Duration::from_secs(30)))
            .build();
        assert_eq!(cfg.timeout, Some(crate::defaults::http::REQUEST_TIMEOUT));
        assert_eq!(cfg.headers.get("x-tenant").map(String::as_str), Some("acme"));
        assert_eq!(cfg.stream_idle_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let cfg = HttpConfig::builder()
            .timeout(Some(Duration::from_secs(5)))
            .build();
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["timeout"], 5);
        assert!(json["stream_idle_timeout"].is_null());

        let back: HttpConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn sub_second_idle_timeout_survives_serde() {
        let cfg = HttpConfig::builder()
            .stream_idle_timeout(Some(Duration::from_millis(500)))
            .build();
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["stream_idle_timeout"], 500);

        let back: HttpConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.stream_idle_timeout, Some(Duration::from_millis(500)));
    }
}
