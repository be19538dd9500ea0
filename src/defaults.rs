//! Default Configuration Values
//!
//! This module centralizes the default values used throughout the crate.

use std::time::Duration;

/// HTTP client default configurations
pub mod http {
    use super::*;

    /// Default request timeout for non-streaming HTTP requests
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

    /// Default connection timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Default User-Agent string for HTTP requests
    pub const USER_AGENT: &str = concat!("flowstream/", env!("CARGO_PKG_VERSION"));
}

/// Execution API defaults
pub mod execution {
    use super::*;

    /// Default interval between `get_status` calls when polling
    pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// Capacity of the store change-notification channel
    pub const STORE_EVENT_CAPACITY: usize = 256;
}

/// Streaming wire-format markers
pub mod stream {
    /// SSE data field prefix
    pub const DATA_PREFIX: &str = "data:";

    /// Payload marking the end of an SSE stream
    pub const DONE_MARKER: &str = "[DONE]";
}
