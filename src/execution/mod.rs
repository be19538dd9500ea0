//! HTTP execution plumbing
//!
//! - Transport abstraction
//! - Header building
//! - Interceptors
//! - Error classification

pub mod errors;
pub mod headers;
pub mod interceptor;
pub mod transport;

pub use errors::classify_http_error;
pub use headers::HttpHeaderBuilder;
pub use interceptor::*;
pub use transport::*;
