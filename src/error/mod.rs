//! Error Handling Module
//!
//! This module provides error handling for the pipeline, including:
//! - Core error types (`FlowError`, `ErrorCategory`)
//! - Type conversions from common error types
//!
//! # Example
//!
//! ```rust,ignore
//! use flowstream::error::{FlowError, ErrorCategory};
//!
//! let error = FlowError::api_error(404, "Not found");
//! assert_eq!(error.category(), ErrorCategory::Client);
//! assert!(!error.is_retryable());
//! ```

mod conversions;
pub mod types;

pub use types::*;
