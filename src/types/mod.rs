//! Data types shared across the pipeline.

pub mod chat;
pub mod execution;
pub mod http;

pub use chat::*;
pub use execution::*;
pub use http::*;
