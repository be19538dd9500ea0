//! Streaming Module
//!
//! Streaming response handling:
//! - Line decoding of SSE-style and NDJSON bodies
//! - Byte stream adapters
//! - Accumulating deltas into a final answer

pub mod aggregator;
pub mod decoder;
pub mod stream;

pub use aggregator::*;
pub use decoder::*;
pub use stream::*;
