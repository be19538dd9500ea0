//! # flowstream - Streaming execution pipeline
//!
//! flowstream drives workflow executions and the model calls inside them:
//!
#![deny(unsafe_code)]

//! - **Stream decoding**: SSE `data:` frames and raw JSON lines are decoded
//!   incrementally from arbitrary byte chunks.
//! - **Response aggregation**: `ChatClient` posts a chat request and assembles
//!   the streamed answer, with cancellation and a non-streaming fallback.
//! - **Execution store**: an explicit, cloneable table of execution records
//!   with forward-only status and shallow partial merges.
//! - **Realtime updates**: a WebSocket subscription per execution that folds
//!   push messages into the store.
//! - **Execution API**: start, stop and inspect executions over HTTP.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowstream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), FlowError> {
//!     let client = ChatClient::new(ChatConfig::from_env()?)?;
//!     let cancel = CancelHandle::new();
//!     let answer = client
//!         .aggregate(&[ChatMessage::user("Summarize the last run")], &cancel)
//!         .await?;
//!     println!("{}", answer.text);
//!
//!     let store = ExecutionStore::new();
//!     let api = ExecutionApiConfig::from_env()?;
//!     let executions = ExecutionClient::new(api.clone(), store.clone())?;
//!     let id = executions
//!         .start("wf-report", serde_json::json!({"day": "monday"}), "cli")
//!         .await?;
//!
//!     let channel = RealtimeChannel::new(store.clone(), api);
//!     let mut sub = channel.subscribe(id.clone(), |e| eprintln!("realtime: {e}"));
//!     sub.closed().await;
//!     println!("{:?}", store.get(&id));
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod defaults;
pub mod error;
pub mod execution;
pub mod observability;
pub mod realtime;
pub mod store;
pub mod streaming;
pub mod types;
pub mod utils;

pub use error::{ErrorCategory, FlowError};

/// Commonly used items.
pub mod prelude {
    pub use crate::client::{ChatClient, ChatStreamHandle, ExecutionClient, StopExecutionResponse};
    pub use crate::config::{ChatConfig, ExecutionApiConfig};
    pub use crate::error::{ErrorCategory, FlowError};
    pub use crate::execution::{HttpInterceptor, LoggingInterceptor};
    pub use crate::realtime::{RealtimeChannel, Subscription, apply_message};
    pub use crate::store::{ExecutionStore, StoreEvent};
    pub use crate::streaming::{AggregatedResponse, StreamDecoder, StreamEvent};
    pub use crate::types::{
        ChatMessage, ExecutionRecord, ExecutionStatus, ExecutionUpdate, HttpConfig, MessageRole,
    };
    pub use crate::utils::CancelHandle;
}
