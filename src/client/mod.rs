//! Clients for the model streaming endpoint and the execution API.

pub mod chat;
pub mod execution;

pub use chat::{ChatClient, ChatStreamHandle, DeltaStream};
pub use execution::{ExecutionClient, StopExecutionResponse};
