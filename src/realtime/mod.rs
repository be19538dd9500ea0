//! Realtime Update Channel
//!
//! Subscribes to an execution's push channel over WebSocket and folds every
//! message into an [`ExecutionStore`](crate::store::ExecutionStore).

mod channel;
mod message;

pub use channel::{RealtimeChannel, Subscription};
pub use message::{MessageOutcome, apply_message};
