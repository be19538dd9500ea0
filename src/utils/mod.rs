//! Utility modules
//!
//! This module contains utility functions and types used throughout the crate.

pub mod cancel;

pub use cancel::{CancelHandle, make_cancellable_stream};
