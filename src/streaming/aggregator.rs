//! Response Aggregator
//!
//! Accumulates decoded stream events into the final assembled answer.

use crate::error::FlowError;
use crate::streaming::decoder::StreamEvent;
use crate::streaming::stream::EventStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

/// Final answer assembled from a stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResponse {
    /// Ordered concatenation of every delta
    pub text: String,
    /// Number of delta events seen, including empty ones
    pub delta_count: usize,
    /// Number of lines dropped as unparsable
    pub unparsable_count: usize,
    /// Whether the stream ended with an explicit `[DONE]`
    pub saw_done: bool,
}

impl AggregatedResponse {
    /// The model produced no text at all.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Incremental accumulator over [`StreamEvent`]s.
#[derive(Debug, Default)]
pub struct ResponseAggregator {
    response: AggregatedResponse,
}

impl ResponseAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one event, returning the delta text it appended (if any).
    ///
    /// Events arriving after `Done` are ignored.
    pub fn process(&mut self, event: &StreamEvent) -> Option<String> {
        if self.response.saw_done {
            return None;
        }
        match event {
            StreamEvent::Delta { text, .. } => {
                self.response.delta_count += 1;
                self.response.text.push_str(text);
                Some(text.clone())
            }
            StreamEvent::Done => {
                self.response.saw_done = true;
                None
            }
            StreamEvent::Unparsable { .. } => {
                self.response.unparsable_count += 1;
                None
            }
        }
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.response.text
    }

    pub fn finish(self) -> AggregatedResponse {
        self.response
    }
}

/// Drain an event stream into an [`AggregatedResponse`].
///
/// Any transport error is returned as-is; partial text is discarded.
pub async fn aggregate_events(mut events: EventStream) -> Result<AggregatedResponse, FlowError> {
    let mut aggregator = ResponseAggregator::new();
    while let Some(event) = events.next().await {
        aggregator.process(&event?);
    }
    Ok(aggregator.finish())
}
