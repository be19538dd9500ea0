//! Byte stream → event stream adapter.

use crate::error::FlowError;
use crate::streaming::decoder::{StreamDecoder, StreamEvent};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::time::Duration;

/// Raw body chunks as delivered by a transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, FlowError>> + Send>>;

/// Decoded stream events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, FlowError>> + Send>>;

/// Decode a byte stream into [`StreamEvent`]s.
///
/// The returned stream ends right after a `Done` event or when the byte stream
/// ends, whichever comes first; a transport error is yielded once and ends the
/// stream. With `idle_timeout` set, waiting longer than the timeout for the
/// next chunk yields `FlowError::TimeoutError`.
pub fn decode_byte_stream(byte_stream: ByteStream, idle_timeout: Option<Duration>) -> EventStream {
    let out = async_stream::stream! {
        let mut bytes = byte_stream;
        let mut decoder = StreamDecoder::new();

        loop {
            let next = match idle_timeout {
                Some(t) => match tokio::time::timeout(t, bytes.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(FlowError::TimeoutError(format!(
                            "no stream data received for {}ms",
                            t.as_millis()
                        )));
                        return;
                    }
                },
                None => bytes.next().await,
            };

            match next {
                Some(Ok(chunk)) => {
                    for event in decoder.push(&chunk) {
                        yield Ok(event);
                    }
                    if decoder.is_finished() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    yield Err(e);
                    return;
                }
                None => {
                    for event in decoder.finish() {
                        yield Ok(event);
                    }
                    return;
                }
            }
        }
    };
    Box::pin(out)
}
