//! Line-oriented stream decoder
//!
//! Turns raw body chunks into [`StreamEvent`]s. Two framings are accepted on
//! the same stream:
//!
//! - SSE-style `data: {...}` lines, terminated by `data: [DONE]`
//! - raw JSON objects, one per line (NDJSON)
//!
//! Chunks do not need to align with line boundaries; partial lines are
//! buffered until their newline arrives or the transport ends.
//!
//! Lines that carry no payload produce no event at all: blank lines, `:`
//! comments, an empty `data:` field and the SSE `event:`, `id:` and `retry:`
//! fields. They are not reported as [`StreamEvent::Unparsable`]. Any other
//! line that fails to parse as JSON is.

use crate::defaults::stream::{DATA_PREFIX, DONE_MARKER};
use bytes::BytesMut;
use serde::{Deserialize, Serialize};
use tokio_util::codec::{AnyDelimiterCodec, Decoder};

/// Which field of a JSON frame produced a delta.
///
/// SSE `data:` payloads are probed in the order `Delta`, `Content`,
/// `ChoiceDelta`; raw JSON lines in the order `Content`, `Response`,
/// `MessageContent`. `Empty` is the named fallback when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaSource {
    /// `{"delta": "..."}`
    Delta,
    /// `{"content": "..."}`
    Content,
    /// `{"choices": [{"delta": {"content": "..."}}]}`
    ChoiceDelta,
    /// `{"response": "..."}`
    Response,
    /// `{"message": {"content": "..."}}`
    MessageContent,
    /// No text field present
    Empty,
}

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text
    Delta { text: String, source: DeltaSource },
    /// Explicit end-of-stream sentinel
    Done,
    /// A line that could not be parsed; dropped from the text
    Unparsable { raw: String },
}

impl StreamEvent {
    pub fn delta_text(&self) -> Option<&str> {
        match self {
            Self::Delta { text, .. } => Some(text),
            _ => None,
        }
    }
}

type Probe = fn(&serde_json::Value) -> Option<&str>;

fn delta_field(v: &serde_json::Value) -> Option<&str> {
    v.get("delta")?.as_str()
}

fn content_field(v: &serde_json::Value) -> Option<&str> {
    v.get("content")?.as_str()
}

fn response_field(v: &serde_json::Value) -> Option<&str> {
    v.get("response")?.as_str()
}

fn choice_delta_content(v: &serde_json::Value) -> Option<&str> {
    v.get("choices")?.get(0)?.get("delta")?.get("content")?.as_str()
}

fn choice_message_content(v: &serde_json::Value) -> Option<&str> {
    v.get("choices")?.get(0)?.get("message")?.get("content")?.as_str()
}

fn message_content(v: &serde_json::Value) -> Option<&str> {
    v.get("message")?.get("content")?.as_str()
}

const SSE_PROBES: &[(DeltaSource, Probe)] = &[
    (DeltaSource::Delta, delta_field),
    (DeltaSource::Content, content_field),
    (DeltaSource::ChoiceDelta, choice_delta_content),
];

const RAW_PROBES: &[(DeltaSource, Probe)] = &[
    (DeltaSource::Content, content_field),
    (DeltaSource::Response, response_field),
    (DeltaSource::MessageContent, message_content),
];

/// Probes used for a complete non-streaming JSON body.
const BODY_PROBES: &[(DeltaSource, Probe)] = &[
    (DeltaSource::Delta, delta_field),
    (DeltaSource::Content, content_field),
    (DeltaSource::Response, response_field),
    (DeltaSource::ChoiceDelta, choice_message_content),
    (DeltaSource::MessageContent, message_content),
];

fn probe(value: &serde_json::Value, probes: &[(DeltaSource, Probe)]) -> (String, DeltaSource) {
    probes
        .iter()
        .find_map(|(source, f)| f(value).map(|s| (s.to_string(), *source)))
        .unwrap_or_else(|| (String::new(), DeltaSource::Empty))
}

/// Extract the delta text of an SSE `data:` JSON payload.
pub fn extract_sse_delta(value: &serde_json::Value) -> (String, DeltaSource) {
    probe(value, SSE_PROBES)
}

/// Extract the delta text of a raw JSON line.
pub fn extract_raw_delta(value: &serde_json::Value) -> (String, DeltaSource) {
    probe(value, RAW_PROBES)
}

/// Extract the full text of a non-streaming JSON response body.
pub fn extract_body_text(value: &serde_json::Value) -> (String, DeltaSource) {
    probe(value, BODY_PROBES)
}

/// Classify one complete line (without its trailing newline).
///
/// Returns `None` for lines that carry nothing: blanks, `:` comments, an
/// empty `data:` field and the `event:`, `id:` and `retry:` fields. Their
/// values are dropped rather than surfaced as `Unparsable`.
pub fn classify_line(line: &str) -> Option<StreamEvent> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
        let payload = rest.strip_prefix(' ').unwrap_or(rest).trim();
        if payload == DONE_MARKER {
            return Some(StreamEvent::Done);
        }
        if payload.is_empty() {
            return None;
        }
        return Some(parse_json_frame(payload, extract_sse_delta));
    }

    if ["event:", "id:", "retry:"]
        .iter()
        .any(|field| trimmed.starts_with(field))
    {
        return None;
    }

    Some(parse_json_frame(trimmed, extract_raw_delta))
}

fn parse_json_frame(
    payload: &str,
    extract: fn(&serde_json::Value) -> (String, DeltaSource),
) -> StreamEvent {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) => {
            let (text, source) = extract(&value);
            StreamEvent::Delta { text, source }
        }
        Err(_) => StreamEvent::Unparsable {
            raw: payload.to_string(),
        },
    }
}

/// Incremental decoder over raw body chunks.
///
/// Once a `[DONE]` sentinel is seen or [`StreamDecoder::finish`] is called the
/// decoder is finished and yields nothing more.
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: BytesMut,
    codec: AnyDelimiterCodec,
    finished: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
            codec: AnyDelimiterCodec::new(b"\n".to_vec(), Vec::new()),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one chunk and return the events of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        // The codec has no length limit, so decoding cannot fail.
        while let Ok(Some(line)) = self.codec.decode(&mut self.buffer) {
            if self.emit_line(&line, &mut events) {
                break;
            }
        }
        events
    }

    /// Signal end-of-transport, flushing a trailing unterminated line.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        let mut events = Vec::new();
        while let Ok(Some(line)) = self.codec.decode_eof(&mut self.buffer) {
            if self.emit_line(&line, &mut events) {
                break;
            }
        }
        self.finished = true;
        self.buffer.clear();
        events
    }

    /// Returns true when the line terminated the stream.
    fn emit_line(&mut self, line: &[u8], events: &mut Vec<StreamEvent>) -> bool {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let event = match std::str::from_utf8(line) {
            Ok(text) => classify_line(text),
            Err(_) => Some(StreamEvent::Unparsable {
                raw: String::from_utf8_lossy(line).into_owned(),
            }),
        };
        match event {
            Some(StreamEvent::Done) => {
                events.push(StreamEvent::Done);
                self.finished = true;
                self.buffer.clear();
                true
            }
            Some(event) => {
                events.push(event);
                false
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(events: &[StreamEvent]) -> String {
        events.iter().filter_map(StreamEvent::delta_text).collect()
    }

    #[test]
    fn delta_precedence_is_delta_then_content() {
        let v = serde_json::json!({"delta": "a", "content": "b"});
        assert_eq!(extract_sse_delta(&v), ("a".to_string(), DeltaSource::Delta));
        let v = serde_json::json!({"content": "b"});
        assert_eq!(extract_sse_delta(&v), ("b".to_string(), DeltaSource::Content));
        let v = serde_json::json!({"choices": [{"delta": {"content": "c"}}]});
        assert_eq!(
            extract_sse_delta(&v),
            ("c".to_string(), DeltaSource::ChoiceDelta)
        );
        let v = serde_json::json!({"usage": {}});
        assert_eq!(extract_sse_delta(&v), (String::new(), DeltaSource::Empty));
    }

    #[test]
    fn non_string_delta_falls_through() {
        let v = serde_json::json!({"delta": {"role": "assistant"}, "content": "x"});
        assert_eq!(extract_sse_delta(&v), ("x".to_string(), DeltaSource::Content));
    }

    #[test]
    fn raw_lines_use_content_then_response() {
        assert_eq!(
            classify_line(r#"{"response":"hey"}"#),
            Some(StreamEvent::Delta {
                text: "hey".into(),
                source: DeltaSource::Response
            })
        );
        assert_eq!(
            classify_line(r#"{"message":{"role":"assistant","content":"yo"}}"#),
            Some(StreamEvent::Delta {
                text: "yo".into(),
                source: DeltaSource::MessageContent
            })
        );
    }

    #[test]
    fn ignored_lines() {
        assert_eq!(classify_line(""), None);
        assert_eq!(classify_line("   "), None);
        assert_eq!(classify_line(": keep-alive"), None);
        assert_eq!(classify_line("event: message"), None);
        assert_eq!(classify_line("id: 7"), None);
        assert_eq!(classify_line("retry: 3000"), None);
        assert_eq!(classify_line("data: "), None);
    }

    #[test]
    fn sse_field_lines_are_not_counted_as_unparsable() {
        let mut decoder = StreamDecoder::new();
        let body = "event: delta\nid: 41\nretry: 500\ndata: {\"delta\":\"x\"}\n\n";
        let events = decoder.push(body.as_bytes());
        assert_eq!(
            events,
            vec![StreamEvent::Delta {
                text: "x".into(),
                source: DeltaSource::Delta,
            }]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn malformed_lines_become_unparsable() {
        assert_eq!(
            classify_line("data: {not json"),
            Some(StreamEvent::Unparsable {
                raw: "{not json".into()
            })
        );
        assert_eq!(
            classify_line("garbage"),
            Some(StreamEvent::Unparsable {
                raw: "garbage".into()
            })
        );
    }

    #[test]
    fn done_marker_with_and_without_space() {
        assert_eq!(classify_line("data: [DONE]"), Some(StreamEvent::Done));
        assert_eq!(classify_line("data:[DONE]"), Some(StreamEvent::Done));
        assert_eq!(classify_line("data:  [DONE]  "), Some(StreamEvent::Done));
    }

    #[test]
    fn lines_split_across_chunks() {
        let mut dec = StreamDecoder::new();
        let mut events = dec.push(b"data: {\"del");
        assert!(events.is_empty());
        events.extend(dec.push(b"ta\":\"Hel\"}\n\ndata: {\"delta\":\"lo\"}"));
        events.extend(dec.push(b"\n\ndata: [DONE]\n\n"));
        assert_eq!(deltas(&events), "Hello");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
        assert!(dec.is_finished());
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let payload = "data: {\"delta\":\"héllo ✓\"}\n".as_bytes();
        let split = payload.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut dec = StreamDecoder::new();
        let mut events = dec.push(&payload[..split]);
        events.extend(dec.push(&payload[split..]));
        assert_eq!(deltas(&events), "héllo ✓");
    }

    #[test]
    fn crlf_line_endings() {
        let mut dec = StreamDecoder::new();
        let events = dec.push(b"data: {\"delta\":\"a\"}\r\n\r\ndata: [DONE]\r\n\r\n");
        assert_eq!(deltas(&events), "a");
        assert_eq!(events.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn nothing_after_done() {
        let mut dec = StreamDecoder::new();
        let events =
            dec.push(b"data: {\"delta\":\"a\"}\n\ndata: [DONE]\n\ndata: {\"delta\":\"b\"}\n\n");
        assert_eq!(deltas(&events), "a");
        assert_eq!(
            events.iter().filter(|e| **e == StreamEvent::Done).count(),
            1
        );
        assert!(dec.push(b"data: {\"delta\":\"c\"}\n").is_empty());
        assert!(dec.finish().is_empty());
    }

    #[test]
    fn finish_flushes_trailing_line() {
        let mut dec = StreamDecoder::new();
        assert!(dec.push(b"{\"content\":\"tail\"}").is_empty());
        let events = dec.finish();
        assert_eq!(deltas(&events), "tail");
        assert!(dec.is_finished());
        assert!(dec.push(b"{\"content\":\"more\"}\n").is_empty());
    }

    #[test]
    fn invalid_utf8_line_is_unparsable_and_stream_continues() {
        let mut dec = StreamDecoder::new();
        let mut chunk = b"data: {\"delta\":\"".to_vec();
        chunk.extend_from_slice(&[0xFF, 0xFE]);
        chunk.extend_from_slice(b"\"}\ndata: {\"delta\":\"ok\"}\n");
        let events = dec.push(&chunk);
        assert!(matches!(events[0], StreamEvent::Unparsable { .. }));
        assert_eq!(deltas(&events), "ok");
    }

    #[test]
    fn malformed_lines_interleaved_do_not_affect_text() {
        let body = "data: {\"delta\":\"A\"}\n\ndata: oops\n\nnot-json\n\n: ping\n\ndata: {\"delta\":\"B\"}\n\ndata: [DONE]\n\n";
        let mut dec = StreamDecoder::new();
        let events = dec.push(body.as_bytes());
        assert_eq!(deltas(&events), "AB");
        let unparsable = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Unparsable { .. }))
            .count();
        assert_eq!(unparsable, 2);
    }
}
