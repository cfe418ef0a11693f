//! Incremental server-sent-event parser.
//!
//! The streaming endpoints deliver one JSON object per SSE `data:` payload.
//! Chunk boundaries fall anywhere, including mid-event and mid-UTF-8
//! sequence, so the parser keeps an owned byte buffer and only emits events
//! that are terminated by a blank line. Feeding a byte sequence in any
//! chunking yields the same events in the same order.
//!
//! Events without a `data` field, or whose payload is not valid JSON, are
//! dropped. The literal payload `[DONE]` is surfaced as `{"done": true}` and
//! marks stream completion.

use regex::bytes::Regex;
use serde_json::Value;

/// One parsed SSE event.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub id: Option<String>,
    pub event: Option<String>,
    pub retry: Option<u64>,
    pub data: Value,
}

impl SseEvent {
    /// Whether this event marks end-of-stream: either the rewritten
    /// `{"done": true}` marker or a raw `"[DONE]"` string payload.
    pub fn is_done(&self) -> bool {
        if self.data.as_str() == Some("[DONE]") {
            return true;
        }
        self.data
            .as_object()
            .map(|obj| obj.get("done").and_then(Value::as_bool) == Some(true))
            .unwrap_or(false)
    }
}

/// Stateful chunk-boundary-tolerant parser. One instance per connection;
/// the only state carried between chunks is the unterminated tail.
pub struct SseParser {
    buffer: Vec<u8>,
    delimiter: Regex,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            // Blank line between events, in either line-ending convention.
            delimiter: Regex::new(r"\r?\n\r?\n").expect("event delimiter pattern"),
        }
    }

    /// Consume one chunk and return every event it completed.
    ///
    /// The final split fragment is retained as the new buffer; everything
    /// before it belongs to exactly one terminated candidate event.
    pub fn parse_chunk(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        let buffer = std::mem::take(&mut self.buffer);
        let mut fragments: Vec<&[u8]> = self.delimiter.split(&buffer).collect();
        let tail = fragments.pop().unwrap_or_default().to_vec();

        let events = fragments.into_iter().filter_map(parse_candidate).collect();
        self.buffer = tail;
        events
    }

    /// Parse whatever remains in the buffer as one final candidate event.
    /// Called when the connection closes without a trailing blank line.
    pub fn finalize(&mut self) -> Vec<SseEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_candidate(&rest).into_iter().collect()
    }

    /// Bytes currently held back waiting for an event terminator.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse one blank-line-delimited candidate into an event.
///
/// Returns `None` (dropping the candidate) when there is no `data` field or
/// the joined payload is not valid JSON. Malformed input is never fatal.
fn parse_candidate(raw: &[u8]) -> Option<SseEvent> {
    if raw.is_empty() {
        return None;
    }
    let Ok(text) = std::str::from_utf8(raw) else {
        tracing::debug!(len = raw.len(), "dropping non-UTF-8 SSE candidate");
        return None;
    };

    let mut data_lines: Vec<&str> = Vec::new();
    let mut id = None;
    let mut event = None;
    let mut retry = None;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some((field, value)) = line.split_once(": ") else {
            continue;
        };
        match field {
            "data" => data_lines.push(value),
            "event" => event = Some(value.to_string()),
            "id" => id = Some(value.to_string()),
            "retry" => retry = value.trim().parse().ok(),
            _ => {}
        }
    }

    if data_lines.is_empty() {
        return None;
    }

    // Multiple data lines concatenate with a newline, per the SSE protocol.
    let payload = data_lines.join("\n");
    let data = if payload == "[DONE]" {
        serde_json::json!({ "done": true })
    } else {
        match serde_json::from_str(&payload) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(%err, "dropping SSE event with non-JSON data payload");
                return None;
            }
        }
    };

    Some(SseEvent {
        id,
        event,
        retry,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_all(chunks: &[&[u8]]) -> Vec<SseEvent> {
        let mut parser = SseParser::new();
        let mut events = Vec::new();
        for chunk in chunks {
            events.extend(parser.parse_chunk(chunk));
        }
        events.extend(parser.finalize());
        events
    }

    #[test]
    fn empty_input_produces_nothing() {
        assert!(parse_all(&[b""]).is_empty());
    }

    #[test]
    fn bare_blank_line_produces_nothing() {
        assert!(parse_all(&[b"\n\n"]).is_empty());
    }

    #[test]
    fn minimal_event() {
        let events = parse_all(&[b"data: {}\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!({}));
    }

    #[test]
    fn event_split_across_chunk_boundaries() {
        let mut parser = SseParser::new();
        assert!(parser.parse_chunk(b"data: {\"x\":").is_empty());
        assert!(parser.parse_chunk(b"1}\n").is_empty());
        let events = parser.parse_chunk(b"\ndata: [DONE]\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, json!({"x": 1}));
        assert!(!events[0].is_done());
        assert_eq!(events[1].data, json!({"done": true}));
        assert!(events[1].is_done());
    }

    #[test]
    fn chunking_is_associative() {
        let input: &[u8] = b"event: message\nid: 7\ndata: {\"a\": 1}\n\n\
            data: not json\n\n\
            : keep-alive comment\n\n\
            data: {\"b\":\n\
            data: 2}\r\n\r\n\
            retry: 250\ndata: [DONE]\n\n";

        let whole = parse_all(&[input]);

        // Byte-at-a-time.
        let singles: Vec<&[u8]> = input.chunks(1).collect();
        assert_eq!(parse_all(&singles), whole);

        // A handful of uneven partitions.
        for size in [2, 3, 5, 7, 11, 13] {
            let chunks: Vec<&[u8]> = input.chunks(size).collect();
            assert_eq!(parse_all(&chunks), whole, "chunk size {size}");
        }

        assert_eq!(whole.len(), 3);
        assert_eq!(whole[0].data, json!({"a": 1}));
        assert_eq!(whole[0].id.as_deref(), Some("7"));
        assert_eq!(whole[0].event.as_deref(), Some("message"));
        // Multiple data lines concatenate before JSON parsing.
        assert_eq!(whole[1].data, json!({"b": 2}));
        assert_eq!(whole[2].retry, Some(250));
        assert!(whole[2].is_done());
    }

    #[test]
    fn buffer_never_retains_a_complete_event() {
        let delimiter = Regex::new(r"\r?\n\r?\n").unwrap();
        let input: &[u8] = b"data: {\"a\":1}\n\ndata: {\"b\":2}\r\n\r\ndata: {\"c\"";
        let mut parser = SseParser::new();
        for chunk in input.chunks(3) {
            parser.parse_chunk(chunk);
            assert!(
                !delimiter.is_match(&parser.buffer),
                "buffer holds a terminated event"
            );
        }
    }

    #[test]
    fn malformed_json_is_dropped_and_parsing_continues() {
        let events = parse_all(&[b"data: {oops\n\ndata: {\"ok\": true}\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!({"ok": true}));
    }

    #[test]
    fn events_without_data_are_dropped() {
        let events = parse_all(&[b"event: ping\nid: 3\n\ndata: {\"x\": 1}\n\n"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!({"x": 1}));
    }

    #[test]
    fn crlf_line_endings() {
        let events = parse_all(&[b"data: {\"x\": 1}\r\n\r\ndata: {\"y\": 2}\r\n\r\n"]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].data, json!({"y": 2}));
    }

    #[test]
    fn utf8_split_inside_a_multibyte_character() {
        let input = "data: {\"text\": \"héllo\"}\n\n".as_bytes();
        // Split in the middle of the two-byte 'é'.
        let split = input.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let events = parse_all(&[&input[..split], &input[split..]]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!({"text": "héllo"}));
    }

    #[test]
    fn finalize_flushes_an_unterminated_event() {
        let mut parser = SseParser::new();
        assert!(parser.parse_chunk(b"data: {\"last\": true}").is_empty());
        let events = parser.finalize();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, json!({"last": true}));
        assert_eq!(parser.buffered(), 0);
    }

    #[test]
    fn done_detection_accepts_the_raw_string_form() {
        let event = SseEvent {
            id: None,
            event: None,
            retry: None,
            data: json!("[DONE]"),
        };
        assert!(event.is_done());

        let event = SseEvent {
            id: None,
            event: None,
            retry: None,
            data: json!({"done": false}),
        };
        assert!(!event.is_done());
    }
}
