use crate::error::RealtimeError;
use serde::Deserialize;
use serde_json::Value;

/// A raw server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser for a `text/event-stream` body
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every event it completes
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "event" => self.event = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }
        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        let data = std::mem::take(&mut self.data);
        if event.is_none() && data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
        })
    }
}

#[derive(Deserialize)]
struct PathData {
    path: String,
    data: Value,
}

/// Events of the database streaming protocol
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Replace the value at `path` (relative to the subscription)
    Put { path: String, data: Value },
    /// Merge the members of `data` into `path`
    Patch { path: String, data: Value },
    KeepAlive,
    /// Read permission was lost; the server closes the stream
    Cancel(String),
    /// The auth token expired; the server closes the stream
    AuthRevoked,
    Unknown(String),
}

impl TryFrom<SseEvent> for StreamEvent {
    type Error = RealtimeError;

    fn try_from(event: SseEvent) -> Result<Self, Self::Error> {
        match event.event.as_str() {
            "put" => {
                let body: PathData = serde_json::from_str(&event.data)?;
                Ok(StreamEvent::Put {
                    path: body.path,
                    data: body.data,
                })
            }
            "patch" => {
                let body: PathData = serde_json::from_str(&event.data)?;
                Ok(StreamEvent::Patch {
                    path: body.path,
                    data: body.data,
                })
            }
            "keep-alive" => Ok(StreamEvent::KeepAlive),
            "cancel" => {
                let reason = match serde_json::from_str::<Value>(&event.data) {
                    Ok(Value::String(s)) => s,
                    _ => event.data,
                };
                Ok(StreamEvent::Cancel(reason))
            }
            "auth_revoked" => Ok(StreamEvent::AuthRevoked),
            other => Ok(StreamEvent::Unknown(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_events_split_across_chunks() {
        let mut parser = SseParser::new();
        let mut events = parser.feed(b"event: put\r\ndata: {\"path\":\"/\",");
        assert!(events.is_empty());
        events.extend(parser.feed(b"\"data\":{\"a\":1}}\r\n\r\nevent: keep-alive\ndata: null\n\n"));

        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: "put".to_string(),
                    data: "{\"path\":\"/\",\"data\":{\"a\":1}}".to_string()
                },
                SseEvent {
                    event: "keep-alive".to_string(),
                    data: "null".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_comments_and_multiline_data() {
        let mut parser = SseParser::new();
        let events = parser.feed(b": hello\ndata: one\ndata: two\n\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, "message");
        assert_eq!(events[0].data, "one\ntwo");
    }

    #[test]
    fn test_stream_event_decoding() {
        let put = StreamEvent::try_from(SseEvent {
            event: "put".to_string(),
            data: json!({ "path": "/p1", "data": { "name": "Lamp" } }).to_string(),
        })
        .unwrap();
        assert_eq!(
            put,
            StreamEvent::Put {
                path: "/p1".to_string(),
                data: json!({ "name": "Lamp" })
            }
        );

        let cancel = StreamEvent::try_from(SseEvent {
            event: "cancel".to_string(),
            data: "\"Permission denied\"".to_string(),
        })
        .unwrap();
        assert_eq!(cancel, StreamEvent::Cancel("Permission denied".to_string()));

        let bad = StreamEvent::try_from(SseEvent {
            event: "patch".to_string(),
            data: "not json".to_string(),
        });
        assert!(bad.is_err());
    }
}
