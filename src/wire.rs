//! Push-channel framing shared by the hub and the client runtime.
//!
//! Every frame is a self-describing record tagged by a required `kind`
//! discriminator. Decoders reject frames that lack the discriminator and
//! silently skip kinds they do not know, so either side can grow new frame
//! kinds without breaking the other. Frames are notifications: none of them
//! requires a correlation id to be routable.

use crate::models::AgentSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Frame {
    Connected {
        session_id: String,
        agent_id: String,
        time: String,
    },
    Heartbeat {
        time: String,
    },
    AgentJoined {
        agent: AgentSummary,
        time: String,
    },
    AgentLeft {
        agent_id: String,
        reason: String,
        time: String,
    },
    Displaced {
        time: String,
    },
    SessionClosed {
        time: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame is missing the kind discriminator")]
    MissingKind,
    #[error("frame is not a JSON object: {0}")]
    Malformed(String),
}

impl Frame {
    /// SSE event name for this frame. Mirrors the `kind` tag in the payload.
    pub fn event_name(&self) -> &'static str {
        match self {
            Frame::Connected { .. } => "connected",
            Frame::Heartbeat { .. } => "heartbeat",
            Frame::AgentJoined { .. } => "agent_joined",
            Frame::AgentLeft { .. } => "agent_left",
            Frame::Displaced { .. } => "displaced",
            Frame::SessionClosed { .. } => "session_closed",
        }
    }

    /// Decode a frame payload. `Ok(None)` means the frame carried an unknown
    /// `kind` and should be ignored; `Err` means the payload is malformed or
    /// lacks the discriminator entirely (a protocol error).
    pub fn decode(data: &str) -> Result<Option<Frame>, FrameError> {
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| FrameError::Malformed(e.to_string()))?;
        let Some(obj) = value.as_object() else {
            return Err(FrameError::Malformed("expected an object".to_string()));
        };
        if !obj.get("kind").is_some_and(|k| k.is_string()) {
            return Err(FrameError::MissingKind);
        }
        // Unknown kinds deserialize to an error here; that is forward-compat
        // skippage, not a protocol violation.
        Ok(serde_json::from_value(value).ok())
    }
}

/// One parsed server-sent event: the optional `event:` name plus the joined
/// `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental SSE decoder. Feed raw chunks as they arrive off the wire;
/// complete events (terminated by a blank line) come back out, partial events
/// stay buffered until the next chunk.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &str) -> Vec<SseEvent> {
        self.buf.push_str(chunk);
        let mut events = Vec::new();

        // Events are separated by a blank line, in either line convention.
        while let Some(boundary) = find_event_boundary(&self.buf) {
            let raw = self.buf[..boundary.start].to_string();
            self.buf.drain(..boundary.end);
            if let Some(event) = parse_event(&raw) {
                events.push(event);
            }
        }
        events
    }
}

struct Boundary {
    start: usize, // length of the event text
    end: usize,   // length including the separator
}

fn find_event_boundary(buf: &str) -> Option<Boundary> {
    let lf = buf.find("\n\n").map(|i| Boundary { start: i, end: i + 2 });
    let crlf = buf
        .find("\r\n\r\n")
        .map(|i| Boundary { start: i, end: i + 4 });
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.start <= b.start { a } else { b }),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data_lines: Vec<&str> = Vec::new();

    for line in raw.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // `id:`, `retry:` and comment lines (`:`) are ignored.
    }

    if event.is_none() && data_lines.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data_lines.join("\n"),
    })
}
