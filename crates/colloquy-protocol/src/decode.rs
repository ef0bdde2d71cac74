//! Decoding of framed protocol envelopes into typed events

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ProtocolError, Result};
use crate::types::Message;

/// SSE framing token prefixing streamed envelopes
const DATA_PREFIX: &str = "data:";

/// A typed event decoded from the stream or from a stored envelope.
///
/// Only the four effectful tags get their own variant; everything else that
/// is structurally valid lands in `Unknown` so newer servers don't break
/// older clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Bulk replacement of the canonical message log
    MessagesSnapshot { messages: Vec<Message> },
    /// Incremental text appended to the in-progress assistant message
    TextDelta { message_id: String, delta: String },
    /// Named out-of-band signal with an opaque payload
    Custom { name: String, value: Value },
    /// Terminal marker for one request cycle
    RunFinished {
        thread_id: Option<String>,
        run_id: Option<String>,
    },
    /// Structurally valid event with an unrecognized tag
    Unknown { event_type: String, payload: Value },
}

#[derive(Deserialize)]
struct SnapshotPayload {
    messages: Vec<Message>,
}

#[derive(Deserialize)]
struct TextDeltaPayload {
    #[serde(rename = "messageId", default)]
    message_id: String,
    delta: String,
}

#[derive(Deserialize)]
struct CustomPayload {
    name: String,
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct RunFinishedPayload {
    #[serde(rename = "threadId")]
    thread_id: Option<String>,
    #[serde(rename = "runId")]
    run_id: Option<String>,
}

/// Strip the optional SSE framing token and surrounding whitespace.
fn strip_framing(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix(DATA_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

/// Decode one framed envelope into a protocol event.
///
/// Fails with `MalformedEvent` when the payload is not JSON, has no string
/// `type` tag, or a recognized tag's payload doesn't match its shape.
pub fn decode_event(raw: &str) -> Result<ProtocolEvent> {
    let payload = strip_framing(raw);
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| ProtocolError::malformed(format!("not valid JSON: {}", e)))?;

    let Some(event_type) = value.get("type").and_then(Value::as_str) else {
        return Err(ProtocolError::malformed("missing string `type` tag"));
    };
    let event_type = event_type.to_string();

    fn shape_err(tag: &str, e: serde_json::Error) -> ProtocolError {
        ProtocolError::malformed(format!("{}: {}", tag, e))
    }

    match event_type.as_str() {
        "MESSAGES_SNAPSHOT" => {
            let p: SnapshotPayload =
                serde_json::from_value(value).map_err(|e| shape_err("MESSAGES_SNAPSHOT", e))?;
            Ok(ProtocolEvent::MessagesSnapshot {
                messages: p.messages,
            })
        }
        "TEXT_MESSAGE_CONTENT" => {
            let p: TextDeltaPayload =
                serde_json::from_value(value).map_err(|e| shape_err("TEXT_MESSAGE_CONTENT", e))?;
            Ok(ProtocolEvent::TextDelta {
                message_id: p.message_id,
                delta: p.delta,
            })
        }
        "CUSTOM" => {
            let p: CustomPayload =
                serde_json::from_value(value).map_err(|e| shape_err("CUSTOM", e))?;
            Ok(ProtocolEvent::Custom {
                name: p.name,
                value: p.value,
            })
        }
        "RUN_FINISHED" => {
            let p: RunFinishedPayload =
                serde_json::from_value(value).map_err(|e| shape_err("RUN_FINISHED", e))?;
            Ok(ProtocolEvent::RunFinished {
                thread_id: p.thread_id,
                run_id: p.run_id,
            })
        }
        _ => Ok(ProtocolEvent::Unknown {
            event_type,
            payload: value,
        }),
    }
}

/// Decode a stored canonical envelope, which must hold exactly one
/// messages snapshot. Any other tag at this position is a protocol
/// violation.
pub fn decode_snapshot(raw: &str) -> Result<Vec<Message>> {
    match decode_event(raw)? {
        ProtocolEvent::MessagesSnapshot { messages } => Ok(messages),
        ProtocolEvent::Unknown { event_type, .. } => Err(ProtocolError::UnexpectedEventShape {
            expected: "MESSAGES_SNAPSHOT".to_string(),
            got: event_type,
        }),
        other => Err(ProtocolError::UnexpectedEventShape {
            expected: "MESSAGES_SNAPSHOT".to_string(),
            got: tag_of(&other).to_string(),
        }),
    }
}

fn tag_of(event: &ProtocolEvent) -> &'static str {
    match event {
        ProtocolEvent::MessagesSnapshot { .. } => "MESSAGES_SNAPSHOT",
        ProtocolEvent::TextDelta { .. } => "TEXT_MESSAGE_CONTENT",
        ProtocolEvent::Custom { .. } => "CUSTOM",
        ProtocolEvent::RunFinished { .. } => "RUN_FINISHED",
        ProtocolEvent::Unknown { .. } => "UNKNOWN",
    }
}
