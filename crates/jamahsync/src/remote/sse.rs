//! Server-Sent Events parsing for schedule pushes.
//!
//! Parsing is pure: the HTTP store feeds raw text in and gets messages and
//! the unconsumed remainder back.

use jamahsync_core::schedule::{records_from_collection, ScheduleError, ScheduleRecord};

/// Event type carrying the full date-keyed collection.
pub const SNAPSHOT_EVENT: &str = "snapshot";

/// A parsed SSE message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    /// Event type, empty for keepalives.
    pub event_type: String,
    /// Data lines joined with `\n`.
    pub data: String,
    pub id: Option<String>,
}

impl SseMessage {
    pub fn is_heartbeat(&self) -> bool {
        self.event_type.is_empty()
    }
}

/// Parses the first complete message in `buffer`.
///
/// ```text
/// event: snapshot
/// data: {"2024-06-01": {...}}
/// id: 7
///
/// ```
///
/// Returns `Some((message, remaining_buffer))` when a full message is
/// available and `None` while the buffer holds only a partial one.
pub fn parse_sse_message(buffer: &str) -> Option<(SseMessage, String)> {
    let normalized;
    let buffer = if buffer.contains('\r') {
        normalized = buffer.replace("\r\n", "\n");
        normalized.as_str()
    } else {
        buffer
    };

    let end_pos = buffer.find("\n\n")?;
    let message_text = &buffer[..end_pos];
    let remaining = buffer[end_pos + 2..].to_string();

    let mut event_type = String::new();
    let mut data: Vec<&str> = Vec::new();
    let mut id = None;

    for line in message_text.lines() {
        if let Some(value) = line.strip_prefix("event:") {
            event_type = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("data:") {
            data.push(value.trim());
        } else if let Some(value) = line.strip_prefix("id:") {
            id = Some(value.trim().to_string());
        }
        // Comments (`:`) and unknown fields are ignored.
    }

    Some((
        SseMessage {
            event_type,
            data: data.join("\n"),
            id,
        },
        remaining,
    ))
}

/// Decodes a `snapshot` message into records.
///
/// Returns `None` for heartbeats and other event types.
pub fn decode_snapshot(message: &SseMessage) -> Option<Result<Vec<ScheduleRecord>, ScheduleError>> {
    if message.event_type != SNAPSHOT_EVENT {
        return None;
    }
    let decoded = serde_json::from_str::<serde_json::Value>(&message.data)
        .map_err(|_| ScheduleError::NotAnObject)
        .and_then(|value| records_from_collection(&value));
    Some(decoded)
}
