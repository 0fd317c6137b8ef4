//! Queue message types.

use serde::{Deserialize, Serialize};

use crate::line::Event;

/// Queue name for verified LINE events.
pub const LINE_EVENTS_QUEUE: &str = "line_events";

/// Envelope for a single verified event on the `line_events` queue.
///
/// The routing fields are lifted out of the event so consumers can filter
/// without parsing it; `event` carries the full object as LINE sent it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedEvent {
    /// LINE's unique id for the event, used for deduplication downstream
    pub webhook_event_id: Option<String>,
    /// LINE event type (`message`, `postback`, ...)
    pub event_type: String,
    /// Group, room or user id the event came from
    pub source_id: Option<String>,
    /// Event time in milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Whether LINE marked this as a redelivery
    #[serde(default)]
    pub is_redelivery: bool,
    /// Bot user ID that received the event
    pub destination: Option<String>,
    /// Full event object
    pub event: serde_json::Value,
}

impl QueuedEvent {
    /// Build an envelope from a typed event and its raw JSON.
    pub fn new(event: &Event, raw: serde_json::Value, destination: Option<String>) -> Self {
        Self {
            webhook_event_id: event.webhook_event_id.clone(),
            event_type: event.event_type.clone(),
            source_id: event
                .source
                .as_ref()
                .and_then(|s| s.id())
                .map(str::to_string),
            timestamp: event.timestamp,
            is_redelivery: event.is_redelivery(),
            destination,
            event: raw,
        }
    }

    /// Message id used when publishing.
    pub fn message_id(&self) -> String {
        match &self.webhook_event_id {
            Some(id) => id.clone(),
            None => format!("{}-{}", self.event_type, self.timestamp),
        }
    }
}
