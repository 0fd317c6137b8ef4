//! LINE Messaging API webhook payload model.
//!
//! Only parse bodies whose signature has already been verified.
//! Reference: https://developers.line.biz/en/reference/messaging-api/#webhook-event-objects

use serde::{Deserialize, Serialize};

/// Top-level webhook request body.
///
/// The "Verify" button in the LINE console sends a payload with an empty
/// `events` array, which must be accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Bot user ID that received the events
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<serde_json::Value>,
}

impl WebhookPayload {
    /// Parse a payload from the verified raw body.
    pub fn from_slice(raw_body: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(raw_body)
    }

    /// Typed views of each event.
    ///
    /// Events that do not match the expected shape are returned as errors so
    /// the caller can decide whether to skip them.
    pub fn typed_events(&self) -> impl Iterator<Item = serde_json::Result<Event>> + '_ {
        self.events.iter().map(|e| Event::deserialize(e))
    }
}

/// A single webhook event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: String,
    /// `active` or `standby`
    #[serde(default)]
    pub mode: Option<String>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub delivery_context: Option<DeliveryContext>,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub postback: Option<Postback>,
    #[serde(default)]
    pub beacon: Option<Beacon>,
}

/// Known event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Message,
    Follow,
    Unfollow,
    Join,
    Leave,
    MemberJoined,
    MemberLeft,
    Postback,
    Beacon,
    Unsupported(String),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self.event_type.as_str() {
            "message" => EventKind::Message,
            "follow" => EventKind::Follow,
            "unfollow" => EventKind::Unfollow,
            "join" => EventKind::Join,
            "leave" => EventKind::Leave,
            "memberJoined" => EventKind::MemberJoined,
            "memberLeft" => EventKind::MemberLeft,
            "postback" => EventKind::Postback,
            "beacon" => EventKind::Beacon,
            other => EventKind::Unsupported(other.to_string()),
        }
    }

    /// Whether LINE marked this delivery as a redelivery.
    pub fn is_redelivery(&self) -> bool {
        self.delivery_context
            .as_ref()
            .map(|c| c.is_redelivery)
            .unwrap_or(false)
    }
}

/// Where an event came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// `user`, `group` or `room`
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

impl Source {
    /// Most specific conversation id: group, then room, then user.
    pub fn id(&self) -> Option<&str> {
        self.group_id
            .as_deref()
            .or(self.room_id.as_deref())
            .or(self.user_id.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    #[serde(default)]
    pub is_redelivery: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Postback {
    pub data: String,
    #[serde(default)]
    pub params: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Beacon {
    pub hwid: String,
    #[serde(rename = "type")]
    pub beacon_type: String,
    #[serde(default)]
    pub dm: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "destination": "Uxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
        "events": [
            {
                "type": "message",
                "message": {"type": "text", "id": "14353798921116", "text": "bus 3 arrived"},
                "webhookEventId": "01FZ74A0TDDPYRVKNK77XKC3ZR",
                "deliveryContext": {"isRedelivery": false},
                "timestamp": 1625665242211,
                "source": {"type": "user", "userId": "U80696558e1aa831"},
                "replyToken": "757913772c4646b784d4b7ce46d12671",
                "mode": "active"
            },
            {
                "type": "postback",
                "postback": {"data": "action=ack&trip=42"},
                "webhookEventId": "01FZ74A0TDDPYRVKNK77XKC3ZS",
                "deliveryContext": {"isRedelivery": true},
                "timestamp": 1625665242300,
                "source": {"type": "group", "groupId": "Ca56f94637c", "userId": "U4af4980629"},
                "mode": "active"
            },
            {
                "type": "videoPlayComplete",
                "timestamp": 1625665242400,
                "videoPlayComplete": {"trackingId": "track-id"}
            }
        ]
    }"#;

    #[test]
    fn test_parse_empty_verification_payload() {
        let payload = WebhookPayload::from_slice(br#"{"events":[]}"#).unwrap();
        assert!(payload.destination.is_none());
        assert!(payload.events.is_empty());
    }

    #[test]
    fn test_parse_missing_events() {
        let payload = WebhookPayload::from_slice(br#"{"destination":"U1"}"#).unwrap();
        assert_eq!(payload.destination.as_deref(), Some("U1"));
        assert!(payload.events.is_empty());
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(WebhookPayload::from_slice(b"not json").is_err());
        assert!(WebhookPayload::from_slice(br#"{"events":{}}"#).is_err());
    }

    #[test]
    fn test_typed_events() {
        let payload = WebhookPayload::from_slice(SAMPLE.as_bytes()).unwrap();
        let events: Vec<Event> = payload.typed_events().map(|e| e.unwrap()).collect();

        assert_eq!(events.len(), 3);

        let message = &events[0];
        assert_eq!(message.kind(), EventKind::Message);
        assert_eq!(message.message.as_ref().unwrap().text.as_deref(), Some("bus 3 arrived"));
        assert_eq!(message.source.as_ref().unwrap().id(), Some("U80696558e1aa831"));
        assert!(!message.is_redelivery());

        let postback = &events[1];
        assert_eq!(postback.kind(), EventKind::Postback);
        assert_eq!(postback.postback.as_ref().unwrap().data, "action=ack&trip=42");
        assert_eq!(postback.source.as_ref().unwrap().id(), Some("Ca56f94637c"));
        assert!(postback.is_redelivery());

        assert_eq!(
            events[2].kind(),
            EventKind::Unsupported("videoPlayComplete".to_string())
        );
        assert!(events[2].webhook_event_id.is_none());
    }

    #[test]
    fn test_typed_event_shape_error() {
        let payload = WebhookPayload::from_slice(br#"{"events":[{"type":"follow"}]}"#).unwrap();
        let results: Vec<_> = payload.typed_events().collect();
        // Missing timestamp.
        assert!(results[0].is_err());
    }
}
