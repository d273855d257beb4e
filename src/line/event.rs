//! Inbound webhook payload

use serde::Deserialize;

use crate::error::WebhookError;
use crate::identity::Identity;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl WebhookPayload {
    /// Decode a raw (already verified) request body
    pub fn from_body(body: &[u8]) -> Result<Self, WebhookError> {
        serde_json::from_slice(body).map_err(|e| WebhookError::Malformed(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl Source {
    /// `user:` if a user id is present, else `group:`, else `room:`
    pub fn identity(&self) -> Identity {
        if let Some(id) = non_empty(&self.user_id) {
            Identity::User(id.to_string())
        } else if let Some(id) = non_empty(&self.group_id) {
            Identity::Group(id.to_string())
        } else if let Some(id) = non_empty(&self.room_id) {
            Identity::Room(id.to_string())
        } else {
            Identity::Unknown
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        non_empty(&self.user_id)
    }

    pub fn group_id(&self) -> Option<&str> {
        non_empty(&self.group_id)
    }

    pub fn room_id(&self) -> Option<&str> {
        non_empty(&self.room_id)
    }

    pub fn is_multi_party(&self) -> bool {
        matches!(self.kind.as_str(), "group" | "room")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub mention: Option<Mention>,
}

impl EventMessage {
    pub fn mentionees(&self) -> &[Mentionee] {
        self.mention
            .as_ref()
            .map(|m| m.mentionees.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Mention {
    #[serde(default)]
    pub mentionees: Vec<Mentionee>,
}

/// A mention occupying `length` characters starting at character `index`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mentionee {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub is_self: bool,
}

impl Mentionee {
    pub fn user_id(&self) -> Option<&str> {
        non_empty(&self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undecodable_body_is_malformed() {
        assert!(matches!(
            WebhookPayload::from_body(b"{\"events\": [1"),
            Err(WebhookError::Malformed(_))
        ));
        let empty = WebhookPayload::from_body(b"{}").unwrap();
        assert!(empty.events.is_empty());
    }

    #[test]
    fn test_parse_group_message() {
        let raw = r#"{
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "replyToken": "tok",
                "source": {"type": "group", "groupId": "G1", "userId": "U1"},
                "message": {
                    "type": "text",
                    "id": "1",
                    "text": "@bot 5",
                    "mention": {"mentionees": [
                        {"index": 0, "length": 4, "userId": "Ubot", "type": "user", "isSelf": true}
                    ]}
                }
            }]
        }"#;
        let payload: WebhookPayload = serde_json::from_str(raw).unwrap();
        let event = &payload.events[0];
        assert_eq!(event.reply_token.as_deref(), Some("tok"));
        assert!(event.source.is_multi_party());
        assert_eq!(event.source.identity(), Identity::user("U1"));
        let message = event.message.as_ref().unwrap();
        assert_eq!(message.mentionees().len(), 1);
        assert!(message.mentionees()[0].is_self);
    }

    #[test]
    fn test_identity_fallbacks() {
        let source = Source {
            kind: "group".to_string(),
            user_id: Some(String::new()),
            group_id: Some("G1".to_string()),
            room_id: None,
        };
        assert_eq!(source.identity(), Identity::Group("G1".to_string()));
        assert_eq!(Source::default().identity(), Identity::Unknown);
    }

    #[test]
    fn test_follow_event_without_message() {
        let raw = r#"{"events": [{
            "type": "follow",
            "replyToken": "t",
            "source": {"type": "user", "userId": "U1"}
        }]}"#;
        let payload: WebhookPayload = serde_json::from_str(raw).unwrap();
        assert!(payload.events[0].message.is_none());
    }
}
