//! Outbound reply messages and their LINE JSON form

use serde_json::{json, Value};

/// Placeholder substituted with a mention in `textV2` messages
pub const USER_PLACEHOLDER: &str = "{user}";

/// LINE caps quick-reply button labels at 20 characters
const MAX_LABEL_CHARS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickReplyItem {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuickReply {
    pub items: Vec<QuickReplyItem>,
}

impl QuickReply {
    pub fn new(items: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|(label, text)| QuickReplyItem { label, text })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn to_json(&self) -> Value {
        let items: Vec<Value> = self
            .items
            .iter()
            .map(|item| {
                let label: String = item.label.chars().take(MAX_LABEL_CHARS).collect();
                json!({
                    "type": "action",
                    "action": {"type": "message", "label": label, "text": item.text},
                })
            })
            .collect();
        json!({ "items": items })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyMessage {
    Text {
        text: String,
        quick_reply: Option<QuickReply>,
    },
    Image {
        url: String,
    },
    Video {
        url: String,
        preview_url: String,
    },
    /// Text addressed to a user; `{user}` in `template` becomes a mention
    Mention {
        template: String,
        user_id: Option<String>,
        display_name: String,
    },
}

impl ReplyMessage {
    pub fn text(text: impl Into<String>) -> Self {
        ReplyMessage::Text {
            text: text.into(),
            quick_reply: None,
        }
    }

    pub fn text_with_quick_reply(text: impl Into<String>, quick_reply: QuickReply) -> Self {
        ReplyMessage::Text {
            text: text.into(),
            quick_reply: (!quick_reply.is_empty()).then_some(quick_reply),
        }
    }

    pub fn image(url: impl Into<String>) -> Self {
        ReplyMessage::Image { url: url.into() }
    }

    pub fn video(url: impl Into<String>, preview_url: impl Into<String>) -> Self {
        ReplyMessage::Video {
            url: url.into(),
            preview_url: preview_url.into(),
        }
    }

    /// Visible text, with `{user}` replaced by the display name
    pub fn rendered_text(&self) -> Option<String> {
        match self {
            ReplyMessage::Text { text, .. } => Some(text.clone()),
            ReplyMessage::Mention {
                template,
                display_name,
                ..
            } => Some(template.replace(USER_PLACEHOLDER, display_name)),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ReplyMessage::Text { text, quick_reply } => {
                let mut message = json!({"type": "text", "text": text});
                if let Some(quick_reply) = quick_reply {
                    message["quickReply"] = quick_reply.to_json();
                }
                message
            }
            ReplyMessage::Image { url } => json!({
                "type": "image",
                "originalContentUrl": url,
                "previewImageUrl": url,
            }),
            ReplyMessage::Video { url, preview_url } => json!({
                "type": "video",
                "originalContentUrl": url,
                "previewImageUrl": preview_url,
            }),
            ReplyMessage::Mention {
                template,
                user_id: Some(user_id),
                ..
            } if template.contains(USER_PLACEHOLDER) => json!({
                "type": "textV2",
                "text": template,
                "substitution": {
                    "user": {
                        "type": "mention",
                        "mentionee": {"type": "user", "userId": user_id},
                    }
                },
            }),
            ReplyMessage::Mention { .. } => json!({
                "type": "text",
                "text": self.rendered_text().unwrap_or_default(),
            }),
        }
    }
}
