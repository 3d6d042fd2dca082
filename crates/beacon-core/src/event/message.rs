//! Message events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Origin;

/// Message sender information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sender {
    /// Sender's user ID.
    #[serde(default)]
    pub user_id: Option<i64>,
    /// Nickname.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Gender ("male", "female", "unknown").
    #[serde(default)]
    pub sex: Option<String>,
    /// Age.
    #[serde(default)]
    pub age: Option<i64>,
    /// Group card (group display name).
    #[serde(default)]
    pub card: Option<String>,
    /// Membership level.
    #[serde(default)]
    pub level: Option<String>,
    /// Group role ("owner", "admin", "member").
    #[serde(default)]
    pub role: Option<String>,
    /// Group title.
    #[serde(default)]
    pub title: Option<String>,
    /// Group the temporary session originated from, when applicable.
    #[serde(default)]
    pub group_id: Option<i64>,
}

impl Sender {
    /// Display name: the group card when set, otherwise the nickname.
    pub fn display_name(&self) -> &str {
        match self.card.as_deref() {
            Some(card) if !card.is_empty() => card,
            _ => self.nickname.as_deref().unwrap_or(""),
        }
    }
}

/// Anonymous poster information for anonymous group messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anonymous {
    /// Anonymous user ID.
    pub id: i64,
    /// Anonymous display name.
    pub name: String,
    /// Flag used for moderation actions against the anonymous user.
    pub flag: String,
}

/// A message from a private (direct) session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivateMessage {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Message ID.
    pub message_id: i64,
    /// Sender's user ID.
    pub user_id: i64,
    /// Message content segments.
    pub message: Value,
    /// Raw message string.
    #[serde(default)]
    pub raw_message: String,
    /// Font (usually 0).
    #[serde(default)]
    pub font: i64,
    /// Sender information.
    #[serde(default)]
    pub sender: Sender,
    /// Sub-type ("friend", "group", "other").
    #[serde(default)]
    pub sub_type: String,
    /// Source group for temporary sessions.
    #[serde(default)]
    pub temp_source: Option<i64>,
}

/// A message posted in a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMessage {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Message ID.
    pub message_id: i64,
    /// Group the message was posted in.
    pub group_id: i64,
    /// Sender's user ID.
    pub user_id: i64,
    /// Message content segments.
    pub message: Value,
    /// Raw message string.
    #[serde(default)]
    pub raw_message: String,
    /// Font (usually 0).
    #[serde(default)]
    pub font: i64,
    /// Sender information.
    #[serde(default)]
    pub sender: Sender,
    /// Sub-type ("normal", "anonymous", "notice").
    #[serde(default)]
    pub sub_type: String,
    /// Present when the message was posted anonymously.
    #[serde(default)]
    pub anonymous: Option<Anonymous>,
}

/// A received message, private or group.
#[derive(Debug, Clone)]
pub enum MessageEvent {
    /// Direct message.
    Private(PrivateMessage),
    /// Group message.
    Group(GroupMessage),
}

impl MessageEvent {
    /// The sender's user ID.
    pub fn user_id(&self) -> i64 {
        match self {
            Self::Private(ev) => ev.user_id,
            Self::Group(ev) => ev.user_id,
        }
    }

    /// The message ID.
    pub fn message_id(&self) -> i64 {
        match self {
            Self::Private(ev) => ev.message_id,
            Self::Group(ev) => ev.message_id,
        }
    }

    /// The raw message text.
    pub fn raw_message(&self) -> &str {
        match self {
            Self::Private(ev) => &ev.raw_message,
            Self::Group(ev) => &ev.raw_message,
        }
    }
}
