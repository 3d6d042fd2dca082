//! Typed event model.
//!
//! Every inbound event is decoded into the closed [`Event`] union before it
//! reaches the dispatcher. Classification follows the protocol
//! discriminators:
//!
//! ```text
//! Event
//! ├── Message   post_type = "message" | "message_sent"
//! │   ├── Private   message_type = "private"
//! │   └── Group     message_type = "group"
//! ├── Notice    post_type = "notice"   (split by notice_type / sub_type)
//! ├── Request   post_type = "request"  (split by request_type)
//! ├── Meta      post_type = "meta_event"
//! └── Call      host-internal, never decoded from the wire
//! ```
//!
//! Adding an event kind means adding a variant here and a name to
//! [`EventName`]; every match over events is exhaustive, so the compiler
//! points at every site that needs updating. Unknown discriminator
//! combinations decode to [`EventError::Unrecognized`], which the dispatcher
//! logs as an anomaly and drops.
//!
//! Events are handed to handlers as `Arc<Event>` with no interior
//! mutability: a value observed by one handler is exactly the value every
//! sibling observes.

pub mod message;
pub mod meta;
pub mod notice;
pub mod request;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use message::{Anonymous, GroupMessage, MessageEvent, PrivateMessage, Sender};
pub use meta::{Heartbeat, Lifecycle, MetaEvent};
pub use notice::{
    ClientStatus, Essence, FriendAdd, FriendRecall, GroupAdmin, GroupBan, GroupCard,
    GroupDecrease, GroupIncrease, GroupRecall, GroupUpload, Honor, LuckyKing, NoticeEvent,
    OfflineFile, OfflineFileInfo, Poke, Title, UploadedFile,
};
pub use request::{FriendRequest, GroupRequest, RequestEvent};

use crate::call::CallEvent;

// =============================================================================
// Shared fields
// =============================================================================

/// Fields carried by every gateway event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Origin {
    /// Unix timestamp of the event.
    pub time: i64,
    /// Host account the event belongs to.
    pub self_id: i64,
}

// =============================================================================
// Event union
// =============================================================================

/// A fully decoded inbound event.
#[derive(Debug)]
pub enum Event {
    /// A received message.
    Message(MessageEvent),
    /// A state-change notice.
    Notice(NoticeEvent),
    /// A request awaiting approval.
    Request(RequestEvent),
    /// Gateway housekeeping.
    Meta(MetaEvent),
    /// A same-process plugin call.
    Call(CallEvent),
}

/// The closed set of dispatchable event names.
///
/// Used as the handler-registry key: a plugin declares its handlers against
/// these names, so an unknown name is a compile error rather than a silently
/// ignored registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Direct message.
    PrivateMessage,
    /// Group message.
    GroupMessage,
    /// Friend message recall.
    FriendRecall,
    /// Group message recall.
    GroupRecall,
    /// Member joined a group.
    GroupIncrease,
    /// Member left a group.
    GroupDecrease,
    /// Admin appointed or removed.
    GroupAdmin,
    /// Group file upload.
    GroupUpload,
    /// Group mute change.
    GroupBan,
    /// Friend added.
    FriendAdd,
    /// Group card change.
    GroupCard,
    /// Offline file received.
    OfflineFile,
    /// Other-client status change.
    ClientStatus,
    /// Essence list change.
    Essence,
    /// Poke notify.
    Poke,
    /// Lucky-king notify.
    LuckyKing,
    /// Honor notify.
    Honor,
    /// Title notify.
    Title,
    /// Friend request.
    FriendRequest,
    /// Group join request or invite.
    GroupRequest,
    /// Gateway heartbeat.
    Heartbeat,
    /// Gateway lifecycle report.
    Lifecycle,
    /// Same-process plugin call.
    Call,
}

impl EventName {
    /// Stable name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrivateMessage => "private_message",
            Self::GroupMessage => "group_message",
            Self::FriendRecall => "friend_recall",
            Self::GroupRecall => "group_recall",
            Self::GroupIncrease => "group_increase",
            Self::GroupDecrease => "group_decrease",
            Self::GroupAdmin => "group_admin",
            Self::GroupUpload => "group_upload",
            Self::GroupBan => "group_ban",
            Self::FriendAdd => "friend_add",
            Self::GroupCard => "group_card",
            Self::OfflineFile => "offline_file",
            Self::ClientStatus => "client_status",
            Self::Essence => "essence",
            Self::Poke => "poke",
            Self::LuckyKing => "lucky_king",
            Self::Honor => "honor",
            Self::Title => "title",
            Self::FriendRequest => "friend_request",
            Self::GroupRequest => "group_request",
            Self::Heartbeat => "heartbeat",
            Self::Lifecycle => "lifecycle",
            Self::Call => "call",
        }
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Event {
    /// The registry name this event dispatches under.
    pub fn name(&self) -> EventName {
        match self {
            Event::Message(MessageEvent::Private(_)) => EventName::PrivateMessage,
            Event::Message(MessageEvent::Group(_)) => EventName::GroupMessage,
            Event::Notice(notice) => match notice {
                NoticeEvent::FriendRecall(_) => EventName::FriendRecall,
                NoticeEvent::GroupRecall(_) => EventName::GroupRecall,
                NoticeEvent::GroupIncrease(_) => EventName::GroupIncrease,
                NoticeEvent::GroupDecrease(_) => EventName::GroupDecrease,
                NoticeEvent::GroupAdmin(_) => EventName::GroupAdmin,
                NoticeEvent::GroupUpload(_) => EventName::GroupUpload,
                NoticeEvent::GroupBan(_) => EventName::GroupBan,
                NoticeEvent::FriendAdd(_) => EventName::FriendAdd,
                NoticeEvent::GroupCard(_) => EventName::GroupCard,
                NoticeEvent::OfflineFile(_) => EventName::OfflineFile,
                NoticeEvent::ClientStatus(_) => EventName::ClientStatus,
                NoticeEvent::Essence(_) => EventName::Essence,
                NoticeEvent::Poke(_) => EventName::Poke,
                NoticeEvent::LuckyKing(_) => EventName::LuckyKing,
                NoticeEvent::Honor(_) => EventName::Honor,
                NoticeEvent::Title(_) => EventName::Title,
            },
            Event::Request(RequestEvent::Friend(_)) => EventName::FriendRequest,
            Event::Request(RequestEvent::Group(_)) => EventName::GroupRequest,
            Event::Meta(MetaEvent::Heartbeat(_)) => EventName::Heartbeat,
            Event::Meta(MetaEvent::Lifecycle(_)) => EventName::Lifecycle,
            Event::Call(_) => EventName::Call,
        }
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Errors raised while decoding an event payload.
#[derive(Debug, Error)]
pub enum EventError {
    /// The discriminator combination is not part of the protocol this host
    /// speaks. Logged by the dispatcher as an anomaly, never propagated.
    #[error("unrecognized event: post_type={post_type:?}, detail={detail:?}")]
    Unrecognized {
        /// Top-level discriminator.
        post_type: String,
        /// Sub-discriminator that failed to classify.
        detail: String,
    },

    /// The payload did not match the event's declared shape.
    #[error("malformed event: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn discriminator<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn unrecognized(post_type: &str, detail: &str) -> EventError {
    EventError::Unrecognized {
        post_type: post_type.to_string(),
        detail: detail.to_string(),
    }
}

/// Decodes a raw event payload into the most specific [`Event`].
pub fn parse_event(value: Value) -> Result<Event, EventError> {
    let post_type = discriminator(&value, "post_type").to_string();
    match post_type.as_str() {
        // Messages the host sent itself are classified like received ones.
        "message" | "message_sent" => {
            let message_type = discriminator(&value, "message_type").to_string();
            match message_type.as_str() {
                "private" => Ok(Event::Message(MessageEvent::Private(
                    serde_json::from_value(value)?,
                ))),
                "group" => Ok(Event::Message(MessageEvent::Group(serde_json::from_value(
                    value,
                )?))),
                other => Err(unrecognized(&post_type, other)),
            }
        }
        "notice" => parse_notice(value),
        "request" => {
            let request_type = discriminator(&value, "request_type").to_string();
            match request_type.as_str() {
                "friend" => Ok(Event::Request(RequestEvent::Friend(
                    serde_json::from_value(value)?,
                ))),
                "group" => Ok(Event::Request(RequestEvent::Group(serde_json::from_value(
                    value,
                )?))),
                other => Err(unrecognized("request", other)),
            }
        }
        "meta_event" => {
            let meta_type = discriminator(&value, "meta_event_type").to_string();
            match meta_type.as_str() {
                "heartbeat" => Ok(Event::Meta(MetaEvent::Heartbeat(serde_json::from_value(
                    value,
                )?))),
                "lifecycle" => Ok(Event::Meta(MetaEvent::Lifecycle(serde_json::from_value(
                    value,
                )?))),
                other => Err(unrecognized("meta_event", other)),
            }
        }
        other => Err(unrecognized(other, "")),
    }
}

fn parse_notice(value: Value) -> Result<Event, EventError> {
    let notice_type = discriminator(&value, "notice_type").to_string();
    let notice = match notice_type.as_str() {
        "friend_recall" => NoticeEvent::FriendRecall(serde_json::from_value(value)?),
        "group_recall" => NoticeEvent::GroupRecall(serde_json::from_value(value)?),
        "group_increase" => NoticeEvent::GroupIncrease(serde_json::from_value(value)?),
        "group_decrease" => NoticeEvent::GroupDecrease(serde_json::from_value(value)?),
        "group_admin" => NoticeEvent::GroupAdmin(serde_json::from_value(value)?),
        "group_upload" => NoticeEvent::GroupUpload(serde_json::from_value(value)?),
        "group_ban" => NoticeEvent::GroupBan(serde_json::from_value(value)?),
        "friend_add" => NoticeEvent::FriendAdd(serde_json::from_value(value)?),
        "group_card" => NoticeEvent::GroupCard(serde_json::from_value(value)?),
        "offline_file" => NoticeEvent::OfflineFile(serde_json::from_value(value)?),
        "client_status" => NoticeEvent::ClientStatus(serde_json::from_value(value)?),
        "essence" => NoticeEvent::Essence(serde_json::from_value(value)?),
        "notify" => {
            let sub_type = discriminator(&value, "sub_type").to_string();
            match sub_type.as_str() {
                "poke" => NoticeEvent::Poke(serde_json::from_value(value)?),
                "lucky_king" => NoticeEvent::LuckyKing(serde_json::from_value(value)?),
                "honor" => NoticeEvent::Honor(serde_json::from_value(value)?),
                "title" => NoticeEvent::Title(serde_json::from_value(value)?),
                other => return Err(unrecognized("notice.notify", other)),
            }
        }
        other => return Err(unrecognized("notice", other)),
    };
    Ok(Event::Notice(notice))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn private_message_parses_with_wide_ids() {
        let event = parse_event(json!({
            "post_type": "message",
            "message_type": "private",
            "time": 1_700_000_000,
            "self_id": 9_007_199_254_740_993i64,
            "message_id": 12,
            "user_id": 9_007_199_254_740_995i64,
            "message": [{"type": "text", "data": {"text": "hello"}}],
            "raw_message": "hello",
            "sub_type": "friend",
            "sender": {"user_id": 9_007_199_254_740_995i64, "nickname": "amber"}
        }))
        .unwrap();

        assert_eq!(event.name(), EventName::PrivateMessage);
        let Event::Message(MessageEvent::Private(msg)) = event else {
            panic!("expected private message");
        };
        assert_eq!(msg.user_id, 9_007_199_254_740_995);
        assert_eq!(msg.origin.self_id, 9_007_199_254_740_993);
        assert_eq!(msg.sender.display_name(), "amber");
    }

    #[test]
    fn group_recall_parses() {
        let event = parse_event(json!({
            "post_type": "notice",
            "notice_type": "group_recall",
            "time": 1_700_000_000,
            "self_id": 1,
            "group_id": 20,
            "user_id": 30,
            "operator_id": 40,
            "message_id": 50
        }))
        .unwrap();
        assert_eq!(event.name(), EventName::GroupRecall);
    }

    #[test]
    fn direct_poke_has_no_group() {
        let event = parse_event(json!({
            "post_type": "notice",
            "notice_type": "notify",
            "sub_type": "poke",
            "time": 1_700_000_000,
            "self_id": 1,
            "user_id": 2,
            "target_id": 1
        }))
        .unwrap();
        let Event::Notice(NoticeEvent::Poke(poke)) = event else {
            panic!("expected poke");
        };
        assert_eq!(poke.group_id, None);
    }

    #[test]
    fn heartbeat_parses() {
        let event = parse_event(json!({
            "post_type": "meta_event",
            "meta_event_type": "heartbeat",
            "time": 1_700_000_000,
            "self_id": 1,
            "status": {"online": true},
            "interval": 5000
        }))
        .unwrap();
        assert_eq!(event.name(), EventName::Heartbeat);
    }

    #[test]
    fn unknown_discriminators_are_unrecognized() {
        let err = parse_event(json!({"post_type": "telemetry"})).unwrap_err();
        assert!(matches!(err, EventError::Unrecognized { .. }));

        let err = parse_event(json!({
            "post_type": "notice",
            "notice_type": "group_weather"
        }))
        .unwrap_err();
        assert!(matches!(err, EventError::Unrecognized { .. }));
    }

    #[test]
    fn sent_messages_classify_like_received_ones() {
        let event = parse_event(json!({
            "post_type": "message_sent",
            "message_type": "group",
            "time": 1_700_000_000,
            "self_id": 1,
            "message_id": 2,
            "group_id": 3,
            "user_id": 1,
            "message": [],
            "raw_message": ""
        }))
        .unwrap();
        assert_eq!(event.name(), EventName::GroupMessage);
    }
}
