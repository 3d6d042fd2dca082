//! Notice events: state changes reported by the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Origin;

/// File metadata attached to a group upload notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    /// File ID.
    #[serde(default)]
    pub id: String,
    /// File name.
    pub name: String,
    /// File size in bytes.
    #[serde(default)]
    pub size: i64,
    /// Bus ID used by download APIs.
    #[serde(default)]
    pub busid: i64,
}

/// File metadata attached to an offline-file notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineFileInfo {
    /// File name.
    pub name: String,
    /// File size in bytes.
    #[serde(default)]
    pub size: i64,
    /// Download URL.
    #[serde(default)]
    pub url: String,
}

/// A friend recalled one of their messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRecall {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// User who recalled the message.
    pub user_id: i64,
    /// Recalled message ID.
    pub message_id: i64,
}

/// A message was recalled inside a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRecall {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group the recall happened in.
    pub group_id: i64,
    /// Author of the recalled message.
    pub user_id: i64,
    /// Member who performed the recall.
    pub operator_id: i64,
    /// Recalled message ID.
    pub message_id: i64,
}

/// A member joined a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupIncrease {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group joined.
    pub group_id: i64,
    /// Member who approved or sent the invite.
    pub operator_id: i64,
    /// Member who joined.
    pub user_id: i64,
    /// "approve" or "invite".
    #[serde(default)]
    pub sub_type: String,
}

/// A member left or was removed from a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDecrease {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group left.
    pub group_id: i64,
    /// Member who performed the removal (equals `user_id` on voluntary leave).
    pub operator_id: i64,
    /// Member who left.
    pub user_id: i64,
    /// "leave", "kick" or "kick_me".
    #[serde(default)]
    pub sub_type: String,
}

/// A group administrator was appointed or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupAdmin {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Member whose admin status changed.
    pub user_id: i64,
    /// "set" or "unset".
    #[serde(default)]
    pub sub_type: String,
}

/// A file was uploaded to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupUpload {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group the file was uploaded to.
    pub group_id: i64,
    /// Uploader.
    pub user_id: i64,
    /// Uploaded file metadata.
    pub file: UploadedFile,
}

/// A group mute was applied or lifted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupBan {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Administrator who changed the mute.
    pub operator_id: i64,
    /// Muted (or unmuted) member.
    pub user_id: i64,
    /// Mute duration in seconds (0 when lifting).
    #[serde(default)]
    pub duration: i64,
    /// "ban" or "lift_ban".
    #[serde(default)]
    pub sub_type: String,
}

/// A new friend was added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendAdd {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// The new friend's user ID.
    pub user_id: i64,
}

/// A member's group card changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCard {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Member whose card changed.
    pub user_id: i64,
    /// New card value.
    #[serde(default)]
    pub card_new: String,
    /// Previous card value.
    #[serde(default)]
    pub card_old: String,
}

/// An offline file was received from a friend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineFile {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Sender.
    pub user_id: i64,
    /// File metadata.
    pub file: OfflineFileInfo,
}

/// Another client of the host account went on- or offline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientStatus {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Client descriptor as reported by the gateway.
    #[serde(default)]
    pub client: Value,
    /// Whether the client is now online.
    #[serde(default)]
    pub online: bool,
}

/// An essence (pinned highlight) message was added or removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Essence {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Author of the highlighted message.
    pub sender_id: i64,
    /// Member who changed the essence list.
    pub operator_id: i64,
    /// Message concerned.
    pub message_id: i64,
    /// "add" or "delete".
    #[serde(default)]
    pub sub_type: String,
}

/// Somebody poked somebody.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Poke {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group the poke happened in; absent for direct pokes.
    #[serde(default)]
    pub group_id: Option<i64>,
    /// Poker.
    pub user_id: i64,
    /// Pokee.
    pub target_id: i64,
}

/// A red-packet lucky king was drawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LuckyKing {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Red-packet sender.
    pub user_id: i64,
    /// The lucky king.
    pub target_id: i64,
}

/// A member earned a group honor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Honor {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Honored member.
    pub user_id: i64,
    /// Honor kind ("talkative", "performer", "emotion").
    #[serde(default)]
    pub honor_type: String,
}

/// A member was granted a group title.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Title {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Member who received the title.
    pub user_id: i64,
    /// The granted title.
    #[serde(default)]
    pub title: String,
}

/// A state-change notice, split by `notice_type` (and `sub_type` for the
/// notify family).
#[derive(Debug, Clone)]
pub enum NoticeEvent {
    /// Friend message recall.
    FriendRecall(FriendRecall),
    /// Group message recall.
    GroupRecall(GroupRecall),
    /// Member joined a group.
    GroupIncrease(GroupIncrease),
    /// Member left a group.
    GroupDecrease(GroupDecrease),
    /// Admin appointed or removed.
    GroupAdmin(GroupAdmin),
    /// Group file upload.
    GroupUpload(GroupUpload),
    /// Group mute change.
    GroupBan(GroupBan),
    /// Friend added.
    FriendAdd(FriendAdd),
    /// Group card change.
    GroupCard(GroupCard),
    /// Offline file received.
    OfflineFile(OfflineFile),
    /// Other-client status change.
    ClientStatus(ClientStatus),
    /// Essence list change.
    Essence(Essence),
    /// Poke notify.
    Poke(Poke),
    /// Lucky-king notify.
    LuckyKing(LuckyKing),
    /// Honor notify.
    Honor(Honor),
    /// Title notify.
    Title(Title),
}
