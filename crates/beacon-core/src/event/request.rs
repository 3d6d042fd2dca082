//! Request events: approvals awaited from the host.

use serde::{Deserialize, Serialize};

use super::Origin;

/// An incoming friend request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendRequest {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Requester.
    pub user_id: i64,
    /// Verification message attached to the request.
    #[serde(default)]
    pub comment: String,
    /// Flag passed back to the approval API.
    #[serde(default)]
    pub flag: String,
}

/// An incoming group join request or invite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRequest {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Group concerned.
    pub group_id: i64,
    /// Requester or inviter.
    pub user_id: i64,
    /// Verification message attached to the request.
    #[serde(default)]
    pub comment: String,
    /// Flag passed back to the approval API.
    #[serde(default)]
    pub flag: String,
    /// "add" (join request) or "invite".
    #[serde(default)]
    pub sub_type: String,
}

/// A request awaiting approval, split by `request_type`.
#[derive(Debug, Clone)]
pub enum RequestEvent {
    /// Friend request.
    Friend(FriendRequest),
    /// Group join request or invite.
    Group(GroupRequest),
}
