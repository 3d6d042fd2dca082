//! Meta events: gateway housekeeping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Origin;

/// Periodic gateway heartbeat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// Gateway status snapshot.
    #[serde(default)]
    pub status: Value,
    /// Heartbeat interval in milliseconds.
    #[serde(default)]
    pub interval: i64,
}

/// Gateway lifecycle report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Common event fields.
    #[serde(flatten)]
    pub origin: Origin,
    /// "connect", "enable" or "disable".
    #[serde(default)]
    pub sub_type: String,
}

/// A gateway meta event, split by `meta_event_type`.
#[derive(Debug, Clone)]
pub enum MetaEvent {
    /// Heartbeat.
    Heartbeat(Heartbeat),
    /// Lifecycle report.
    Lifecycle(Lifecycle),
}
