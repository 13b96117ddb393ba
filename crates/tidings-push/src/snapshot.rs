//! Notification snapshot wire type.

use serde::{Deserialize, Serialize};
use tidings_core::models::activity::MessageSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    MessageUpdate,
}

/// A user's current unread state, sent whole every time. Clients treat
/// each snapshot as the latest truth, never as a delta.
///
/// ```json
/// {"type": "message_update", "unread": 3, "last_message": {...}}
/// ```
///
/// `last_message` is omitted when there is nothing to summarize; an
/// explicit `null` deserializes the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub unread: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<MessageSummary>,
}

impl Snapshot {
    pub fn new(unread: u64, last_message: Option<MessageSummary>) -> Self {
        Self {
            kind: SnapshotKind::MessageUpdate,
            unread,
            last_message,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
