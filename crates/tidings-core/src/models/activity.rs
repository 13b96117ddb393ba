//! Activity (unread message) domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of the most recent item in a user's inbox.
///
/// Push clients treat this as an opaque object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: Uuid,
    pub sender_name: String,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}
