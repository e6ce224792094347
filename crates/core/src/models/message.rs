//! Chat message model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

/// A relayed chat message. Lives only as long as the broadcast carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub message: String,
    pub sender_name: String,
    pub sender_type: Role,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(
        message: String,
        sender_name: String,
        sender_type: Role,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            message,
            sender_name,
            sender_type,
            timestamp,
        }
    }
}
