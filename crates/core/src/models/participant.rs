//! Participant model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A connected student
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Connection-scoped identifier
    pub id: Uuid,
    pub name: String,
    pub has_answered: bool,
    /// Option chosen on the active poll
    pub current_answer: Option<Uuid>,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    pub fn new(id: Uuid, name: String, joined_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            has_answered: false,
            current_answer: None,
            joined_at,
        }
    }

    /// Clear answer state ahead of a new poll
    pub fn reset_answer(&mut self) {
        self.has_answered = false;
        self.current_answer = None;
    }
}
