//! Chat relay - validates and stamps messages for rebroadcast
//!
//! Stateless: nothing is stored, the caller broadcasts the stamped message.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{ChatMessage, Role};

pub struct ChatRelay;

impl ChatRelay {
    /// Stamp a message with an id and timestamp
    pub fn relay(
        message: &str,
        sender_name: &str,
        sender_type: Role,
        now: DateTime<Utc>,
    ) -> Result<ChatMessage> {
        if message.trim().is_empty() {
            return Err(Error::validation("Message cannot be empty"));
        }
        let sender_name = sender_name.trim();
        if sender_name.is_empty() {
            return Err(Error::validation("Sender name is required"));
        }

        Ok(ChatMessage::new(
            message.to_string(),
            sender_name.to_string(),
            sender_type,
            now,
        ))
    }
}
