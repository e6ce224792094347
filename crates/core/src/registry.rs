//! Participant registry - who is in the session and what they answered
//!
//! The registry enforces name uniqueness among connected participants and
//! the one-answer-per-poll rule. It never broadcasts; callers decide what to
//! announce.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Participant;

/// Registry of connected participants keyed by connection id
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<Uuid, Participant>,
}

impl ParticipantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a participant under `name`.
    ///
    /// The name is trimmed; uniqueness is an exact, case-sensitive match
    /// against the trimmed names of everyone currently registered.
    pub fn admit(&mut self, id: Uuid, name: &str, now: DateTime<Utc>) -> Result<&Participant> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Name is required"));
        }
        if self.participants.contains_key(&id) {
            return Err(Error::validation("Already joined as a participant"));
        }
        if self.participants.values().any(|p| p.name == name) {
            return Err(Error::NameConflict(name.to_string()));
        }

        tracing::debug!(participant_id = %id, name = %name, "Admitted participant");
        let participant = Participant::new(id, name.to_string(), now);
        Ok(&*self.participants.entry(id).or_insert(participant))
    }

    /// Remove a participant. No-op when absent.
    pub fn remove(&mut self, id: Uuid) -> Option<Participant> {
        self.participants.remove(&id)
    }

    /// Clear every participant's answer ahead of a new poll
    pub fn reset_answers(&mut self) {
        for participant in self.participants.values_mut() {
            participant.reset_answer();
        }
    }

    /// Check that `id` may answer, without changing anything
    pub fn ensure_can_answer(&self, id: Uuid) -> Result<&Participant> {
        let participant = self.participants.get(&id).ok_or(Error::UnknownParticipant)?;
        if participant.has_answered {
            return Err(Error::AlreadyAnswered);
        }
        Ok(participant)
    }

    /// Record `option_id` as the participant's answer
    pub fn record_answer(&mut self, id: Uuid, option_id: Uuid) -> Result<&Participant> {
        let participant = self.participants.get_mut(&id).ok_or(Error::UnknownParticipant)?;
        if participant.has_answered {
            return Err(Error::AlreadyAnswered);
        }
        participant.has_answered = true;
        participant.current_answer = Some(option_id);
        Ok(&*participant)
    }

    pub fn get(&self, id: Uuid) -> Option<&Participant> {
        self.participants.get(&id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.participants.contains_key(&id)
    }

    pub fn count(&self) -> usize {
        self.participants.len()
    }

    pub fn answered_count(&self) -> usize {
        self.participants.values().filter(|p| p.has_answered).count()
    }

    /// True when every registered participant has answered (vacuously true
    /// for an empty registry)
    pub fn everyone_answered(&self) -> bool {
        self.participants.values().all(|p| p.has_answered)
    }

    /// All participants, oldest join first
    pub fn all(&self) -> Vec<Participant> {
        let mut all: Vec<_> = self.participants.values().cloned().collect();
        all.sort_by(|a, b| a.joined_at.cmp(&b.joined_at).then_with(|| a.name.cmp(&b.name)));
        all
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.participants.values()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
