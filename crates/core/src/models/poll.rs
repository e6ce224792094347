//! Poll model - one question with its options and tallies

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Poll status. `Ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PollStatus {
    Active,
    Ended,
}

/// One answer choice and its tally
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub id: Uuid,
    pub text: String,
    pub votes: u32,
    /// Participant ids that picked this option; `voters.len() == votes`
    pub voters: Vec<Uuid>,
}

impl PollOption {
    pub fn new(text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            votes: 0,
            voters: Vec::new(),
        }
    }
}

/// A poll question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: Uuid,
    pub question: String,
    /// Options in the order they were submitted
    pub options: Vec<PollOption>,
    pub correct_answer_id: Option<Uuid>,
    /// Time limit in milliseconds
    #[serde(rename = "timeLimit")]
    pub time_limit_ms: u64,
    pub created_at: DateTime<Utc>,
    pub status: PollStatus,
    pub ended_at: Option<DateTime<Utc>>,
}

/// Per-option line of a results snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionResult {
    pub id: Uuid,
    pub text: String,
    pub votes: u32,
    /// Share of the current roster that picked this option, rounded
    pub percentage: u32,
}

/// How a participant's answer compares with the poll's correct answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
    Unanswered,
    /// No correct answer has been set
    Ungraded,
}

impl Poll {
    /// Build an active poll. Callers validate the texts first.
    pub fn new(
        question: String,
        option_texts: Vec<String>,
        time_limit: Duration,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            question,
            options: option_texts.into_iter().map(PollOption::new).collect(),
            correct_answer_id: None,
            time_limit_ms: time_limit.as_millis() as u64,
            created_at,
            status: PollStatus::Active,
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PollStatus::Active
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    pub fn option(&self, option_id: Uuid) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    pub(crate) fn option_mut(&mut self, option_id: Uuid) -> Option<&mut PollOption> {
        self.options.iter_mut().find(|o| o.id == option_id)
    }

    /// Time left before the limit elapses, never negative.
    ///
    /// A clock that reads earlier than `created_at` counts as zero elapsed.
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let elapsed_ms = (now - self.created_at).num_milliseconds().max(0) as u64;
        Duration::from_millis(self.time_limit_ms.saturating_sub(elapsed_ms))
    }

    pub fn total_votes(&self) -> u32 {
        self.options.iter().map(|o| o.votes).sum()
    }

    /// Results snapshot against the current roster size
    pub fn results(&self, participant_count: usize) -> Vec<OptionResult> {
        self.options
            .iter()
            .map(|o| OptionResult {
                id: o.id,
                text: o.text.clone(),
                votes: o.votes,
                percentage: percentage(o.votes, participant_count),
            })
            .collect()
    }

    /// Options sharing the highest vote count; empty when nobody voted
    pub fn leading_options(&self) -> Vec<&PollOption> {
        let max = self.options.iter().map(|o| o.votes).max().unwrap_or(0);
        if max == 0 {
            return Vec::new();
        }
        self.options.iter().filter(|o| o.votes == max).collect()
    }

    pub fn grade(&self, answer: Option<Uuid>) -> Verdict {
        match (self.correct_answer_id, answer) {
            (None, _) => Verdict::Ungraded,
            (Some(_), None) => Verdict::Unanswered,
            (Some(correct), Some(given)) if correct == given => Verdict::Correct,
            (Some(_), Some(_)) => Verdict::Incorrect,
        }
    }

    pub(crate) fn end(&mut self, now: DateTime<Utc>) {
        self.status = PollStatus::Ended;
        self.ended_at = Some(now);
    }
}

fn percentage(votes: u32, participant_count: usize) -> u32 {
    if participant_count == 0 {
        return 0;
    }
    ((votes as f64 / participant_count as f64) * 100.0).round() as u32
}
