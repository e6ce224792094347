//! Poll lifecycle - the single active poll and the archive behind it
//!
//! Every poll ever created lives in an append-only archive in creation
//! order. At most one of them is `Active`, and it is always the last one.
//! Timers are not owned here: the caller arms one per published poll and
//! feeds expiry back through [`PollLifecycle::end_active`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{OptionResult, Poll, PollOption};

/// Time limit bounds for new polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollLimits {
    /// Used when a request omits its time limit
    pub default_time_limit_secs: u64,
    pub max_time_limit_secs: u64,
}

impl Default for PollLimits {
    fn default() -> Self {
        Self {
            default_time_limit_secs: 60,
            max_time_limit_secs: 3600,
        }
    }
}

/// A request to open a poll, as submitted by the teacher
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
    pub time_limit_secs: Option<u64>,
    /// Index into `options` of the correct answer
    pub correct_answer_index: Option<usize>,
}

impl NewPoll {
    pub fn new(question: impl Into<String>, options: &[&str]) -> Self {
        Self {
            question: question.into(),
            options: options.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn with_time_limit(mut self, secs: u64) -> Self {
        self.time_limit_secs = Some(secs);
        self
    }

    pub fn with_correct_answer(mut self, index: usize) -> Self {
        self.correct_answer_index = Some(index);
        self
    }
}

/// Why a poll ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndReason {
    /// Its timer ran out
    TimeLimit,
    /// Every registered participant answered
    AllAnswered,
    /// A new poll replaced it
    Superseded,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndReason::TimeLimit => "time-limit",
            EndReason::AllAnswered => "all-answered",
            EndReason::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

/// A poll that has just transitioned to `Ended`, with its results snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndedPoll {
    pub poll: Poll,
    pub results: Vec<OptionResult>,
    pub reason: EndReason,
}

/// Owner of the current poll and the poll archive
#[derive(Debug, Default)]
pub struct PollLifecycle {
    archive: Vec<Poll>,
    limits: PollLimits,
}

impl PollLifecycle {
    pub fn new(limits: PollLimits) -> Self {
        Self {
            archive: Vec::new(),
            limits,
        }
    }

    pub fn limits(&self) -> PollLimits {
        self.limits
    }

    /// The most recently created poll, active or not
    pub fn current(&self) -> Option<&Poll> {
        self.archive.last()
    }

    /// The poll currently collecting answers
    pub fn active(&self) -> Option<&Poll> {
        self.archive.last().filter(|p| p.is_active())
    }

    fn active_mut(&mut self) -> Option<&mut Poll> {
        self.archive.last_mut().filter(|p| p.is_active())
    }

    /// Every poll in creation order
    pub fn archive(&self) -> &[Poll] {
        &self.archive
    }

    /// Admission rule: a new poll may open when nothing is active or when
    /// everyone has answered the active one.
    pub fn admits_new_poll(&self, everyone_answered: bool) -> bool {
        self.active().is_none() || everyone_answered
    }

    /// Validate a request and build the poll it describes. Nothing is stored.
    pub fn build(&self, request: &NewPoll, now: DateTime<Utc>) -> Result<Poll> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(Error::validation("Question is required"));
        }

        // Keep request indices so `correct_answer_index` still lines up
        // after blank entries are dropped.
        let kept: Vec<(usize, &str)> = request
            .options
            .iter()
            .map(|text| text.trim())
            .enumerate()
            .filter(|(_, text)| !text.is_empty())
            .collect();
        if kept.len() < 2 {
            return Err(Error::validation("At least two non-empty options are required"));
        }

        let time_limit = self.time_limit(request.time_limit_secs)?;

        let correct_position = request
            .correct_answer_index
            .and_then(|index| kept.iter().position(|(original, _)| *original == index));

        let mut poll = Poll::new(
            question.to_string(),
            kept.iter().map(|(_, text)| text.to_string()).collect(),
            time_limit,
            now,
        );
        poll.correct_answer_id = correct_position.map(|position| poll.options[position].id);

        Ok(poll)
    }

    fn time_limit(&self, requested: Option<u64>) -> Result<Duration> {
        let secs = requested.unwrap_or(self.limits.default_time_limit_secs);
        if secs == 0 {
            return Err(Error::validation("Time limit must be positive"));
        }
        if secs > self.limits.max_time_limit_secs {
            return Err(Error::validation(format!(
                "Time limit must be at most {} seconds",
                self.limits.max_time_limit_secs
            )));
        }
        Ok(Duration::from_secs(secs))
    }

    /// Append a freshly built poll to the archive and make it current.
    ///
    /// Any poll still active must be ended first.
    pub fn publish(&mut self, poll: Poll) -> &Poll {
        debug_assert!(self.active().is_none(), "publishing over an active poll");
        debug_assert!(poll.is_active(), "publishing an ended poll");
        self.archive.push(poll);
        &self.archive[self.archive.len() - 1]
    }

    /// Check that `option_id` can receive a vote right now
    pub fn ensure_votable(&self, option_id: Uuid) -> Result<&PollOption> {
        let poll = self.active().ok_or(Error::NoActivePoll)?;
        poll.option(option_id).ok_or(Error::UnknownOption)
    }

    /// Count a vote. Does not check whether the voter already answered.
    pub fn record_vote(&mut self, option_id: Uuid, voter: Uuid) -> Result<&Poll> {
        let poll = self.active_mut().ok_or(Error::NoActivePoll)?;
        let option = poll.option_mut(option_id).ok_or(Error::UnknownOption)?;
        option.votes += 1;
        option.voters.push(voter);
        Ok(&*poll)
    }

    /// Mark the correct option. Only allowed while the poll is active.
    pub fn set_correct_answer(&mut self, option_id: Uuid) -> Result<&Poll> {
        let poll = self.active_mut().ok_or(Error::NoActivePoll)?;
        if poll.option(option_id).is_none() {
            return Err(Error::UnknownOption);
        }
        poll.correct_answer_id = Some(option_id);
        Ok(&*poll)
    }

    /// End the active poll.
    ///
    /// Returns `None` when nothing is active, so a second caller racing the
    /// first (timer vs. last answer) is a no-op.
    pub fn end_active(
        &mut self,
        reason: EndReason,
        participant_count: usize,
        now: DateTime<Utc>,
    ) -> Option<EndedPoll> {
        let poll = self.active_mut()?;
        poll.end(now);
        let results = poll.results(participant_count);
        Some(EndedPoll {
            poll: poll.clone(),
            results,
            reason,
        })
    }

    /// Time left on the active poll; zero when none is active
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        self.active()
            .map(|poll| poll.remaining(now))
            .unwrap_or(Duration::ZERO)
    }
}
