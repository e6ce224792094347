//! Session state - registry and poll lifecycle under a single owner
//!
//! Every mutating operation validates first and only then applies its
//! changes, so a rejected call leaves the session untouched. Operations that
//! can close the active poll as a side effect report it in their outcome;
//! the caller is responsible for cancelling the poll timer and announcing it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants::assert_session_invariants;
use crate::lifecycle::{EndReason, EndedPoll, NewPoll, PollLifecycle, PollLimits};
use crate::models::{Participant, Poll, PollStatus, Verdict};
use crate::registry::ParticipantRegistry;

/// Outcome of opening a poll
#[derive(Debug, Clone)]
pub struct PollOpened {
    pub poll: Poll,
    /// The previous poll, if it was still active and had to be closed
    pub superseded: Option<EndedPoll>,
}

/// Outcome of an accepted answer
#[derive(Debug, Clone)]
pub struct AnswerAccepted {
    /// The poll with updated tallies
    pub poll: Poll,
    pub participant: Participant,
    pub answer_text: String,
    /// Set when this answer completed the roster and closed the poll
    pub completed: Option<EndedPoll>,
}

/// Outcome of a participant leaving (disconnect or removal)
#[derive(Debug, Clone)]
pub struct Departure {
    pub participant: Participant,
    /// Set when the remaining participants had all answered
    pub completed: Option<EndedPoll>,
}

/// One roster entry graded against the current poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub participant_id: Uuid,
    pub name: String,
    pub answer_id: Option<Uuid>,
    pub verdict: Verdict,
}

/// Graded view of the current poll for the connected roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    pub poll_id: Uuid,
    pub question: String,
    pub status: PollStatus,
    pub correct_answer_id: Option<Uuid>,
    /// Options tied for the most votes; empty before the first vote
    pub leading_option_ids: Vec<Uuid>,
    pub grades: Vec<Grade>,
}

/// The live session
#[derive(Debug, Default)]
pub struct Session {
    registry: ParticipantRegistry,
    lifecycle: PollLifecycle,
}

impl Session {
    pub fn new(limits: PollLimits) -> Self {
        Self {
            registry: ParticipantRegistry::new(),
            lifecycle: PollLifecycle::new(limits),
        }
    }

    pub fn registry(&self) -> &ParticipantRegistry {
        &self.registry
    }

    pub fn lifecycle(&self) -> &PollLifecycle {
        &self.lifecycle
    }

    pub fn participants(&self) -> Vec<Participant> {
        self.registry.all()
    }

    pub fn participant(&self, id: Uuid) -> Option<&Participant> {
        self.registry.get(id)
    }

    pub fn current_poll(&self) -> Option<&Poll> {
        self.lifecycle.current()
    }

    pub fn active_poll(&self) -> Option<&Poll> {
        self.lifecycle.active()
    }

    /// Archive in creation order, the active poll included
    pub fn polls(&self) -> &[Poll] {
        self.lifecycle.archive()
    }

    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        self.lifecycle.remaining(now)
    }

    /// Grade every current participant against the current poll.
    /// Answers reset when a poll opens, so only the newest poll is graded.
    pub fn scorecard(&self) -> Option<Scorecard> {
        let poll = self.lifecycle.current()?;
        let grades = self
            .registry
            .all()
            .into_iter()
            .map(|p| Grade {
                verdict: poll.grade(p.current_answer),
                participant_id: p.id,
                name: p.name,
                answer_id: p.current_answer,
            })
            .collect();

        Some(Scorecard {
            poll_id: poll.id,
            question: poll.question.clone(),
            status: poll.status,
            correct_answer_id: poll.correct_answer_id,
            leading_option_ids: poll.leading_options().iter().map(|o| o.id).collect(),
            grades,
        })
    }

    pub fn can_create_poll(&self) -> bool {
        self.lifecycle.admits_new_poll(self.registry.everyone_answered())
    }

    /// Admit a student
    pub fn join(&mut self, id: Uuid, name: &str, now: DateTime<Utc>) -> Result<Participant> {
        let participant = self.registry.admit(id, name, now)?.clone();
        tracing::info!(participant_id = %id, name = %participant.name, "Student joined");
        Ok(participant)
    }

    /// Open a new poll, closing a still-active predecessor if the admission
    /// rule allows it.
    pub fn create_poll(&mut self, request: &NewPoll, now: DateTime<Utc>) -> Result<PollOpened> {
        if !self.can_create_poll() {
            return Err(Error::PollInProgress);
        }
        let poll = self.lifecycle.build(request, now)?;

        let superseded = self
            .lifecycle
            .end_active(EndReason::Superseded, self.registry.count(), now);
        self.registry.reset_answers();
        let poll = self.lifecycle.publish(poll).clone();

        tracing::info!(poll_id = %poll.id, question = %poll.question, "Poll created");
        self.check_invariants();
        Ok(PollOpened { poll, superseded })
    }

    /// Record a participant's answer on the active poll
    pub fn submit_answer(
        &mut self,
        participant_id: Uuid,
        option_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<AnswerAccepted> {
        let answer_text = self.lifecycle.ensure_votable(option_id)?.text.clone();
        self.registry.ensure_can_answer(participant_id)?;

        let participant = self.registry.record_answer(participant_id, option_id)?.clone();
        let poll = self.lifecycle.record_vote(option_id, participant_id)?.clone();
        tracing::info!(
            poll_id = %poll.id,
            name = %participant.name,
            answer = %answer_text,
            "Answer recorded"
        );

        let completed = self.end_if_complete(now);
        self.check_invariants();
        Ok(AnswerAccepted {
            poll,
            participant,
            answer_text,
            completed,
        })
    }

    /// Mark the correct option on the active poll
    pub fn set_correct_answer(&mut self, option_id: Uuid) -> Result<Poll> {
        let poll = self.lifecycle.set_correct_answer(option_id)?.clone();
        tracing::info!(poll_id = %poll.id, option_id = %option_id, "Correct answer set");
        Ok(poll)
    }

    /// Drop a participant. Their recorded vote stays counted.
    pub fn remove_participant(&mut self, id: Uuid, now: DateTime<Utc>) -> Option<Departure> {
        let participant = self.registry.remove(id)?;
        let completed = self.end_if_complete(now);
        self.check_invariants();
        Some(Departure {
            participant,
            completed,
        })
    }

    /// Close `poll_id` because its timer fired. Stale expiries for polls that
    /// are no longer active are ignored.
    pub fn expire_poll(&mut self, poll_id: Uuid, now: DateTime<Utc>) -> Option<EndedPoll> {
        if self.lifecycle.active().map(|p| p.id) != Some(poll_id) {
            tracing::debug!(poll_id = %poll_id, "Ignoring expiry for inactive poll");
            return None;
        }
        self.lifecycle
            .end_active(EndReason::TimeLimit, self.registry.count(), now)
    }

    fn end_if_complete(&mut self, now: DateTime<Utc>) -> Option<EndedPoll> {
        if self.registry.is_empty() || !self.registry.everyone_answered() {
            return None;
        }
        self.lifecycle
            .end_active(EndReason::AllAnswered, self.registry.count(), now)
    }

    fn check_invariants(&self) {
        assert_session_invariants(&self.registry, &self.lifecycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(PollLimits::default())
    }

    fn join(session: &mut Session, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        session.join(id, name, Utc::now()).unwrap();
        id
    }

    fn open(session: &mut Session, options: &[&str]) -> Poll {
        session
            .create_poll(&NewPoll::new("Question?", options), Utc::now())
            .unwrap()
            .poll
    }

    #[test]
    fn test_votes_never_exceed_participants() {
        let mut session = session();
        let ids: Vec<_> = (0..5).map(|i| join(&mut session, &format!("s{i}"))).collect();
        let poll = open(&mut session, &["A", "B", "C"]);

        for (i, id) in ids.iter().enumerate() {
            let option = poll.options[i % 3].id;
            session.submit_answer(*id, option, Utc::now()).unwrap();
            // Second attempt by the same participant is rejected
            assert!(session.submit_answer(*id, option, Utc::now()).is_err());
        }

        let poll = &session.polls()[0];
        assert_eq!(poll.total_votes(), 5);
        let mut voters: Vec<_> = poll.options.iter().flat_map(|o| o.voters.clone()).collect();
        voters.sort();
        voters.dedup();
        assert_eq!(voters.len(), 5);
    }

    #[test]
    fn test_second_answer_rejected_and_nothing_changes() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        join(&mut session, "Bob");
        let poll = open(&mut session, &["A", "B"]);

        session.submit_answer(alice, poll.options[0].id, Utc::now()).unwrap();
        let err = session
            .submit_answer(alice, poll.options[1].id, Utc::now())
            .unwrap_err();
        assert_eq!(err, Error::AlreadyAnswered);

        let poll = session.active_poll().unwrap();
        assert_eq!(poll.options[0].votes, 1);
        assert_eq!(poll.options[1].votes, 0);
    }

    #[test]
    fn test_bad_option_leaves_participant_unanswered() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        open(&mut session, &["A", "B"]);

        let err = session
            .submit_answer(alice, Uuid::new_v4(), Utc::now())
            .unwrap_err();
        assert_eq!(err, Error::UnknownOption);
        assert!(!session.participant(alice).unwrap().has_answered);
    }

    #[test]
    fn test_answer_without_poll_or_participant() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        assert_eq!(
            session.submit_answer(alice, Uuid::new_v4(), Utc::now()).unwrap_err(),
            Error::NoActivePoll
        );

        let poll = open(&mut session, &["A", "B"]);
        assert_eq!(
            session
                .submit_answer(Uuid::new_v4(), poll.options[0].id, Utc::now())
                .unwrap_err(),
            Error::UnknownParticipant
        );
    }

    #[test]
    fn test_poll_in_progress_until_last_answer() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        let bob = join(&mut session, "Bob");
        let first = open(&mut session, &["A", "B"]);

        session.submit_answer(alice, first.options[0].id, Utc::now()).unwrap();
        let err = session
            .create_poll(&NewPoll::new("Next", &["X", "Y"]), Utc::now())
            .unwrap_err();
        assert_eq!(err, Error::PollInProgress);

        let accepted = session
            .submit_answer(bob, first.options[1].id, Utc::now())
            .unwrap();
        let completed = accepted.completed.unwrap();
        assert_eq!(completed.reason, EndReason::AllAnswered);

        let opened = session
            .create_poll(&NewPoll::new("Next", &["X", "Y"]), Utc::now())
            .unwrap();
        assert!(opened.superseded.is_none());
        assert_eq!(session.polls()[0].status, PollStatus::Ended);
        assert_eq!(session.polls()[1].status, PollStatus::Active);
    }

    #[test]
    fn test_new_poll_resets_answers() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        let poll = open(&mut session, &["A", "B"]);
        session.submit_answer(alice, poll.options[0].id, Utc::now()).unwrap();

        open(&mut session, &["C", "D"]);
        let alice = session.participant(alice).unwrap();
        assert!(!alice.has_answered);
        assert!(alice.current_answer.is_none());
    }

    #[test]
    fn test_create_without_participants_supersedes_active_poll() {
        let mut session = session();
        let first = open(&mut session, &["A", "B"]);

        let opened = session
            .create_poll(&NewPoll::new("Second", &["C", "D"]), Utc::now())
            .unwrap();
        let superseded = opened.superseded.unwrap();
        assert_eq!(superseded.poll.id, first.id);
        assert_eq!(superseded.reason, EndReason::Superseded);
        assert!(superseded.results.iter().all(|r| r.percentage == 0));
    }

    #[test]
    fn test_rejected_create_changes_nothing() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        let poll = open(&mut session, &["A", "B"]);
        join(&mut session, "Bob");
        session.submit_answer(alice, poll.options[0].id, Utc::now()).unwrap();

        // Invalid and blocked: admission is checked first
        assert_eq!(
            session.create_poll(&NewPoll::new("", &[]), Utc::now()).unwrap_err(),
            Error::PollInProgress
        );
        assert!(session.participant(alice).unwrap().has_answered);
        assert_eq!(session.polls().len(), 1);
    }

    #[test]
    fn test_expiry_with_no_answers() {
        let mut session = session();
        join(&mut session, "Alice");
        join(&mut session, "Bob");
        let poll = open(&mut session, &["A", "B", "C"]);

        let ended = session.expire_poll(poll.id, Utc::now()).unwrap();
        assert_eq!(ended.reason, EndReason::TimeLimit);
        assert!(ended.results.iter().all(|r| r.percentage == 0 && r.votes == 0));

        // Fires once
        assert!(session.expire_poll(poll.id, Utc::now()).is_none());
    }

    #[test]
    fn test_stale_expiry_ignored() {
        let mut session = session();
        let first = open(&mut session, &["A", "B"]);
        let second = open(&mut session, &["C", "D"]);

        assert!(session.expire_poll(first.id, Utc::now()).is_none());
        assert_eq!(session.active_poll().unwrap().id, second.id);
    }

    #[test]
    fn test_departure_keeps_vote_and_can_complete_poll() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        let bob = join(&mut session, "Bob");
        let poll = open(&mut session, &["A", "B"]);

        session.submit_answer(alice, poll.options[0].id, Utc::now()).unwrap();
        let departure = session.remove_participant(alice, Utc::now()).unwrap();
        assert!(departure.completed.is_none());
        assert_eq!(session.active_poll().unwrap().options[0].votes, 1);

        // Bob answering now completes the poll
        let accepted = session.submit_answer(bob, poll.options[1].id, Utc::now()).unwrap();
        assert!(accepted.completed.is_some());
    }

    #[test]
    fn test_departure_of_last_holdout_completes_poll() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        let bob = join(&mut session, "Bob");
        let poll = open(&mut session, &["A", "B"]);
        session.submit_answer(alice, poll.options[0].id, Utc::now()).unwrap();

        let departure = session.remove_participant(bob, Utc::now()).unwrap();
        let completed = departure.completed.unwrap();
        assert_eq!(completed.reason, EndReason::AllAnswered);
        assert_eq!(completed.results[0].percentage, 100);
    }

    #[test]
    fn test_last_participant_leaving_keeps_poll_open() {
        let mut session = session();
        let alice = join(&mut session, "Alice");
        open(&mut session, &["A", "B"]);

        let departure = session.remove_participant(alice, Utc::now()).unwrap();
        assert!(departure.completed.is_none());
        assert!(session.active_poll().is_some());
        assert!(session.remove_participant(alice, Utc::now()).is_none());
    }

    #[test]
    fn test_correct_answer_scenario() {
        let mut session = session();
        let student = join(&mut session, "Alice");
        let request = NewPoll::new("Is it?", &["Yes", "No"])
            .with_time_limit(30)
            .with_correct_answer(0);
        let poll = session.create_poll(&request, Utc::now()).unwrap().poll;
        let yes = poll.options[0].id;
        let no = poll.options[1].id;
        assert_eq!(poll.correct_answer_id, Some(yes));

        let accepted = session.submit_answer(student, no, Utc::now()).unwrap();
        let ended = accepted.completed.unwrap();

        let pct: Vec<_> = ended.results.iter().map(|r| (r.text.as_str(), r.percentage)).collect();
        assert_eq!(pct, [("Yes", 0), ("No", 100)]);
        assert_eq!(ended.poll.correct_answer_id, Some(yes));

        let answer = session.participant(student).unwrap().current_answer;
        assert_eq!(ended.poll.grade(answer), Verdict::Incorrect);
    }

    #[test]
    fn test_scorecard_grades_current_roster() {
        let mut session = session();
        assert!(session.scorecard().is_none());

        let alice = join(&mut session, "Alice");
        let bob = join(&mut session, "Bob");
        let carol = join(&mut session, "Carol");
        let poll = open(&mut session, &["A", "B"]);
        let (a, b) = (poll.options[0].id, poll.options[1].id);

        let card = session.scorecard().unwrap();
        assert_eq!(card.poll_id, poll.id);
        assert!(card.leading_option_ids.is_empty());
        assert!(card.grades.iter().all(|g| g.verdict == Verdict::Ungraded));

        session.submit_answer(alice, a, Utc::now()).unwrap();
        session.submit_answer(bob, b, Utc::now()).unwrap();
        session.set_correct_answer(a).unwrap();

        let card = session.scorecard().unwrap();
        assert_eq!(card.status, PollStatus::Active);
        assert_eq!(card.correct_answer_id, Some(a));
        assert_eq!(card.leading_option_ids, [a, b]);
        let verdicts: Vec<_> = card
            .grades
            .iter()
            .map(|g| (g.participant_id, g.name.as_str(), g.verdict))
            .collect();
        assert_eq!(
            verdicts,
            [
                (alice, "Alice", Verdict::Correct),
                (bob, "Bob", Verdict::Incorrect),
                (carol, "Carol", Verdict::Unanswered),
            ]
        );

        session.submit_answer(carol, a, Utc::now()).unwrap();
        let card = session.scorecard().unwrap();
        assert_eq!(card.status, PollStatus::Ended);
        assert_eq!(card.leading_option_ids, [a]);
    }

    #[test]
    fn test_set_correct_answer_after_end_rejected() {
        let mut session = session();
        let poll = open(&mut session, &["A", "B"]);
        session.set_correct_answer(poll.options[1].id).unwrap();
        session.expire_poll(poll.id, Utc::now()).unwrap();

        assert_eq!(
            session.set_correct_answer(poll.options[0].id).unwrap_err(),
            Error::NoActivePoll
        );
        assert_eq!(
            session.current_poll().unwrap().correct_answer_id,
            Some(poll.options[1].id)
        );
    }

    #[test]
    fn test_archive_round_trip() {
        let mut session = session();
        let a = join(&mut session, "A");
        let b = join(&mut session, "B");
        join(&mut session, "C");
        let poll = open(&mut session, &["A", "B", "C"]);
        session.submit_answer(a, poll.options[2].id, Utc::now()).unwrap();
        session.submit_answer(b, poll.options[2].id, Utc::now()).unwrap();
        session.expire_poll(poll.id, Utc::now()).unwrap();

        let archived = &session.polls()[0];
        assert_eq!(archived.question, "Question?");
        let tallies: Vec<_> = archived.options.iter().map(|o| (o.text.as_str(), o.votes)).collect();
        assert_eq!(tallies, [("A", 0), ("B", 0), ("C", 2)]);
    }
}
