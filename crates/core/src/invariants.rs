//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible session states during
//! development. These checks are compiled out in release builds.

use std::collections::HashSet;

use crate::lifecycle::PollLifecycle;
use crate::models::{Poll, PollStatus};
use crate::registry::ParticipantRegistry;

/// Validate that a poll is internally consistent
pub fn assert_poll_invariants(poll: &Poll) {
    debug_assert!(
        poll.options.len() >= 2,
        "Poll {} has {} options",
        poll.id,
        poll.options.len()
    );

    debug_assert!(
        !poll.question.trim().is_empty(),
        "Poll {} has empty question",
        poll.id
    );

    debug_assert!(
        (poll.status == PollStatus::Ended) == poll.ended_at.is_some(),
        "Poll {} is {:?} with ended_at {:?}",
        poll.id,
        poll.status,
        poll.ended_at
    );

    let mut option_ids = HashSet::new();
    let mut voters = HashSet::new();
    for option in &poll.options {
        debug_assert!(
            option_ids.insert(option.id),
            "Poll {} repeats option id {}",
            poll.id,
            option.id
        );
        debug_assert!(
            option.votes as usize == option.voters.len(),
            "Option {} has {} votes but {} voters",
            option.id,
            option.votes,
            option.voters.len()
        );
        for voter in &option.voters {
            debug_assert!(
                voters.insert(*voter),
                "Participant {} voted more than once in poll {}",
                voter,
                poll.id
            );
        }
    }

    if let Some(correct) = poll.correct_answer_id {
        debug_assert!(
            option_ids.contains(&correct),
            "Poll {} correct answer {} is not one of its options",
            poll.id,
            correct
        );
    }
}

/// Validate the archive: only the newest poll may be active
pub fn assert_archive_invariants(archive: &[Poll]) {
    let active = archive.iter().filter(|p| p.is_active()).count();
    debug_assert!(active <= 1, "{} polls are active at once", active);

    if let Some((_, older)) = archive.split_last() {
        debug_assert!(
            older.iter().all(|p| !p.is_active()),
            "An archived poll other than the newest is still active"
        );
    }

    for poll in archive {
        assert_poll_invariants(poll);
    }
}

/// Validate that participant answer state agrees with the current poll
pub fn assert_session_invariants(registry: &ParticipantRegistry, lifecycle: &PollLifecycle) {
    assert_archive_invariants(lifecycle.archive());

    for participant in registry.iter() {
        debug_assert!(
            participant.has_answered == participant.current_answer.is_some(),
            "Participant {} has_answered={} but current_answer={:?}",
            participant.id,
            participant.has_answered,
            participant.current_answer
        );

        if let Some(answer) = participant.current_answer {
            let counted = lifecycle
                .current()
                .and_then(|poll| poll.option(answer))
                .is_some_and(|option| option.voters.contains(&participant.id));
            debug_assert!(
                counted,
                "Participant {} answered {} but the vote is not in the current poll",
                participant.id,
                answer
            );
        }
    }
}
