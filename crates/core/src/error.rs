//! Error types for Livepoll Core

use thiserror::Error;

/// Session errors. All of them are recoverable and are reported back to the
/// connection that caused them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{0}")]
    Validation(String),

    #[error("Name already taken: {0}. Please choose a different name.")]
    NameConflict(String),

    #[error("Unknown participant")]
    UnknownParticipant,

    #[error("Invalid option selected")]
    UnknownOption,

    #[error("You have already answered this question")]
    AlreadyAnswered,

    #[error("No active poll")]
    NoActivePoll,

    #[error("Cannot create new poll. Previous poll is still active or not all students have answered.")]
    PollInProgress,

    #[error("Not authorized: {0}")]
    NotAuthorized(String),
}

impl Error {
    /// Stable machine-readable code sent alongside the message on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NameConflict(_) => "NAME_CONFLICT",
            Error::UnknownParticipant => "UNKNOWN_PARTICIPANT",
            Error::UnknownOption => "UNKNOWN_OPTION",
            Error::AlreadyAnswered => "ALREADY_ANSWERED",
            Error::NoActivePoll => "NO_ACTIVE_POLL",
            Error::PollInProgress => "POLL_IN_PROGRESS",
            Error::NotAuthorized(_) => "NOT_AUTHORIZED",
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
