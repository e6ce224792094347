//! Livepoll Core Library
//!
//! Session state for a single live-polling classroom: the participant
//! registry, the poll lifecycle and archive, chat stamping, and roles.
//! Everything here is synchronous and owned by one caller at a time; the
//! network layer serializes access.

pub mod chat;
pub mod error;
pub mod invariants;
pub mod lifecycle;
pub mod models;
pub mod permissions;
pub mod registry;
pub mod session;

pub use chat::ChatRelay;
pub use error::{Error, Result};
pub use lifecycle::{EndReason, EndedPoll, NewPoll, PollLifecycle, PollLimits};
pub use models::*;
pub use permissions::*;
pub use registry::ParticipantRegistry;
pub use session::{AnswerAccepted, Departure, Grade, PollOpened, Scorecard, Session};
