//! Data models for Livepoll

mod message;
mod participant;
mod poll;
mod role;

pub use message::*;
pub use participant::*;
pub use poll::*;
pub use role::*;
