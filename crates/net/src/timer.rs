//! Poll expiry timer
//!
//! The timer never touches session state. When it fires it sends
//! [`Command::PollExpired`] into the coordinator's queue, so expiry is
//! applied in the same order as client events.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::coordinator::Command;

/// One-shot timer for the active poll
#[derive(Debug, Default)]
pub struct PollTimer {
    armed: Option<(Uuid, JoinHandle<()>)>,
}

impl PollTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm for `poll_id`, replacing any pending timer
    pub fn arm(&mut self, poll_id: Uuid, after: Duration, commands: mpsc::WeakSender<Command>) {
        self.cancel();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = commands.upgrade() {
                let _ = tx.send(Command::PollExpired { poll_id }).await;
            }
        });
        debug!(poll_id = %poll_id, after_ms = after.as_millis() as u64, "Poll timer armed");
        self.armed = Some((poll_id, handle));
    }

    /// Abort the pending timer, if any
    pub fn cancel(&mut self) {
        if let Some((poll_id, handle)) = self.armed.take() {
            handle.abort();
            debug!(poll_id = %poll_id, "Poll timer cancelled");
        }
    }

    /// Poll the timer is armed for
    pub fn poll_id(&self) -> Option<Uuid> {
        self.armed.as_ref().map(|(id, _)| *id)
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.armed.take() {
            handle.abort();
        }
    }
}
