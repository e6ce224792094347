//! Broadcast router - delivers server events to audiences
//!
//! Each connection registers a bounded outbound queue drained by its writer
//! task. Delivery never waits: a full or closed queue drops the event for
//! that recipient only.

use std::collections::HashMap;
use std::sync::Arc;

use livepoll_core::Role;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::protocol::ServerEvent;

/// Who an event is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Every open connection, joined or not
    Everyone,
    /// Connections that sent `teacher-join`
    Teachers,
    Connection(Uuid),
}

/// Items queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Pre-serialized event frame
    Event(Arc<str>),
    /// Send a close frame and end the connection
    Close,
}

struct Peer {
    role: Option<Role>,
    tx: mpsc::Sender<Outbound>,
}

/// Connection table keyed by connection id
#[derive(Default)]
pub struct BroadcastRouter {
    peers: HashMap<Uuid, Peer>,
}

impl BroadcastRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with no role yet
    pub fn register(&mut self, conn_id: Uuid, tx: mpsc::Sender<Outbound>) {
        self.peers.insert(conn_id, Peer { role: None, tx });
    }

    /// Forget a connection. Returns its role, if it had one.
    pub fn unregister(&mut self, conn_id: Uuid) -> Option<Role> {
        self.peers.remove(&conn_id).and_then(|p| p.role)
    }

    pub fn set_role(&mut self, conn_id: Uuid, role: Role) {
        if let Some(peer) = self.peers.get_mut(&conn_id) {
            peer.role = Some(role);
        }
    }

    pub fn role(&self, conn_id: Uuid) -> Option<Role> {
        self.peers.get(&conn_id).and_then(|p| p.role)
    }

    pub fn contains(&self, conn_id: Uuid) -> bool {
        self.peers.contains_key(&conn_id)
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Serialize `event` once and queue it for every member of `audience`.
    /// Returns how many recipients accepted it.
    pub fn emit(&self, audience: Audience, event: &ServerEvent) -> usize {
        let frame: Arc<str> = match event.to_json() {
            Ok(json) => json.into(),
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to serialize event");
                return 0;
            }
        };

        let mut delivered = 0;
        for (conn_id, peer) in self.recipients(audience) {
            if deliver(*conn_id, peer, Outbound::Event(frame.clone()), event.name()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Ask a connection to close and forget it
    pub fn close(&mut self, conn_id: Uuid) {
        if let Some(peer) = self.peers.remove(&conn_id) {
            deliver(conn_id, &peer, Outbound::Close, "close");
        }
    }

    /// Close every connection
    pub fn close_all(&mut self) {
        for (conn_id, peer) in self.peers.drain() {
            deliver(conn_id, &peer, Outbound::Close, "close");
        }
    }

    fn recipients(&self, audience: Audience) -> Box<dyn Iterator<Item = (&Uuid, &Peer)> + '_> {
        match audience {
            Audience::Everyone => Box::new(self.peers.iter()),
            Audience::Teachers => Box::new(
                self.peers
                    .iter()
                    .filter(|(_, p)| p.role == Some(Role::Teacher)),
            ),
            Audience::Connection(id) => Box::new(self.peers.get_key_value(&id).into_iter()),
        }
    }
}

fn deliver(conn_id: Uuid, peer: &Peer, item: Outbound, name: &str) -> bool {
    match peer.tx.try_send(item) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(conn_id = %conn_id, event = name, "Outbound queue full, dropping event");
            false
        }
        Err(TrySendError::Closed(_)) => {
            debug!(conn_id = %conn_id, event = name, "Connection gone, dropping event");
            false
        }
    }
}
