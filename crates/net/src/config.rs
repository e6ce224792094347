//! Server configuration

use livepoll_core::PollLimits;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_PORT;

/// Configuration for the session server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind
    pub host: String,
    /// Port to bind (`0` picks a free port)
    pub port: u16,
    /// Origins allowed to call the HTTP endpoints from a browser
    pub allowed_origins: Vec<String>,
    /// Per-connection outbound queue depth. Messages beyond it are dropped
    /// for that connection only.
    pub outbound_queue: usize,
    /// Time limit bounds for polls
    pub poll: PollLimits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: DEFAULT_PORT,
            allowed_origins: vec!["http://localhost:3000".into()],
            outbound_queue: 64,
            poll: PollLimits::default(),
        }
    }
}

impl ServerConfig {
    /// Config bound to an ephemeral localhost port, for tests and tools
    pub fn ephemeral() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::default()
        }
    }
}
