//! Livepoll Network Library
//!
//! Serves one live-polling session over WebSockets, with read-only HTTP
//! projections of its state.
//!
//! # Architecture
//!
//! - **Coordinator**: single task that owns the session and applies every
//!   event in arrival order
//! - **Router**: delivers server events to everyone, teachers, or one
//!   connection without blocking the coordinator
//! - **Connection**: per-socket read loop and writer task
//! - **Protocol**: `{"event": ..., "data": ...}` JSON text frames
//!
//! # Usage
//!
//! ```ignore
//! let server = Server::start(ServerConfig::default()).await?;
//! println!("listening on {}", server.addr());
//!
//! tokio::signal::ctrl_c().await?;
//! server.shutdown().await?;
//! ```

pub mod config;
pub mod connection;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod protocol;
pub mod router;
pub mod server;
pub mod timer;

pub use config::ServerConfig;
pub use coordinator::{CoordinatorHandle, HealthReport};
pub use error::{Error, Result};
pub use protocol::{ClientEvent, ServerEvent};
pub use router::{Audience, BroadcastRouter, Outbound};
pub use server::Server;

/// Default listening port
pub const DEFAULT_PORT: u16 = 5000;
