//! HTTP and WebSocket server for a polling session
//!
//! Binds the listener, starts the coordinator, and serves `/ws` plus the
//! read-only projections until shut down.

use std::net::SocketAddr;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::coordinator::{self, CoordinatorHandle};
use crate::error::{Error, Result};
use crate::{connection, http};

/// State shared by every request handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    /// Outbound queue depth for new connections
    pub outbound_queue: usize,
}

/// Build the route table
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/ws", get(connection::ws_handler))
        .route("/api/polls", get(http::list_polls))
        .route("/api/students", get(http::list_students))
        .route("/api/scorecard", get(http::scorecard))
        .route("/health", get(http::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// CORS restricted to `origins`
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .map_err(|_| Error::InvalidOrigin(origin.clone()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers(Any))
}

/// Running server handle
pub struct Server {
    addr: SocketAddr,
    coordinator: CoordinatorHandle,
    shutdown_tx: broadcast::Sender<()>,
    serve_task: JoinHandle<()>,
    coordinator_task: JoinHandle<()>,
}

impl Server {
    /// Bind and start serving
    pub async fn start(config: ServerConfig) -> Result<Self> {
        let cors = cors_layer(&config.allowed_origins)?;
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;

        let (coordinator, coordinator_task) = coordinator::spawn(config.poll);
        let state = AppState {
            coordinator: coordinator.clone(),
            outbound_queue: config.outbound_queue.max(1),
        };
        let router = app(state, cors);

        let (shutdown_tx, _) = broadcast::channel(1);
        let mut shutdown_rx = shutdown_tx.subscribe();
        let serve_task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await;
            if let Err(e) = result {
                error!(error = %e, "Server failed");
            }
            info!("HTTP server stopped");
        });

        info!(addr = %addr, "Server started");

        Ok(Server {
            addr,
            coordinator,
            shutdown_tx,
            serve_task,
            coordinator_task,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Close every connection, stop accepting, and wait for both tasks
    pub async fn shutdown(self) -> Result<()> {
        info!("Server shutdown initiated");
        // Already stopped is fine
        let _ = self.coordinator.shutdown().await;
        let _ = self.shutdown_tx.send(());

        if let Err(e) = self.coordinator_task.await {
            error!(error = %e, "Coordinator task failed");
        }
        if let Err(e) = self.serve_task.await {
            error!(error = %e, "Server task failed");
        }
        Ok(())
    }
}
