//! Read-only HTTP projections of session state

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use livepoll_core::{Participant, Poll, Scorecard};
use serde_json::json;

use crate::coordinator::HealthReport;
use crate::error::{Error, Result};
use crate::server::AppState;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::CoordinatorClosed => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `GET /api/polls` - every poll in creation order
pub async fn list_polls(State(state): State<AppState>) -> Result<Json<Vec<Poll>>> {
    Ok(Json(state.coordinator.polls().await?))
}

/// `GET /api/students` - current roster
pub async fn list_students(State(state): State<AppState>) -> Result<Json<Vec<Participant>>> {
    Ok(Json(state.coordinator.students().await?))
}

/// `GET /api/scorecard` - the newest poll graded for the current roster,
/// `null` before any poll
pub async fn scorecard(State(state): State<AppState>) -> Result<Json<Option<Scorecard>>> {
    Ok(Json(state.coordinator.scorecard().await?))
}

pub async fn health(State(state): State<AppState>) -> Result<Json<HealthReport>> {
    Ok(Json(state.coordinator.health().await?))
}
