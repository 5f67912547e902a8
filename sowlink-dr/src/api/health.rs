//! Liveness plus a database reachability check

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use sowlink_rc::ReconciliationStore;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" when the database answers, "degraded" otherwise
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
    /// Projects visible to the report; absent when the database is unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projects: Option<usize>,
}

/// GET /health
///
/// Always 200 so a load balancer can tell a live process from a dead one;
/// database trouble shows up in `status`.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let projects = match state.store.known_project_ids().await {
        Ok(ids) => Some(ids.len()),
        Err(e) => {
            warn!("Health check could not read projects: {}", e);
            None
        }
    };

    Json(HealthResponse {
        status: if projects.is_some() { "ok" } else { "degraded" },
        module: "sowlink-dr",
        version: env!("CARGO_PKG_VERSION"),
        projects,
    })
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
