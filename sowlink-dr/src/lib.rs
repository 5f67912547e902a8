//! sowlink-dr library - read-only report review service
//!
//! Serves the field verification report built from the shared database:
//! JSON for tooling, CSV for the spreadsheet crowd, HTML for the field team.

use axum::Router;
use sowlink_rc::reporter::ReportThresholds;
use sowlink_rc::SqliteStore;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Store over a read-only connection pool
    pub store: SqliteStore,
    /// Confidence band boundaries used when building reports
    pub thresholds: ReportThresholds,
}

impl AppState {
    pub fn new(store: SqliteStore, thresholds: ReportThresholds) -> Self {
        Self { store, thresholds }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::report_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
