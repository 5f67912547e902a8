//! Report endpoints
//!
//! Every request rebuilds the report from the database, so the service
//! always reflects the latest reconciliation run.

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Json, Router,
};
use sowlink_rc::load_report;
use sowlink_rc::reporter::{csv::render_csv, export_rows, html::render_html, ProjectReport, ReconciliationReport};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// GET /api/report
pub async fn get_report(State(state): State<AppState>) -> Result<Json<ReconciliationReport>, ApiError> {
    let report = load_report(&state.store, None, state.thresholds).await?;
    debug!("Serving report for {} projects", report.projects.len());
    Ok(Json(report))
}

/// GET /api/projects/:id/report
pub async fn get_project_report(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> Result<Json<ProjectReport>, ApiError> {
    let report = load_report(&state.store, Some(&project_id), state.thresholds).await?;
    report
        .projects
        .into_iter()
        .find(|p| p.project_id == project_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("project {}", project_id)))
}

/// GET /api/export.csv
pub async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let report = load_report(&state.store, None, state.thresholds).await?;
    let filename = format!(
        "attachment; filename=\"field-verification-{}.csv\"",
        report.generated_at.format("%Y-%m-%d")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        render_csv(&export_rows(&report)),
    ))
}

/// GET /report.html
pub async fn report_html(State(state): State<AppState>) -> Result<Html<String>, ApiError> {
    let report = load_report(&state.store, None, state.thresholds).await?;
    Ok(Html(render_html(&report)))
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/report", get(get_report))
        .route("/api/projects/:id/report", get(get_project_report))
        .route("/api/export.csv", get(export_csv))
        .route("/report.html", get(report_html))
}
