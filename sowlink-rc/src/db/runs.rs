//! Reconciliation run history

use chrono::{DateTime, SecondsFormat, Utc};
use sowlink_common::{Error, ReconciliationRun, Result, RunState};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

pub async fn record_run(pool: &SqlitePool, run: &ReconciliationRun) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO reconciliation_runs (
            run_id, project_id, state, started_at, ended_at,
            designs_processed, results_written, results_pruned, errors
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(run.run_id.to_string())
    .bind(&run.project_id)
    .bind(run.state.as_str())
    .bind(timestamp(&run.started_at))
    .bind(timestamp(&run.ended_at))
    .bind(run.designs_processed as i64)
    .bind(run.results_written as i64)
    .bind(run.results_pruned as i64)
    .bind(run.errors as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Runs of one project, newest first
pub async fn list_runs(pool: &SqlitePool, project_id: &str) -> Result<Vec<ReconciliationRun>> {
    let rows = sqlx::query(
        r#"
        SELECT run_id, project_id, state, started_at, ended_at,
               designs_processed, results_written, results_pruned, errors
        FROM reconciliation_runs
        WHERE project_id = ?
        ORDER BY started_at DESC
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let run_id: String = row.get("run_id");
            let state: String = row.get("state");
            let started_at: String = row.get("started_at");
            let ended_at: String = row.get("ended_at");

            Ok(ReconciliationRun {
                run_id: Uuid::parse_str(&run_id)
                    .map_err(|e| Error::Internal(format!("bad run id {}: {}", run_id, e)))?,
                project_id: row.get("project_id"),
                state: match state.as_str() {
                    "completed" => RunState::Completed,
                    _ => RunState::CompletedWithErrors,
                },
                started_at: parse_timestamp(&started_at)?,
                ended_at: parse_timestamp(&ended_at)?,
                designs_processed: row.get::<i64, _>("designs_processed") as u64,
                results_written: row.get::<i64, _>("results_written") as u64,
                results_pruned: row.get::<i64, _>("results_pruned") as u64,
                errors: row.get::<i64, _>("errors") as u64,
            })
        })
        .collect()
}

// Fixed width so ORDER BY on the text column is chronological
fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("bad timestamp {}: {}", value, e)))
}
