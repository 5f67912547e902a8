//! Match result persistence

use sowlink_common::{MatchResult, MatchType, Result};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Insert or replace results keyed by `(project_id, design_label, field_label)`
pub async fn upsert_match_results(pool: &SqlitePool, results: &[MatchResult], run_id: Option<Uuid>) -> Result<u64> {
    let run_id = run_id.map(|id| id.to_string());
    let mut tx = pool.begin().await?;

    for result in results {
        sqlx::query(
            r#"
            INSERT INTO match_results (
                project_id, design_label, field_label, match_type,
                confidence_score, distance_meters, run_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT(project_id, design_label, field_label) DO UPDATE SET
                match_type = excluded.match_type,
                confidence_score = excluded.confidence_score,
                distance_meters = excluded.distance_meters,
                run_id = excluded.run_id,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&result.project_id)
        .bind(&result.design_label)
        .bind(&result.field_label)
        .bind(result.match_type.as_str())
        .bind(result.confidence_score)
        .bind(result.distance_meters)
        .bind(&run_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(results.len() as u64)
}

/// Results of one project, or all projects, ordered by project, design label, field label
pub async fn query_match_results(pool: &SqlitePool, project_id: Option<&str>) -> Result<Vec<MatchResult>> {
    let rows = sqlx::query(
        r#"
        SELECT project_id, design_label, field_label, match_type, confidence_score, distance_meters
        FROM match_results
        WHERE ?1 IS NULL OR project_id = ?1
        ORDER BY project_id, design_label, field_label
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(result_from_row).collect()
}

/// Delete a project's automatic results that are not in `keep`
///
/// Manual results are never removed.
pub async fn prune_match_results(pool: &SqlitePool, project_id: &str, keep: &[MatchResult]) -> Result<u64> {
    let keep: BTreeSet<(&str, &str)> = keep
        .iter()
        .map(|r| (r.design_label.as_str(), r.field_label.as_str()))
        .collect();

    let mut tx = pool.begin().await?;
    let existing = sqlx::query(
        "SELECT design_label, field_label FROM match_results WHERE project_id = ? AND match_type != ?",
    )
    .bind(project_id)
    .bind(MatchType::Manual.as_str())
    .fetch_all(&mut *tx)
    .await?;

    let mut pruned = 0;
    for row in existing {
        let design_label: String = row.get("design_label");
        let field_label: String = row.get("field_label");
        if keep.contains(&(design_label.as_str(), field_label.as_str())) {
            continue;
        }
        pruned += sqlx::query(
            "DELETE FROM match_results WHERE project_id = ? AND design_label = ? AND field_label = ? AND match_type != ?",
        )
        .bind(project_id)
        .bind(&design_label)
        .bind(&field_label)
        .bind(MatchType::Manual.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    tx.commit().await?;
    Ok(pruned)
}

fn result_from_row(row: &SqliteRow) -> Result<MatchResult> {
    let match_type: String = row.get("match_type");

    Ok(MatchResult {
        project_id: row.get("project_id"),
        design_label: row.get("design_label"),
        field_label: row.get("field_label"),
        match_type: match_type.parse()?,
        confidence_score: row.get("confidence_score"),
        distance_meters: row.get("distance_meters"),
    })
}
