//! Project registry

use sowlink_common::{Project, Result};
use sqlx::{Row, SqlitePool};

/// Register a project; an absent name keeps the stored one
pub async fn upsert_project(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (project_id, name, created_at, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(project_id) DO UPDATE SET
            name = COALESCE(excluded.name, projects.name),
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&project.project_id)
    .bind(&project.name)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn list_projects(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query("SELECT project_id, name FROM projects ORDER BY project_id")
        .fetch_all(pool)
        .await?;

    Ok(rows
        .iter()
        .map(|row| Project {
            project_id: row.get("project_id"),
            name: row.get("name"),
        })
        .collect())
}

/// Every project id known to any table
pub async fn known_project_ids(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query(
        r#"
        SELECT project_id FROM projects
        UNION SELECT project_id FROM design_records
        UNION SELECT project_id FROM field_records
        UNION SELECT project_id FROM match_results
        ORDER BY project_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|row| row.get("project_id")).collect())
}
