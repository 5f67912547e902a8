//! Database initialization
//!
//! Creates the database file on first run and applies the schema. Every
//! `CREATE` statement is idempotent, so initialization is safe on every start.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database and ensure the schema exists
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open an existing database without write access
///
/// Fails when the file does not exist; the schema is not touched.
pub async fn open_readonly(db_path: &Path) -> Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=ro", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    info!("Opened database read-only: {}", db_path.display());
    Ok(pool)
}

/// Create every table and index used by the reconciliation pipeline
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_projects_table(pool).await?;
    create_design_records_table(pool).await?;
    create_field_records_table(pool).await?;
    create_match_results_table(pool).await?;
    create_reconciliation_runs_table(pool).await?;
    Ok(())
}

async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            project_id TEXT PRIMARY KEY,
            name TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_design_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS design_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            label TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'pole' CHECK (kind IN ('pole', 'drop')),
            label_normalized TEXT,
            label_suffix INTEGER,
            latitude REAL,
            longitude REAL,
            status TEXT NOT NULL DEFAULT 'pending',
            attributes TEXT NOT NULL DEFAULT '{}',
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(project_id, label)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_design_records_normalized ON design_records(project_id, label_normalized)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_field_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS field_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            label TEXT NOT NULL,
            kind TEXT NOT NULL DEFAULT 'pole' CHECK (kind IN ('pole', 'drop')),
            label_normalized TEXT,
            label_suffix INTEGER,
            latitude REAL,
            longitude REAL,
            status TEXT,
            attributes TEXT NOT NULL DEFAULT '{}',
            synced_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(project_id, label)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_field_records_normalized ON field_records(project_id, label_normalized)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_match_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS match_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            design_label TEXT NOT NULL,
            field_label TEXT NOT NULL,
            match_type TEXT NOT NULL CHECK (match_type IN ('exact', 'normalized', 'numeric_suffix', 'proximity', 'manual')),
            confidence_score REAL NOT NULL CHECK (confidence_score >= 0 AND confidence_score <= 1),
            distance_meters REAL,
            run_id TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(project_id, design_label, field_label)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_match_results_confidence ON match_results(project_id, confidence_score)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_reconciliation_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reconciliation_runs (
            run_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            state TEXT NOT NULL CHECK (state IN ('completed', 'completed_with_errors')),
            started_at TIMESTAMP NOT NULL,
            ended_at TIMESTAMP NOT NULL,
            designs_processed INTEGER NOT NULL DEFAULT 0,
            results_written INTEGER NOT NULL DEFAULT 0,
            results_pruned INTEGER NOT NULL DEFAULT 0,
            errors INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
