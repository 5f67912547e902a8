//! Database access for sowlink-dr (read-only)

use anyhow::{Context, Result};
use sowlink_rc::SqliteStore;
use std::path::Path;

/// Open the shared database read-only
///
/// The database must already exist; sowlink-rc creates it.
pub async fn connect_readonly(db_path: &Path) -> Result<SqliteStore> {
    if !db_path.exists() {
        anyhow::bail!(
            "Database not found: {}\nRun sowlink-rc first to import records.",
            db_path.display()
        );
    }

    let pool = sowlink_common::db::open_readonly(db_path)
        .await
        .context("Failed to connect to database in read-only mode")?;

    Ok(SqliteStore::new(pool))
}
