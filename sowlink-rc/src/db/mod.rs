//! Reconciliation store
//!
//! The pipeline is generic over [`ReconciliationStore`]. [`SqliteStore`] is
//! the production implementation over the shared database file;
//! [`MemoryStore`] keeps everything in process for tests and dry runs.
//!
//! All writes are upserts, so re-running an interrupted batch is safe.

pub mod design_records;
pub mod field_records;
pub mod match_results;
pub mod memory;
pub mod projects;
pub mod runs;

pub use memory::MemoryStore;

use async_trait::async_trait;
use sowlink_common::{
    DesignRecord, FieldRecord, MatchResult, Project, ReconciliationRun, RecordKind, Result,
};
use sqlx::SqlitePool;
use std::path::Path;
use uuid::Uuid;

/// Persistent store for projects, records, match results and run history
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Register a project (an absent name keeps the stored name)
    async fn upsert_project(&self, project: &Project) -> Result<()>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Project ids referenced by any record, result or registration
    async fn known_project_ids(&self) -> Result<Vec<String>>;

    /// Upsert keyed by `(project_id, label)`; returns records written
    async fn upsert_design_records(&self, records: &[DesignRecord]) -> Result<u64>;

    /// One project (`Some`) or every project (`None`), ordered by project then label
    async fn query_design_records(&self, project_id: Option<&str>) -> Result<Vec<DesignRecord>>;

    /// Upsert keyed by `(project_id, label)`; returns records written
    async fn upsert_field_records(&self, records: &[FieldRecord]) -> Result<u64>;

    /// Clear the project's field records (of one kind, or all), then insert `records`
    async fn replace_field_records(
        &self,
        project_id: &str,
        kind: Option<RecordKind>,
        records: &[FieldRecord],
    ) -> Result<u64>;

    async fn query_field_records(&self, project_id: &str) -> Result<Vec<FieldRecord>>;

    /// Upsert keyed by `(project_id, design_label, field_label)`
    async fn upsert_match_results(&self, results: &[MatchResult], run_id: Option<Uuid>) -> Result<u64>;

    /// One project (`Some`) or every project (`None`), ordered by project, design label, field label
    async fn query_match_results(&self, project_id: Option<&str>) -> Result<Vec<MatchResult>>;

    /// Remove the project's automatic results missing from `keep`; manual rows stay
    async fn prune_match_results(&self, project_id: &str, keep: &[MatchResult]) -> Result<u64>;

    async fn record_run(&self, run: &ReconciliationRun) -> Result<()>;

    /// Newest first
    async fn list_runs(&self, project_id: &str) -> Result<Vec<ReconciliationRun>>;
}

/// Open the database (creating file and schema if needed)
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    tracing::debug!("Connecting to database: {}", db_path.display());
    sowlink_common::db::init_database(db_path).await
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open the database at `db_path` and wrap it
    pub async fn open(db_path: &Path) -> Result<Self> {
        Ok(Self::new(init_database_pool(db_path).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ReconciliationStore for SqliteStore {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        projects::upsert_project(&self.pool, project).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        projects::list_projects(&self.pool).await
    }

    async fn known_project_ids(&self) -> Result<Vec<String>> {
        projects::known_project_ids(&self.pool).await
    }

    async fn upsert_design_records(&self, records: &[DesignRecord]) -> Result<u64> {
        design_records::upsert_design_records(&self.pool, records).await
    }

    async fn query_design_records(&self, project_id: Option<&str>) -> Result<Vec<DesignRecord>> {
        design_records::query_design_records(&self.pool, project_id).await
    }

    async fn upsert_field_records(&self, records: &[FieldRecord]) -> Result<u64> {
        field_records::upsert_field_records(&self.pool, records).await
    }

    async fn replace_field_records(
        &self,
        project_id: &str,
        kind: Option<RecordKind>,
        records: &[FieldRecord],
    ) -> Result<u64> {
        field_records::replace_field_records(&self.pool, project_id, kind, records).await
    }

    async fn query_field_records(&self, project_id: &str) -> Result<Vec<FieldRecord>> {
        field_records::query_field_records(&self.pool, project_id).await
    }

    async fn upsert_match_results(&self, results: &[MatchResult], run_id: Option<Uuid>) -> Result<u64> {
        match_results::upsert_match_results(&self.pool, results, run_id).await
    }

    async fn query_match_results(&self, project_id: Option<&str>) -> Result<Vec<MatchResult>> {
        match_results::query_match_results(&self.pool, project_id).await
    }

    async fn prune_match_results(&self, project_id: &str, keep: &[MatchResult]) -> Result<u64> {
        match_results::prune_match_results(&self.pool, project_id, keep).await
    }

    async fn record_run(&self, run: &ReconciliationRun) -> Result<()> {
        runs::record_run(&self.pool, run).await
    }

    async fn list_runs(&self, project_id: &str) -> Result<Vec<ReconciliationRun>> {
        runs::list_runs(&self.pool, project_id).await
    }
}
