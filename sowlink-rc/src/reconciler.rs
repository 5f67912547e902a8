//! Reconciliation pipeline orchestration
//!
//! Ties the stages together over an injected [`ReconciliationStore`]:
//! ingestion writes design and field records, reconciliation matches them
//! and persists results, reporting reads everything back.
//!
//! Writes go out in fixed-size batches. A failed batch is logged and counted
//! and the run carries on; re-running is safe because every write is an
//! upsert. Failing to read from the store is fatal for the operation.

use crate::db::ReconciliationStore;
use crate::ingest::{ColumnAliases, ImportStats, RowMapper};
use crate::matcher::CandidateMatcher;
use crate::normalizer::normalize_label;
use crate::reporter::{build_report, ReconciliationReport, ReportThresholds};
use chrono::Utc;
use serde_json::Value;
use sowlink_common::{
    DesignRecord, Error, FieldRecord, MatchResult, MatchType, Project, ReconciliationConfig,
    ReconciliationRun, RecordKind, Result, RunState,
};
use std::collections::BTreeSet;
use tracing::{info, warn};
use uuid::Uuid;

/// Confidence recorded for a manual link
pub const MANUAL_CONFIDENCE: f64 = 1.0;

/// Which existing field records a replacing import clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceScope {
    /// Every field record of the project (registry sync brings both kinds)
    Project,
    /// Only records of one kind (spreadsheets hold poles or drops)
    Kind(RecordKind),
}

impl ReplaceScope {
    pub fn kind(self) -> Option<RecordKind> {
        match self {
            ReplaceScope::Project => None,
            ReplaceScope::Kind(kind) => Some(kind),
        }
    }
}

pub struct Reconciler<S> {
    store: S,
    config: ReconciliationConfig,
    aliases: ColumnAliases,
    matcher: CandidateMatcher,
}

impl<S: ReconciliationStore> Reconciler<S> {
    pub fn new(store: S, config: ReconciliationConfig, aliases: ColumnAliases) -> Self {
        let matcher = CandidateMatcher::new(config.clone());
        Self {
            store,
            config,
            aliases,
            matcher,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub async fn register_project(&self, project_id: &str, name: Option<String>) -> Result<()> {
        self.store
            .upsert_project(&Project {
                project_id: project_id.to_string(),
                name,
            })
            .await
    }

    /// Map spreadsheet rows to design records and upsert them
    pub async fn import_design_rows(&self, project_id: &str, rows: &[Value], kind: RecordKind) -> Result<ImportStats> {
        let mapper = RowMapper::new(self.aliases.clone(), kind);
        let mut stats = ImportStats {
            total: rows.len(),
            ..Default::default()
        };

        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            match mapper.map_design_row(project_id, row) {
                Ok(record) => {
                    stats.normalization.record(&normalize_label(&record.label));
                    records.push(record);
                }
                Err(reason) => {
                    warn!(project = project_id, row = i, "Skipping design row: {}", reason);
                    stats.skipped += 1;
                }
            }
        }

        self.register_project(project_id, None).await?;

        let total = records.len();
        let mut processed = 0;
        for batch in records.chunks(self.config.batch_size) {
            match self.store.upsert_design_records(batch).await {
                Ok(written) => stats.imported += written as usize,
                Err(e) => {
                    warn!(project = project_id, batch = batch.len(), "Design batch failed: {}", e);
                    stats.errors += batch.len();
                }
            }
            processed += batch.len();
            info!(
                "Design import {}: {}/{} processed, {} imported, {} errors",
                project_id, processed, total, stats.imported, stats.errors
            );
        }

        info!("Design import {} complete: {}", project_id, stats.display_string());
        Ok(stats)
    }

    /// Map spreadsheet rows to field records and store them
    pub async fn import_field_rows(
        &self,
        project_id: &str,
        rows: &[Value],
        kind: RecordKind,
        replace: bool,
    ) -> Result<ImportStats> {
        let mapper = RowMapper::new(self.aliases.clone(), kind);
        let mut records = Vec::with_capacity(rows.len());
        let mut skipped = 0;

        for (i, row) in rows.iter().enumerate() {
            match mapper.map_field_row(project_id, row) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!(project = project_id, row = i, "Skipping field row: {}", reason);
                    skipped += 1;
                }
            }
        }

        let scope = replace.then_some(ReplaceScope::Kind(kind));
        let mut stats = self.import_field_records(project_id, &records, scope).await?;
        stats.total = rows.len();
        stats.skipped = skipped;
        Ok(stats)
    }

    /// Store field records (from rows or the registry)
    ///
    /// With a `replace` scope, the matching existing field records are
    /// cleared together with the first batch, so a failed first batch leaves
    /// the old set untouched.
    pub async fn import_field_records(
        &self,
        project_id: &str,
        records: &[FieldRecord],
        replace: Option<ReplaceScope>,
    ) -> Result<ImportStats> {
        let mut stats = ImportStats {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            stats.normalization.record(&normalize_label(&record.label));
        }

        self.register_project(project_id, None).await?;

        let kind = replace.and_then(ReplaceScope::kind);
        if replace.is_some() && records.is_empty() {
            self.store.replace_field_records(project_id, kind, &[]).await?;
            info!("Field records for {} cleared", project_id);
            return Ok(stats);
        }

        let total = records.len();
        let mut processed = 0;
        let mut cleared = replace.is_none();
        for batch in records.chunks(self.config.batch_size) {
            let written = if cleared {
                self.store.upsert_field_records(batch).await
            } else {
                self.store.replace_field_records(project_id, kind, batch).await
            };
            match written {
                Ok(n) => {
                    cleared = true;
                    stats.imported += n as usize;
                }
                Err(e) => {
                    warn!(project = project_id, batch = batch.len(), "Field batch failed: {}", e);
                    stats.errors += batch.len();
                }
            }
            processed += batch.len();
            info!(
                "Field import {}: {}/{} processed, {} imported, {} errors",
                project_id, processed, total, stats.imported, stats.errors
            );
        }

        info!("Field import {} complete: {}", project_id, stats.display_string());
        Ok(stats)
    }

    /// Match one project's design records and persist the results
    ///
    /// Design records with a manual link are left out of automatic matching.
    /// When every batch was written and pruning is enabled, automatic results
    /// the run did not reproduce are removed.
    pub async fn reconcile_project(&self, project_id: &str) -> Result<ReconciliationRun> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run = %run_id, "Reconciling project {}", project_id);

        let designs = self.store.query_design_records(Some(project_id)).await?;
        let fields = self.store.query_field_records(project_id).await?;
        let existing = self.store.query_match_results(Some(project_id)).await?;

        let manual: BTreeSet<&str> = existing
            .iter()
            .filter(|r| r.match_type == MatchType::Manual)
            .map(|r| r.design_label.as_str())
            .collect();
        let candidates: Vec<DesignRecord> = designs
            .iter()
            .filter(|d| !manual.contains(d.label.as_str()))
            .cloned()
            .collect();

        let results = self.matcher.match_records(&candidates, &fields);
        info!(
            "Project {}: {} design records ({} manually linked), {} field records, {} results",
            project_id,
            designs.len(),
            designs.len() - candidates.len(),
            fields.len(),
            results.len()
        );

        let mut written = 0u64;
        let mut errors = 0u64;
        let total = results.len();
        let mut processed = 0;
        for batch in results.chunks(self.config.batch_size) {
            match self.store.upsert_match_results(batch, Some(run_id)).await {
                Ok(n) => written += n,
                Err(e) => {
                    warn!(project = project_id, batch = batch.len(), "Result batch failed: {}", e);
                    errors += batch.len() as u64;
                }
            }
            processed += batch.len();
            info!(
                "Reconcile {}: {}/{} processed, {} written, {} errors",
                project_id, processed, total, written, errors
            );
        }

        let mut pruned = 0;
        if errors == 0 && self.config.prune_stale {
            match self.store.prune_match_results(project_id, &results).await {
                Ok(n) => pruned = n,
                Err(e) => {
                    warn!(project = project_id, "Pruning stale results failed: {}", e);
                    errors += 1;
                }
            }
        } else if errors > 0 {
            warn!(project = project_id, "Skipping stale result pruning after write errors");
        }

        let run = ReconciliationRun {
            run_id,
            project_id: project_id.to_string(),
            state: if errors == 0 {
                RunState::Completed
            } else {
                RunState::CompletedWithErrors
            },
            started_at,
            ended_at: Utc::now(),
            designs_processed: candidates.len() as u64,
            results_written: written,
            results_pruned: pruned,
            errors,
        };

        if let Err(e) = self.store.record_run(&run).await {
            warn!(run = %run_id, "Failed to record run: {}", e);
        }

        info!(
            "Reconcile {} {}: {} written, {} pruned, {} errors",
            project_id,
            run.state.as_str(),
            run.results_written,
            run.results_pruned,
            run.errors
        );
        Ok(run)
    }

    /// Reconcile every project known to the store, in project id order
    pub async fn reconcile_all(&self) -> Result<Vec<ReconciliationRun>> {
        let mut runs = Vec::new();
        for project_id in self.store.known_project_ids().await? {
            runs.push(self.reconcile_project(&project_id).await?);
        }
        Ok(runs)
    }

    /// Record a field team's confirmed pairing
    ///
    /// Both records must exist. Automatic results for the design record are
    /// dropped by the next reconciliation run.
    pub async fn link_manual(&self, project_id: &str, design_label: &str, field_label: &str) -> Result<MatchResult> {
        let design = self
            .store
            .query_design_records(Some(project_id))
            .await?
            .into_iter()
            .find(|d| d.label == design_label)
            .ok_or_else(|| Error::design_not_found(project_id, design_label))?;
        let field = self
            .store
            .query_field_records(project_id)
            .await?
            .into_iter()
            .find(|f| f.label == field_label)
            .ok_or_else(|| Error::field_not_found(project_id, field_label))?;

        if design.kind != field.kind {
            return Err(Error::InvalidInput(format!(
                "cannot link {} {} to {} {}",
                design.kind, design.label, field.kind, field.label
            )));
        }

        let distance_meters = match (design.coordinates(), field.coordinates()) {
            (Some(d), Some(f)) => Some(d.distance_meters(&f)),
            _ => None,
        };
        let result = MatchResult {
            project_id: project_id.to_string(),
            design_label: design.label,
            field_label: field.label,
            match_type: MatchType::Manual,
            confidence_score: MANUAL_CONFIDENCE,
            distance_meters,
        };

        self.store
            .upsert_match_results(std::slice::from_ref(&result), None)
            .await?;
        info!(
            "Linked {} -> {} in project {}",
            result.design_label, result.field_label, project_id
        );
        Ok(result)
    }

    /// Build the review report for one project or all projects
    pub async fn generate_report(&self, project_id: Option<&str>) -> Result<ReconciliationReport> {
        load_report(&self.store, project_id, ReportThresholds::from_config(&self.config)).await
    }
}

/// Read projects, design records and results from a store and build the report
pub async fn load_report<S: ReconciliationStore + ?Sized>(
    store: &S,
    project_id: Option<&str>,
    thresholds: ReportThresholds,
) -> Result<ReconciliationReport> {
    let mut projects = store.list_projects().await?;
    if let Some(id) = project_id {
        projects.retain(|p| p.project_id == id);
    }
    let designs = store.query_design_records(project_id).await?;
    let results = store.query_match_results(project_id).await?;

    Ok(build_report(&projects, &designs, &results, thresholds, Utc::now()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use serde_json::json;

    fn reconciler() -> Reconciler<MemoryStore> {
        Reconciler::new(MemoryStore::new(), ReconciliationConfig::default(), ColumnAliases::default())
    }

    #[tokio::test]
    async fn import_counts_skipped_rows() {
        let r = reconciler();
        let rows = vec![json!({"label_1": "LAW.P.A001"}), json!({"lat": 1.0}), json!("junk")];

        let stats = r.import_design_rows("LAW", &rows, RecordKind::Pole).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.imported, 1);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.normalization.normalized, 1);
    }

    #[tokio::test]
    async fn small_batches_import_everything() {
        let mut config = ReconciliationConfig::default();
        config.batch_size = 2;
        let r = Reconciler::new(MemoryStore::new(), config, ColumnAliases::default());
        let rows: Vec<Value> = (0..5).map(|i| json!({"label": format!("P.{}", i)})).collect();

        let stats = r.import_design_rows("P", &rows, RecordKind::Pole).await.unwrap();
        assert_eq!(stats.imported, 5);
        assert_eq!(r.store().query_design_records(Some("P")).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn replace_clears_previous_field_records() {
        let r = reconciler();
        r.import_field_rows("P", &[json!({"label": "OLD"})], RecordKind::Pole, false)
            .await
            .unwrap();
        r.import_field_rows("P", &[json!({"label": "NEW"})], RecordKind::Pole, true)
            .await
            .unwrap();

        let fields = r.store().query_field_records("P").await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].label, "NEW");
    }

    #[tokio::test]
    async fn link_requires_existing_records() {
        let r = reconciler();
        r.import_design_rows("P", &[json!({"label": "A"})], RecordKind::Pole)
            .await
            .unwrap();

        let err = r.link_manual("P", "A", "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn link_rejects_kind_mismatch() {
        let r = reconciler();
        r.import_design_rows("P", &[json!({"label": "A"})], RecordKind::Pole)
            .await
            .unwrap();
        r.import_field_rows("P", &[json!({"label": "DR1"})], RecordKind::Drop, false)
            .await
            .unwrap();

        let err = r.link_manual("P", "A", "DR1").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
