//! In-process store for tests and dry runs

use super::ReconciliationStore;
use async_trait::async_trait;
use sowlink_common::{
    DesignRecord, Error, FieldRecord, MatchResult, MatchType, Project, ReconciliationRun, RecordKind,
    Result,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

type RecordKey = (String, String);
type ResultKey = (String, String, String);

#[derive(Default)]
struct Inner {
    projects: BTreeMap<String, Option<String>>,
    designs: BTreeMap<RecordKey, DesignRecord>,
    fields: BTreeMap<RecordKey, FieldRecord>,
    results: BTreeMap<ResultKey, MatchResult>,
    runs: Vec<ReconciliationRun>,
}

/// Store backed by ordered maps behind a tokio `RwLock`
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every record/result write fail until switched off
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Internal("simulated write failure".to_string()));
        }
        Ok(())
    }
}

fn result_key(r: &MatchResult) -> ResultKey {
    (r.project_id.clone(), r.design_label.clone(), r.field_label.clone())
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn upsert_project(&self, project: &Project) -> Result<()> {
        let mut inner = self.inner.write().await;
        let entry = inner.projects.entry(project.project_id.clone()).or_default();
        if project.name.is_some() {
            *entry = project.name.clone();
        }
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let inner = self.inner.read().await;
        Ok(inner
            .projects
            .iter()
            .map(|(id, name)| Project {
                project_id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn known_project_ids(&self) -> Result<Vec<String>> {
        let inner = self.inner.read().await;
        let ids: BTreeSet<String> = inner
            .projects
            .keys()
            .cloned()
            .chain(inner.designs.keys().map(|k| k.0.clone()))
            .chain(inner.fields.keys().map(|k| k.0.clone()))
            .chain(inner.results.keys().map(|k| k.0.clone()))
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn upsert_design_records(&self, records: &[DesignRecord]) -> Result<u64> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        for record in records {
            inner.designs.insert(
                (record.project_id.clone(), record.label.clone()),
                record.clone(),
            );
        }
        Ok(records.len() as u64)
    }

    async fn query_design_records(&self, project_id: Option<&str>) -> Result<Vec<DesignRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .designs
            .values()
            .filter(|d| project_id.map_or(true, |p| d.project_id == p))
            .cloned()
            .collect())
    }

    async fn upsert_field_records(&self, records: &[FieldRecord]) -> Result<u64> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        for record in records {
            inner.fields.insert(
                (record.project_id.clone(), record.label.clone()),
                record.clone(),
            );
        }
        Ok(records.len() as u64)
    }

    async fn replace_field_records(
        &self,
        project_id: &str,
        kind: Option<RecordKind>,
        records: &[FieldRecord],
    ) -> Result<u64> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        inner.fields.retain(|(project, _), field| {
            project != project_id || kind.map_or(false, |k| field.kind != k)
        });
        for record in records {
            inner.fields.insert(
                (record.project_id.clone(), record.label.clone()),
                record.clone(),
            );
        }
        Ok(records.len() as u64)
    }

    async fn query_field_records(&self, project_id: &str) -> Result<Vec<FieldRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .fields
            .values()
            .filter(|f| f.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn upsert_match_results(&self, results: &[MatchResult], _run_id: Option<Uuid>) -> Result<u64> {
        self.check_writable()?;
        let mut inner = self.inner.write().await;
        for result in results {
            inner.results.insert(result_key(result), result.clone());
        }
        Ok(results.len() as u64)
    }

    async fn query_match_results(&self, project_id: Option<&str>) -> Result<Vec<MatchResult>> {
        let inner = self.inner.read().await;
        Ok(inner
            .results
            .values()
            .filter(|r| project_id.map_or(true, |p| r.project_id == p))
            .cloned()
            .collect())
    }

    async fn prune_match_results(&self, project_id: &str, keep: &[MatchResult]) -> Result<u64> {
        let keep: BTreeSet<ResultKey> = keep.iter().map(result_key).collect();
        let mut inner = self.inner.write().await;
        let before = inner.results.len();
        inner.results.retain(|key, result| {
            key.0 != project_id || result.match_type == MatchType::Manual || keep.contains(key)
        });
        Ok((before - inner.results.len()) as u64)
    }

    async fn record_run(&self, run: &ReconciliationRun) -> Result<()> {
        self.inner.write().await.runs.push(run.clone());
        Ok(())
    }

    async fn list_runs(&self, project_id: &str) -> Result<Vec<ReconciliationRun>> {
        let inner = self.inner.read().await;
        let mut runs: Vec<ReconciliationRun> = inner
            .runs
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}
