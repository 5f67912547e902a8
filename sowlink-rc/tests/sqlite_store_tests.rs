//! SqliteStore tests against a temporary database file

use chrono::{Duration, Utc};
use serde_json::json;
use sowlink_common::db::models::Attributes;
use sowlink_common::{
    DesignRecord, FieldRecord, MatchResult, MatchType, Project, ReconciliationRun, RecordKind,
    RunState,
};
use sowlink_rc::{ReconciliationStore, SqliteStore};
use tempfile::TempDir;
use uuid::Uuid;

async fn store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().unwrap();
    let store = SqliteStore::open(&dir.path().join("sowlink.db")).await.unwrap();
    (dir, store)
}

fn design(project: &str, label: &str) -> DesignRecord {
    DesignRecord {
        project_id: project.to_string(),
        label: label.to_string(),
        kind: RecordKind::Pole,
        latitude: None,
        longitude: None,
        status: "pending".to_string(),
        attributes: Attributes::new(),
    }
}

fn field(project: &str, label: &str) -> FieldRecord {
    FieldRecord {
        project_id: project.to_string(),
        label: label.to_string(),
        kind: RecordKind::Pole,
        latitude: None,
        longitude: None,
        status: None,
        attributes: Attributes::new(),
    }
}

fn result(project: &str, design: &str, field: &str, match_type: MatchType) -> MatchResult {
    MatchResult {
        project_id: project.to_string(),
        design_label: design.to_string(),
        field_label: field.to_string(),
        match_type,
        confidence_score: 0.95,
        distance_meters: Some(4.2),
    }
}

#[tokio::test]
async fn test_design_upsert_round_trips_and_updates() {
    let (_dir, store) = store().await;

    let mut pole = design("LAW", "LAW.P.A001");
    pole.latitude = Some(-26.1);
    pole.longitude = Some(28.2);
    pole.attributes.insert("height".to_string(), json!(9));
    store
        .upsert_design_records(&[pole.clone(), design("LAW", "LAW.P.A000")])
        .await
        .unwrap();

    pole.status = "planted".to_string();
    store.upsert_design_records(&[pole.clone()]).await.unwrap();

    let designs = store.query_design_records(Some("LAW")).await.unwrap();
    assert_eq!(designs.len(), 2);
    assert_eq!(designs[0].label, "LAW.P.A000");
    assert_eq!(designs[1], pole);
}

#[tokio::test]
async fn test_design_query_without_project_spans_all() {
    let (_dir, store) = store().await;
    store
        .upsert_design_records(&[design("MOH", "M1"), design("LAW", "L1")])
        .await
        .unwrap();

    let all = store.query_design_records(None).await.unwrap();
    let keys: Vec<_> = all
        .iter()
        .map(|d| (d.project_id.as_str(), d.label.as_str()))
        .collect();
    assert_eq!(keys, [("LAW", "L1"), ("MOH", "M1")]);
}

#[tokio::test]
async fn test_replace_field_records_is_scoped_to_project() {
    let (_dir, store) = store().await;
    store
        .upsert_field_records(&[field("P", "OLD"), field("Q", "KEEP")])
        .await
        .unwrap();

    let written = store
        .replace_field_records("P", None, &[field("P", "NEW")])
        .await
        .unwrap();
    assert_eq!(written, 1);

    let p = store.query_field_records("P").await.unwrap();
    assert_eq!(p.len(), 1);
    assert_eq!(p[0].label, "NEW");
    assert_eq!(store.query_field_records("Q").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_replace_by_kind_keeps_other_kind() {
    let (_dir, store) = store().await;
    let mut old_drop = field("P", "DR1");
    old_drop.kind = RecordKind::Drop;
    store
        .upsert_field_records(&[field("P", "LAW.P.001"), old_drop])
        .await
        .unwrap();

    let mut new_drop = field("P", "DR100");
    new_drop.kind = RecordKind::Drop;
    store
        .replace_field_records("P", Some(RecordKind::Drop), &[new_drop])
        .await
        .unwrap();

    let fields = store.query_field_records("P").await.unwrap();
    let labels: Vec<_> = fields.iter().map(|f| (f.label.as_str(), f.kind)).collect();
    assert_eq!(
        labels,
        [("DR100", RecordKind::Drop), ("LAW.P.001", RecordKind::Pole)]
    );
}

#[tokio::test]
async fn test_field_status_stays_optional() {
    let (_dir, store) = store().await;
    let mut f = field("P", "DR1");
    f.kind = RecordKind::Drop;
    f.status = Some("Installed".to_string());
    store.upsert_field_records(&[f.clone(), field("P", "X")]).await.unwrap();

    let fields = store.query_field_records("P").await.unwrap();
    assert_eq!(fields[0], f);
    assert_eq!(fields[1].status, None);
}

#[tokio::test]
async fn test_match_results_upsert_by_pair() {
    let (_dir, store) = store().await;
    let mut r = result("P", "A", "B", MatchType::Normalized);
    store.upsert_match_results(&[r.clone()], Some(Uuid::new_v4())).await.unwrap();

    r.confidence_score = 0.7;
    r.distance_meters = None;
    store.upsert_match_results(&[r.clone()], None).await.unwrap();

    let results = store.query_match_results(Some("P")).await.unwrap();
    assert_eq!(results, vec![r]);
}

#[tokio::test]
async fn test_prune_keeps_manual_and_listed_results() {
    let (_dir, store) = store().await;
    let keep = result("P", "A", "A1", MatchType::Exact);
    let stale = result("P", "B", "B1", MatchType::Exact);
    let manual = result("P", "C", "C9", MatchType::Manual);
    let other = result("Q", "Z", "Z1", MatchType::Exact);
    store
        .upsert_match_results(&[keep.clone(), stale, manual.clone(), other.clone()], None)
        .await
        .unwrap();

    let pruned = store
        .prune_match_results("P", std::slice::from_ref(&keep))
        .await
        .unwrap();
    assert_eq!(pruned, 1);

    assert_eq!(store.query_match_results(Some("P")).await.unwrap(), vec![keep, manual]);
    assert_eq!(store.query_match_results(Some("Q")).await.unwrap(), vec![other]);
}

#[tokio::test]
async fn test_projects_keep_name_and_list_known_ids() {
    let (_dir, store) = store().await;
    store
        .upsert_project(&Project {
            project_id: "LAW".to_string(),
            name: Some("Lawley".to_string()),
        })
        .await
        .unwrap();
    store
        .upsert_project(&Project {
            project_id: "LAW".to_string(),
            name: None,
        })
        .await
        .unwrap();
    store.upsert_field_records(&[field("MOH", "M1")]).await.unwrap();

    let projects = store.list_projects().await.unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name.as_deref(), Some("Lawley"));

    assert_eq!(store.known_project_ids().await.unwrap(), ["LAW", "MOH"]);
}

#[tokio::test]
async fn test_runs_list_newest_first() {
    let (_dir, store) = store().await;
    let now = Utc::now();
    let older = ReconciliationRun {
        run_id: Uuid::new_v4(),
        project_id: "P".to_string(),
        state: RunState::Completed,
        started_at: now - Duration::minutes(10),
        ended_at: now - Duration::minutes(9),
        designs_processed: 4,
        results_written: 3,
        results_pruned: 0,
        errors: 0,
    };
    let newer = ReconciliationRun {
        run_id: Uuid::new_v4(),
        state: RunState::CompletedWithErrors,
        started_at: now,
        ended_at: now,
        errors: 2,
        ..older.clone()
    };
    store.record_run(&older).await.unwrap();
    store.record_run(&newer).await.unwrap();

    let runs = store.list_runs("P").await.unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, newer.run_id);
    assert_eq!(runs[0].state, RunState::CompletedWithErrors);
    assert_eq!(runs[0].errors, 2);
    assert_eq!(runs[1].run_id, older.run_id);
    assert_eq!(runs[1].designs_processed, 4);
    assert!(store.list_runs("other").await.unwrap().is_empty());
}
