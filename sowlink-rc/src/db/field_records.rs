//! Field record persistence

use crate::normalizer::normalize_label;
use sowlink_common::{FieldRecord, RecordKind, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

/// Insert or update field records keyed by `(project_id, label)` in one transaction
pub async fn upsert_field_records(pool: &SqlitePool, records: &[FieldRecord]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for record in records {
        upsert_field_record(&mut *tx, record).await?;
    }
    tx.commit().await?;
    Ok(records.len() as u64)
}

/// Clear a project's field records and insert the given set, atomically
///
/// With `kind`, only records of that kind are cleared.
pub async fn replace_field_records(
    pool: &SqlitePool,
    project_id: &str,
    kind: Option<RecordKind>,
    records: &[FieldRecord],
) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let removed = sqlx::query("DELETE FROM field_records WHERE project_id = ?1 AND (?2 IS NULL OR kind = ?2)")
        .bind(project_id)
        .bind(kind.map(|k| k.as_str()))
        .execute(&mut *tx)
        .await?
        .rows_affected();

    for record in records {
        upsert_field_record(&mut *tx, record).await?;
    }
    tx.commit().await?;

    tracing::debug!(project = project_id, removed, inserted = records.len(), "Replaced field records");
    Ok(records.len() as u64)
}

async fn upsert_field_record(conn: &mut SqliteConnection, record: &FieldRecord) -> Result<()> {
    let id = normalize_label(&record.label);
    let attributes = serde_json::to_string(&record.attributes)?;

    sqlx::query(
        r#"
        INSERT INTO field_records (
            project_id, label, kind, label_normalized, label_suffix,
            latitude, longitude, status, attributes, synced_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(project_id, label) DO UPDATE SET
            kind = excluded.kind,
            label_normalized = excluded.label_normalized,
            label_suffix = excluded.label_suffix,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            status = excluded.status,
            attributes = excluded.attributes,
            synced_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&record.project_id)
    .bind(&record.label)
    .bind(record.kind.as_str())
    .bind(&id.normalized)
    .bind(id.numeric_suffix.and_then(|s| i64::try_from(s).ok()))
    .bind(record.latitude)
    .bind(record.longitude)
    .bind(&record.status)
    .bind(attributes)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Field records of one project ordered by label
pub async fn query_field_records(pool: &SqlitePool, project_id: &str) -> Result<Vec<FieldRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT project_id, label, kind, latitude, longitude, status, attributes
        FROM field_records
        WHERE project_id = ?
        ORDER BY label
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(field_from_row).collect()
}

fn field_from_row(row: &SqliteRow) -> Result<FieldRecord> {
    let kind: String = row.get("kind");
    let attributes: String = row.get("attributes");

    Ok(FieldRecord {
        project_id: row.get("project_id"),
        label: row.get("label"),
        kind: kind.parse()?,
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        status: row.get("status"),
        attributes: serde_json::from_str(&attributes)?,
    })
}
