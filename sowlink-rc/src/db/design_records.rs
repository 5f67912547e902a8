//! Design record persistence

use crate::normalizer::normalize_label;
use sowlink_common::{DesignRecord, Result};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

/// Insert or update design records keyed by `(project_id, label)` in one transaction
pub async fn upsert_design_records(pool: &SqlitePool, records: &[DesignRecord]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    for record in records {
        upsert_design_record(&mut *tx, record).await?;
    }
    tx.commit().await?;
    Ok(records.len() as u64)
}

async fn upsert_design_record(conn: &mut SqliteConnection, record: &DesignRecord) -> Result<()> {
    let id = normalize_label(&record.label);
    let attributes = serde_json::to_string(&record.attributes)?;

    sqlx::query(
        r#"
        INSERT INTO design_records (
            project_id, label, kind, label_normalized, label_suffix,
            latitude, longitude, status, attributes, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
        ON CONFLICT(project_id, label) DO UPDATE SET
            kind = excluded.kind,
            label_normalized = excluded.label_normalized,
            label_suffix = excluded.label_suffix,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            status = excluded.status,
            attributes = excluded.attributes,
            updated_at = CURRENT_TIMESTAMP
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

/// Design records of one project, or of every project, ordered by project then label
pub async fn query_design_records(pool: &SqlitePool, project_id: Option<&str>) -> Result<Vec<DesignRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT project_id, label, kind, latitude, longitude, status, attributes
        FROM design_records
        WHERE ?1 IS NULL OR project_id = ?1
        ORDER BY project_id, label
        "#,
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(design_from_row).collect()
}

fn design_from_row(row: &SqliteRow) -> Result<DesignRecord> {
    let kind: String = row.get("kind");
    let attributes: String = row.get("attributes");

    Ok(DesignRecord {
        project_id: row.get("project_id"),
        label: row.get("label"),
        kind: kind.parse()?,
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        status: row.get("status"),
        attributes: serde_json::from_str(&attributes)?,
    })
}
