//! Spreadsheet ingestion
//!
//! Rows arrive as JSON objects (the shape spreadsheet converters emit). The
//! [`RowMapper`] resolves logical fields through the [`ColumnAliases`] table
//! and produces canonical design or field records. Malformed rows are skipped
//! with a [`RowSkip`] reason and counted; they never abort an import.

pub mod column_aliases;

pub use column_aliases::{ColumnAliases, LogicalField};

use crate::normalizer::NormalizationStats;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sowlink_common::db::models::Attributes;
use sowlink_common::{DesignRecord, Error, FieldRecord, RecordKind, Result};
use std::path::Path;
use thiserror::Error as ThisError;

/// Status given to design records without one
pub const DEFAULT_DESIGN_STATUS: &str = "pending";

/// Why a row was not imported
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RowSkip {
    #[error("row is not an object")]
    NotAnObject,

    #[error("row has no label")]
    MissingLabel,
}

/// Maps raw rows to canonical records
#[derive(Debug, Clone)]
pub struct RowMapper {
    aliases: ColumnAliases,
    kind: RecordKind,
}

impl RowMapper {
    pub fn new(aliases: ColumnAliases, kind: RecordKind) -> Self {
        Self { aliases, kind }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn map_design_row(&self, project_id: &str, row: &Value) -> std::result::Result<DesignRecord, RowSkip> {
        let fields = self.extract(row)?;
        Ok(DesignRecord {
            project_id: project_id.to_string(),
            label: fields.label,
            kind: self.kind,
            latitude: fields.latitude,
            longitude: fields.longitude,
            status: fields
                .status
                .unwrap_or_else(|| DEFAULT_DESIGN_STATUS.to_string()),
            attributes: fields.attributes,
        })
    }

    pub fn map_field_row(&self, project_id: &str, row: &Value) -> std::result::Result<FieldRecord, RowSkip> {
        let fields = self.extract(row)?;
        Ok(FieldRecord {
            project_id: project_id.to_string(),
            label: fields.label,
            kind: self.kind,
            latitude: fields.latitude,
            longitude: fields.longitude,
            status: fields.status,
            attributes: fields.attributes,
        })
    }

    fn extract(&self, row: &Value) -> std::result::Result<ExtractedFields, RowSkip> {
        let object = row.as_object().ok_or(RowSkip::NotAnObject)?;

        let (label_column, label_value) = self
            .aliases
            .resolve(LogicalField::Label, object)
            .ok_or(RowSkip::MissingLabel)?;
        let label = scalar_text(label_value).ok_or(RowSkip::MissingLabel)?;

        let mut consumed = vec![label_column];

        let mut coordinate = |field: LogicalField| {
            self.aliases.resolve(field, object).map(|(column, value)| {
                consumed.push(column);
                parse_coordinate(value)
            })
        };
        let latitude = coordinate(LogicalField::Latitude).flatten();
        let longitude = coordinate(LogicalField::Longitude).flatten();

        let status = self
            .aliases
            .resolve(LogicalField::Status, object)
            .and_then(|(column, value)| {
                consumed.push(column);
                scalar_text(value)
            });

        Ok(ExtractedFields {
            label,
            latitude,
            longitude,
            status,
            attributes: passthrough(object, &consumed),
        })
    }
}

struct ExtractedFields {
    label: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
    status: Option<String>,
    attributes: Attributes,
}

/// Trimmed text of a string or number cell
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Numeric or numeric-string cell; anything else degrades to absent
pub fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn passthrough(object: &Map<String, Value>, consumed: &[&str]) -> Attributes {
    object
        .iter()
        .filter(|(key, _)| !consumed.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Read a row file: a JSON array of objects
///
/// An unreadable file or a document that is not an array is an error; the
/// individual rows are validated later by the [`RowMapper`].
pub fn read_row_file(path: &Path) -> Result<Vec<Value>> {
    let content = std::fs::read_to_string(path)?;
    parse_rows(&content)
}

pub fn parse_rows(content: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(content)? {
        Value::Array(rows) => Ok(rows),
        _ => Err(Error::InvalidInput(
            "row file must contain a JSON array of objects".to_string(),
        )),
    }
}

/// Counters for one import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    /// Rows read from the source
    pub total: usize,
    /// Records written to the store
    pub imported: usize,
    /// Rows rejected by the mapper
    pub skipped: usize,
    /// Records in batches the store failed to write
    pub errors: usize,
    /// Label normalization breakdown of mapped rows
    pub normalization: NormalizationStats,
}

impl ImportStats {
    pub fn display_string(&self) -> String {
        format!(
            "{} rows: {} imported, {} skipped, {} errors ({})",
            self.total,
            self.imported,
            self.skipped,
            self.errors,
            self.normalization.display_string()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> RowMapper {
        RowMapper::new(ColumnAliases::default(), RecordKind::Pole)
    }

    #[test]
    fn design_row_maps_aliases_and_passthrough() {
        let row = json!({
            "label_1": " LAW.P.A001 ",
            "lat": "-26.3",
            "Longitude": 28.1,
            "zone": 7
        });

        let record = mapper().map_design_row("LAW", &row).unwrap();
        assert_eq!(record.label, "LAW.P.A001");
        assert_eq!(record.latitude, Some(-26.3));
        assert_eq!(record.longitude, Some(28.1));
        assert_eq!(record.status, DEFAULT_DESIGN_STATUS);
        assert_eq!(record.kind, RecordKind::Pole);
        assert_eq!(record.attributes.len(), 1);
        assert_eq!(record.attributes.get("zone"), Some(&json!(7)));
    }

    #[test]
    fn unparsable_coordinate_degrades_to_absent() {
        let row = json!({"label_1": "X.P.1", "lat": "north", "lon": 20.0});
        let record = mapper().map_design_row("P", &row).unwrap();
        assert_eq!(record.latitude, None);
        assert_eq!(record.longitude, Some(20.0));
        assert!(record.coordinates().is_none());
        assert!(!record.attributes.contains_key("lat"));
    }

    #[test]
    fn numeric_label_is_accepted() {
        let row = json!({"pole_number": 1734472});
        let record = mapper().map_field_row("P", &row).unwrap();
        assert_eq!(record.label, "1734472");
        assert_eq!(record.status, None);
    }

    #[test]
    fn missing_label_is_skipped() {
        assert_eq!(
            mapper().map_design_row("P", &json!({"lat": 1.0})),
            Err(RowSkip::MissingLabel)
        );
        assert_eq!(
            mapper().map_design_row("P", &json!({"label_1": "   "})),
            Err(RowSkip::MissingLabel)
        );
        assert_eq!(
            mapper().map_design_row("P", &json!({"label_1": true})),
            Err(RowSkip::MissingLabel)
        );
    }

    #[test]
    fn non_object_row_is_skipped() {
        assert_eq!(
            mapper().map_field_row("P", &json!(["LAW.P.1"])),
            Err(RowSkip::NotAnObject)
        );
    }

    #[test]
    fn status_is_kept_for_field_rows() {
        let row = json!({"label": "D1", "Status": "Installed"});
        let mapper = RowMapper::new(ColumnAliases::default(), RecordKind::Drop);
        let record = mapper.map_field_row("P", &row).unwrap();
        assert_eq!(record.status.as_deref(), Some("Installed"));
        assert_eq!(record.kind, RecordKind::Drop);
    }

    #[test]
    fn row_document_must_be_array() {
        assert_eq!(parse_rows("[{\"label\": \"A\"}]").unwrap().len(), 1);
        assert!(matches!(parse_rows("{}"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_rows("not json"), Err(Error::Json(_))));
    }
}
