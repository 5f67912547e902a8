//! Database models

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Mean Earth radius (IUGG) in metres
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Free-form passthrough columns carried alongside a record
pub type Attributes = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    #[default]
    Pole,
    Drop,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Pole => "pole",
            RecordKind::Drop => "drop",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pole" => Ok(RecordKind::Pole),
            "drop" => Ok(RecordKind::Drop),
            other => Err(Error::InvalidInput(format!("unknown record kind: {}", other))),
        }
    }
}

/// How a design record was paired with a field record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Exact,
    Normalized,
    NumericSuffix,
    Proximity,
    Manual,
}

impl MatchType {
    pub const ALL: [MatchType; 5] = [
        MatchType::Exact,
        MatchType::Normalized,
        MatchType::NumericSuffix,
        MatchType::Proximity,
        MatchType::Manual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Normalized => "normalized",
            MatchType::NumericSuffix => "numeric_suffix",
            MatchType::Proximity => "proximity",
            MatchType::Manual => "manual",
        }
    }

    /// Produced by the matcher (as opposed to recorded by a person)
    pub fn is_automatic(&self) -> bool {
        !matches!(self, MatchType::Manual)
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MatchType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown match type: {}", s)))
    }
}

/// A validated WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Both values present, finite and within WGS84 range; otherwise `None`
    pub fn from_parts(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        let (lat, lon) = (latitude?, longitude?);
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self {
            latitude: lat,
            longitude: lon,
        })
    }

    /// Per-axis difference strictly under `epsilon_deg` degrees
    pub fn agrees_with(&self, other: &Coordinates, epsilon_deg: f64) -> bool {
        (self.latitude - other.latitude).abs() < epsilon_deg
            && (self.longitude - other.longitude).abs() < epsilon_deg
    }

    /// Great-circle distance in metres (haversine)
    pub fn distance_meters(&self, other: &Coordinates) -> f64 {
        let phi1 = self.latitude.to_radians();
        let phi2 = other.latitude.to_radians();
        let d_phi = (other.latitude - self.latitude).to_radians();
        let d_lambda = (other.longitude - self.longitude).to_radians();

        let a = (d_phi / 2.0).sin().powi(2)
            + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,
    pub name: Option<String>,
}

impl Project {
    /// Name for display and sorting; falls back to the id
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.project_id)
    }
}

/// As-designed pole or drop from a SOW spreadsheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesignRecord {
    pub project_id: String,
    pub label: String,
    #[serde(default)]
    pub kind: RecordKind,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl DesignRecord {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }
}

/// As-built observation from the Field Registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub project_id: String,
    pub label: String,
    #[serde(default)]
    pub kind: RecordKind,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<String>,
    #[serde(default)]
    pub attributes: Attributes,
}

impl FieldRecord {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::from_parts(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub project_id: String,
    pub design_label: String,
    pub field_label: String,
    pub match_type: MatchType,
    pub confidence_score: f64,
    pub distance_meters: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Completed,
    CompletedWithErrors,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Completed => "completed",
            RunState::CompletedWithErrors => "completed_with_errors",
        }
    }
}

/// One reconciliation pass over a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRun {
    pub run_id: Uuid,
    pub project_id: String,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub designs_processed: u64,
    pub results_written: u64,
    pub results_pruned: u64,
    pub errors: u64,
}
