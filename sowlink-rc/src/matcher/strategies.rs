//! Match strategies
//!
//! Each strategy is a pure function from one design record and the indexed
//! field records of its project to a list of candidates. Strategies know
//! nothing about each other; ordering and selection live in the resolver.

use crate::normalizer::normalize_label;
use sowlink_common::{Coordinates, DesignRecord, FieldRecord, MatchType, ReconciliationConfig, RecordKind};
use std::collections::BTreeMap;

/// Exact label agreement
pub const EXACT_CONFIDENCE: f64 = 1.0;
/// Normalized or unique suffix agreement with coordinates inside the box
pub const AGREEING_CONFIDENCE: f64 = 0.95;
/// Normalized or unique suffix agreement without coordinate confirmation
pub const UNCONFIRMED_CONFIDENCE: f64 = 0.7;
/// Each member of an ambiguous suffix set
pub const AMBIGUOUS_CONFIDENCE: f64 = 0.5;

/// One proposed pairing for a design record
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub field_label: String,
    pub match_type: MatchType,
    pub confidence_score: f64,
    pub distance_meters: Option<f64>,
}

/// Field record with its derived lookup keys
#[derive(Debug, Clone)]
pub struct IndexedField {
    pub label: String,
    pub kind: RecordKind,
    pub normalized: Option<String>,
    pub numeric_suffix: Option<u64>,
    pub coordinates: Option<Coordinates>,
}

/// Lookup tables over one project's field records
///
/// Labels are unique: when the input repeats a label the later record wins,
/// matching the store's upsert behavior.
#[derive(Debug, Default)]
pub struct FieldIndex {
    fields: Vec<IndexedField>,
    by_label: BTreeMap<(RecordKind, String), usize>,
    by_normalized: BTreeMap<(RecordKind, String), Vec<usize>>,
    by_suffix: BTreeMap<(RecordKind, u64), Vec<usize>>,
}

impl FieldIndex {
    pub fn build(records: &[FieldRecord]) -> Self {
        let mut unique: BTreeMap<&str, &FieldRecord> = BTreeMap::new();
        for record in records {
            unique.insert(record.label.as_str(), record);
        }

        let mut index = FieldIndex::default();
        for record in unique.into_values() {
            let id = normalize_label(&record.label);
            let position = index.fields.len();

            index
                .by_label
                .insert((record.kind, record.label.clone()), position);
            if let Some(normalized) = &id.normalized {
                index
                    .by_normalized
                    .entry((record.kind, normalized.clone()))
                    .or_default()
                    .push(position);
            }
            if let Some(suffix) = id.numeric_suffix {
                index
                    .by_suffix
                    .entry((record.kind, suffix))
                    .or_default()
                    .push(position);
            }

            index.fields.push(IndexedField {
                label: record.label.clone(),
                kind: record.kind,
                normalized: id.normalized,
                numeric_suffix: id.numeric_suffix,
                coordinates: record.coordinates(),
            });
        }
        index
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn by_label(&self, kind: RecordKind, label: &str) -> Option<&IndexedField> {
        self.by_label
            .get(&(kind, label.to_string()))
            .map(|&i| &self.fields[i])
    }

    pub fn by_normalized(&self, kind: RecordKind, normalized: &str) -> impl Iterator<Item = &IndexedField> {
        self.lookup(self.by_normalized.get(&(kind, normalized.to_string())))
    }

    pub fn by_suffix(&self, kind: RecordKind, suffix: u64) -> impl Iterator<Item = &IndexedField> {
        self.lookup(self.by_suffix.get(&(kind, suffix)))
    }

    pub fn of_kind(&self, kind: RecordKind) -> impl Iterator<Item = &IndexedField> {
        self.fields.iter().filter(move |f| f.kind == kind)
    }

    fn lookup<'a>(&'a self, positions: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a IndexedField> {
        positions
            .into_iter()
            .flatten()
            .map(move |&i| &self.fields[i])
    }
}

/// Signature shared by all strategies
pub type StrategyFn = fn(&DesignRecord, &FieldIndex, &ReconciliationConfig) -> Vec<MatchCandidate>;

fn distance(design: Option<Coordinates>, field: &IndexedField) -> Option<f64> {
    Some(design?.distance_meters(&field.coordinates?))
}

fn agreement_confidence(design: Option<Coordinates>, field: &IndexedField, epsilon_deg: f64) -> f64 {
    match (design, field.coordinates) {
        (Some(d), Some(f)) if d.agrees_with(&f, epsilon_deg) => AGREEING_CONFIDENCE,
        _ => UNCONFIRMED_CONFIDENCE,
    }
}

fn candidate(field: &IndexedField, match_type: MatchType, confidence_score: f64, design: Option<Coordinates>) -> MatchCandidate {
    MatchCandidate {
        field_label: field.label.clone(),
        match_type,
        confidence_score,
        distance_meters: distance(design, field),
    }
}

/// Field label equals the design label (case-sensitive)
pub fn exact(design: &DesignRecord, fields: &FieldIndex, _config: &ReconciliationConfig) -> Vec<MatchCandidate> {
    fields
        .by_label(design.kind, &design.label)
        .map(|field| candidate(field, MatchType::Exact, EXACT_CONFIDENCE, design.coordinates()))
        .into_iter()
        .collect()
}

/// Normalized labels are equal; confidence depends on coordinate agreement
pub fn normalized(design: &DesignRecord, fields: &FieldIndex, config: &ReconciliationConfig) -> Vec<MatchCandidate> {
    let Some(key) = normalize_label(&design.label).normalized else {
        return Vec::new();
    };
    let coords = design.coordinates();

    fields
        .by_normalized(design.kind, &key)
        .map(|field| {
            let confidence = agreement_confidence(coords, field, config.coordinate_epsilon_deg);
            candidate(field, MatchType::Normalized, confidence, coords)
        })
        .collect()
}

/// Numeric suffixes are equal
///
/// A unique partner is scored on coordinate agreement. Several partners form
/// an ambiguous set: every member is returned at the review confidence.
pub fn numeric_suffix(design: &DesignRecord, fields: &FieldIndex, config: &ReconciliationConfig) -> Vec<MatchCandidate> {
    let Some(suffix) = normalize_label(&design.label).numeric_suffix else {
        return Vec::new();
    };
    let coords = design.coordinates();
    let partners: Vec<&IndexedField> = fields.by_suffix(design.kind, suffix).collect();

    match partners.as_slice() {
        [] => Vec::new(),
        [only] => {
            let confidence = agreement_confidence(coords, only, config.coordinate_epsilon_deg);
            vec![candidate(only, MatchType::NumericSuffix, confidence, coords)]
        }
        many => many
            .iter()
            .map(|field| candidate(field, MatchType::NumericSuffix, AMBIGUOUS_CONFIDENCE, coords))
            .collect(),
    }
}

/// Field records of the same kind within the configured ground radius
///
/// Only fields inside the degree box on both axes are measured; confidence
/// follows the configured distance bands.
pub fn proximity(design: &DesignRecord, fields: &FieldIndex, config: &ReconciliationConfig) -> Vec<MatchCandidate> {
    let Some(coords) = design.coordinates() else {
        return Vec::new();
    };
    let settings = &config.proximity;

    fields
        .of_kind(design.kind)
        .filter_map(|field| {
            let other = field.coordinates?;
            let in_box = (coords.latitude - other.latitude).abs() < settings.box_deg
                && (coords.longitude - other.longitude).abs() < settings.box_deg;
            if !in_box {
                return None;
            }
            let meters = coords.distance_meters(&other);
            (meters <= settings.radius_m).then(|| MatchCandidate {
                field_label: field.label.clone(),
                match_type: MatchType::Proximity,
                confidence_score: settings.confidence_at(meters),
                distance_meters: Some(meters),
            })
        })
        .collect()
}
