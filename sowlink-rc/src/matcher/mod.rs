//! Candidate matching
//!
//! Pairs each design record of a project with field records using an ordered
//! list of strategies:
//!
//! 1. exact label
//! 2. normalized label, scored on coordinate agreement
//! 3. numeric suffix (ambiguous sets are emitted whole at review confidence)
//! 4. proximity, only when enabled in configuration
//!
//! A design record no strategy matches produces no result; the reporter
//! treats it as unmapped. Output is sorted by design label then field label,
//! so identical input always yields identical output regardless of order.

pub mod resolver;
pub mod strategies;

pub use resolver::{MatchStrategy, Selection};
pub use strategies::{FieldIndex, MatchCandidate};

use sowlink_common::{DesignRecord, FieldRecord, MatchResult, MatchType, ReconciliationConfig};
use std::collections::BTreeMap;
use tracing::debug;

/// Runs the strategy list over a project's records
#[derive(Debug, Clone)]
pub struct CandidateMatcher {
    config: ReconciliationConfig,
    strategies: Vec<MatchStrategy>,
}

impl CandidateMatcher {
    pub fn new(config: ReconciliationConfig) -> Self {
        let mut list = vec![
            MatchStrategy {
                match_type: MatchType::Exact,
                run: strategies::exact,
                selection: Selection::Best,
            },
            MatchStrategy {
                match_type: MatchType::Normalized,
                run: strategies::normalized,
                selection: Selection::Best,
            },
            MatchStrategy {
                match_type: MatchType::NumericSuffix,
                run: strategies::numeric_suffix,
                selection: Selection::All,
            },
        ];
        if config.proximity.enabled {
            list.push(MatchStrategy {
                match_type: MatchType::Proximity,
                run: strategies::proximity,
                selection: Selection::Best,
            });
        }
        Self {
            config,
            strategies: list,
        }
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[MatchStrategy] {
        &self.strategies
    }

    /// Match every design record against the field records
    ///
    /// Duplicate design labels collapse to the last occurrence.
    pub fn match_records(&self, designs: &[DesignRecord], fields: &[FieldRecord]) -> Vec<MatchResult> {
        let index = FieldIndex::build(fields);

        let mut unique: BTreeMap<&str, &DesignRecord> = BTreeMap::new();
        for design in designs {
            unique.insert(design.label.as_str(), design);
        }

        let mut results = Vec::new();
        for design in unique.into_values() {
            let found = self.match_design(design, &index);
            if found.is_empty() {
                debug!(design = %design.label, "No match");
            }
            results.extend(found);
        }

        results.sort_by(|a, b| {
            a.design_label
                .cmp(&b.design_label)
                .then_with(|| a.field_label.cmp(&b.field_label))
        });
        results
    }

    /// Match one design record against a prepared index
    pub fn match_design(&self, design: &DesignRecord, index: &FieldIndex) -> Vec<MatchResult> {
        let found = resolver::resolve(design, &self.strategies, index, &self.config);
        for result in &found {
            debug!(
                design = %result.design_label,
                field = %result.field_label,
                match_type = %result.match_type,
                confidence = result.confidence_score,
                "Matched"
            );
        }
        found
    }
}
