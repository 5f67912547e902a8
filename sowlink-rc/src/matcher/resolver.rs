//! Strategy resolution
//!
//! Strategies run in priority order and the first one producing candidates
//! wins. Its candidates are then either reduced to a single best candidate or
//! emitted as a whole set, depending on the strategy's selection rule.

use super::strategies::{FieldIndex, MatchCandidate, StrategyFn};
use sowlink_common::{DesignRecord, MatchResult, MatchType, ReconciliationConfig};
use std::cmp::Ordering;

/// What the resolver keeps from a strategy's candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Highest ranked candidate only
    Best,
    /// Every candidate (ambiguous sets flagged for review)
    All,
}

/// A strategy in the ordered list
#[derive(Clone, Copy)]
pub struct MatchStrategy {
    pub match_type: MatchType,
    pub run: StrategyFn,
    pub selection: Selection,
}

impl std::fmt::Debug for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchStrategy")
            .field("match_type", &self.match_type)
            .field("selection", &self.selection)
            .finish()
    }
}

/// Candidate ranking: confidence descending, then distance ascending
/// (unknown distance last), then field label ascending
pub fn rank(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.confidence_score
        .total_cmp(&a.confidence_score)
        .then_with(|| match (a.distance_meters, b.distance_meters) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.field_label.cmp(&b.field_label))
}

/// Run the strategies for one design record
pub fn resolve(
    design: &DesignRecord,
    strategies: &[MatchStrategy],
    fields: &FieldIndex,
    config: &ReconciliationConfig,
) -> Vec<MatchResult> {
    for strategy in strategies {
        let mut candidates = (strategy.run)(design, fields, config);
        if candidates.is_empty() {
            continue;
        }

        candidates.sort_by(rank);
        candidates.dedup_by(|a, b| a.field_label == b.field_label);
        if strategy.selection == Selection::Best {
            candidates.truncate(1);
        }

        return candidates
            .into_iter()
            .map(|c| MatchResult {
                project_id: design.project_id.clone(),
                design_label: design.label.clone(),
                field_label: c.field_label,
                match_type: c.match_type,
                confidence_score: c.confidence_score,
                distance_meters: c.distance_meters,
            })
            .collect();
    }
    Vec::new()
}
