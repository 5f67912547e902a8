//! Reconciliation reporting
//!
//! Aggregates match results per project into confidence bands and an
//! unmapped list, plus a flat export for field teams. Everything here is a
//! pure function of the records passed in; rendering to HTML and CSV lives
//! in the submodules.

pub mod csv;
pub mod html;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sowlink_common::{
    DesignRecord, MatchResult, MatchType, Project, ReconciliationConfig, RecordKind,
};
use std::collections::{BTreeMap, BTreeSet};

/// Confidence band boundaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportThresholds {
    /// `confidence >= high` is high
    pub high: f64,
    /// `confidence < low` is low
    pub low: f64,
}

impl ReportThresholds {
    pub fn from_config(config: &ReconciliationConfig) -> Self {
        Self {
            high: config.high_confidence_threshold,
            low: config.low_confidence_threshold,
        }
    }
}

impl Default for ReportThresholds {
    fn default() -> Self {
        Self::from_config(&ReconciliationConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ReportThresholds {
    pub fn band(&self, confidence: f64) -> ConfidenceBand {
        if confidence >= self.high {
            ConfidenceBand::High
        } else if confidence >= self.low {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

/// Design record without any match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmappedDesign {
    pub label: String,
    pub kind: RecordKind,
    /// Present only when both coordinates are valid
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectReport {
    pub project_id: String,
    pub project_name: String,
    pub total_designs: usize,
    pub mapped_designs: usize,
    /// `mapped / total * 100`, zero for an empty project
    pub mapping_rate: f64,
    pub high: Vec<MatchResult>,
    pub medium: Vec<MatchResult>,
    pub low: Vec<MatchResult>,
    pub unmapped: Vec<UnmappedDesign>,
}

impl ProjectReport {
    pub fn total_results(&self) -> usize {
        self.high.len() + self.medium.len() + self.low.len()
    }

    pub fn coverage_string(&self) -> String {
        format!(
            "{} of {} design records mapped ({:.1}%)",
            self.mapped_designs, self.total_designs, self.mapping_rate
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchTypeSummary {
    pub match_type: MatchType,
    pub count: usize,
    pub average_confidence: f64,
}

/// Totals across every project in the report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub project_count: usize,
    pub projects_with_mappings: usize,
    pub total_mappings: usize,
    pub average_confidence: f64,
    pub distinct_design_labels: usize,
    pub distinct_field_labels: usize,
    pub by_match_type: Vec<MatchTypeSummary>,
}

impl ReportSummary {
    pub fn display_string(&self) -> String {
        format!(
            "{} projects, {} mappings, average confidence {:.0}%, {} design labels mapped",
            self.project_count,
            self.total_mappings,
            self.average_confidence * 100.0,
            self.distinct_design_labels
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub generated_at: DateTime<Utc>,
    pub thresholds: ReportThresholds,
    pub summary: ReportSummary,
    pub projects: Vec<ProjectReport>,
}

impl ReconciliationReport {
    pub fn project(&self, project_id: &str) -> Option<&ProjectReport> {
        self.projects.iter().find(|p| p.project_id == project_id)
    }
}

/// One line of the flat export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub project: String,
    pub design_label: String,
    pub field_label: String,
    pub match_type: MatchType,
    pub confidence_score: f64,
    pub distance_meters: Option<f64>,
}

/// Build the report for every project that appears in any input
///
/// A project is reported when it is registered, has design records, or has
/// match results. Projects are ordered by display name, then id.
pub fn build_report(
    projects: &[Project],
    designs: &[DesignRecord],
    results: &[MatchResult],
    thresholds: ReportThresholds,
    generated_at: DateTime<Utc>,
) -> ReconciliationReport {
    let mut names: BTreeMap<&str, Option<&str>> = BTreeMap::new();
    for project in projects {
        names.insert(&project.project_id, project.name.as_deref());
    }
    for design in designs {
        names.entry(&design.project_id).or_insert(None);
    }
    for result in results {
        names.entry(&result.project_id).or_insert(None);
    }

    let mut project_reports: Vec<ProjectReport> = names
        .into_iter()
        .map(|(id, name)| {
            let display = Project {
                project_id: id.to_string(),
                name: name.map(str::to_string),
            }
            .display_name()
            .to_string();
            let project_designs: Vec<&DesignRecord> =
                designs.iter().filter(|d| d.project_id == id).collect();
            let project_results: Vec<&MatchResult> =
                results.iter().filter(|r| r.project_id == id).collect();
            project_report(id, display, &project_designs, &project_results, thresholds)
        })
        .collect();

    project_reports.sort_by(|a, b| {
        a.project_name
            .cmp(&b.project_name)
            .then_with(|| a.project_id.cmp(&b.project_id))
    });

    ReconciliationReport {
        generated_at,
        thresholds,
        summary: summarize(&project_reports, results),
        projects: project_reports,
    }
}

fn project_report(
    project_id: &str,
    project_name: String,
    designs: &[&DesignRecord],
    results: &[&MatchResult],
    thresholds: ReportThresholds,
) -> ProjectReport {
    let mut by_label: BTreeMap<&str, &DesignRecord> = BTreeMap::new();
    for design in designs {
        by_label.insert(&design.label, *design);
    }
    let matched: BTreeSet<&str> = results.iter().map(|r| r.design_label.as_str()).collect();

    let total_designs = by_label.len();
    let mapped_designs = by_label.keys().filter(|l| matched.contains(*l)).count();
    let mapping_rate = if total_designs == 0 {
        0.0
    } else {
        mapped_designs as f64 / total_designs as f64 * 100.0
    };

    let mut high = Vec::new();
    let mut medium = Vec::new();
    let mut low = Vec::new();
    for result in results {
        let band = match thresholds.band(result.confidence_score) {
            ConfidenceBand::High => &mut high,
            ConfidenceBand::Medium => &mut medium,
            ConfidenceBand::Low => &mut low,
        };
        band.push((*result).clone());
    }
    high.sort_by(by_confidence_desc);
    medium.sort_by(by_confidence_desc);
    low.sort_by(|a, b| {
        a.confidence_score
            .total_cmp(&b.confidence_score)
            .then_with(|| by_labels(a, b))
    });

    let unmapped = by_label
        .values()
        .filter(|d| !matched.contains(d.label.as_str()))
        .map(|d| {
            let coords = d.coordinates();
            UnmappedDesign {
                label: d.label.clone(),
                kind: d.kind,
                latitude: coords.map(|c| c.latitude),
                longitude: coords.map(|c| c.longitude),
                status: d.status.clone(),
            }
        })
        .collect();

    ProjectReport {
        project_id: project_id.to_string(),
        project_name,
        total_designs,
        mapped_designs,
        mapping_rate,
        high,
        medium,
        low,
        unmapped,
    }
}

fn by_labels(a: &MatchResult, b: &MatchResult) -> std::cmp::Ordering {
    a.design_label
        .cmp(&b.design_label)
        .then_with(|| a.field_label.cmp(&b.field_label))
}

fn by_confidence_desc(a: &MatchResult, b: &MatchResult) -> std::cmp::Ordering {
    b.confidence_score
        .total_cmp(&a.confidence_score)
        .then_with(|| by_labels(a, b))
}

fn summarize(projects: &[ProjectReport], results: &[MatchResult]) -> ReportSummary {
    let reported: BTreeSet<&str> = projects.iter().map(|p| p.project_id.as_str()).collect();
    let results: Vec<&MatchResult> = results
        .iter()
        .filter(|r| reported.contains(r.project_id.as_str()))
        .collect();

    let mut by_type: BTreeMap<MatchType, (usize, f64)> = BTreeMap::new();
    for result in &results {
        let entry = by_type.entry(result.match_type).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += result.confidence_score;
    }

    let total = results.len();
    let confidence_sum: f64 = results.iter().map(|r| r.confidence_score).sum();

    ReportSummary {
        project_count: projects.len(),
        projects_with_mappings: projects.iter().filter(|p| p.total_results() > 0).count(),
        total_mappings: total,
        average_confidence: if total == 0 {
            0.0
        } else {
            confidence_sum / total as f64
        },
        distinct_design_labels: results
            .iter()
            .map(|r| (&r.project_id, &r.design_label))
            .collect::<BTreeSet<_>>()
            .len(),
        distinct_field_labels: results
            .iter()
            .map(|r| (&r.project_id, &r.field_label))
            .collect::<BTreeSet<_>>()
            .len(),
        by_match_type: MatchType::ALL
            .into_iter()
            .filter_map(|t| {
                let (count, sum) = by_type.get(&t)?;
                Some(MatchTypeSummary {
                    match_type: t,
                    count: *count,
                    average_confidence: sum / *count as f64,
                })
            })
            .collect(),
    }
}

/// Flatten the report: project order, then descending confidence
pub fn export_rows(report: &ReconciliationReport) -> Vec<ExportRow> {
    let mut rows = Vec::new();
    for project in &report.projects {
        let mut results: Vec<&MatchResult> = project
            .high
            .iter()
            .chain(&project.medium)
            .chain(&project.low)
            .collect();
        results.sort_by(|a, b| by_confidence_desc(a, b));

        rows.extend(results.into_iter().map(|r| ExportRow {
            project: project.project_name.clone(),
            design_label: r.design_label.clone(),
            field_label: r.field_label.clone(),
            match_type: r.match_type,
            confidence_score: r.confidence_score,
            distance_meters: r.distance_meters,
        }));
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 8, 0, 0).unwrap()
    }

    fn design(project: &str, label: &str) -> DesignRecord {
        DesignRecord {
            project_id: project.to_string(),
            label: label.to_string(),
            kind: RecordKind::Pole,
            latitude: None,
            longitude: None,
            status: "pending".to_string(),
            attributes: Default::default(),
        }
    }

    fn result(project: &str, design: &str, field: &str, confidence: f64) -> MatchResult {
        MatchResult {
            project_id: project.to_string(),
            design_label: design.to_string(),
            field_label: field.to_string(),
            match_type: MatchType::Normalized,
            confidence_score: confidence,
            distance_meters: None,
        }
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let report = build_report(&[], &[], &[], ReportThresholds::default(), at());
        assert!(report.projects.is_empty());
        assert_eq!(report.summary.total_mappings, 0);
        assert_eq!(report.summary.average_confidence, 0.0);
        assert!(export_rows(&report).is_empty());
    }

    #[test]
    fn registered_project_without_designs_has_zero_rate() {
        let projects = [Project {
            project_id: "LAW".to_string(),
            name: Some("Lawley".to_string()),
        }];
        let report = build_report(&projects, &[], &[], ReportThresholds::default(), at());
        let law = report.project("LAW").unwrap();
        assert_eq!(law.total_designs, 0);
        assert_eq!(law.mapping_rate, 0.0);
        assert_eq!(law.project_name, "Lawley");
    }

    #[test]
    fn results_are_banded() {
        let designs = [design("P", "a"), design("P", "b"), design("P", "c"), design("P", "d")];
        let results = [
            result("P", "a", "A", 0.95),
            result("P", "b", "B", 0.9),
            result("P", "c", "C", 0.7),
            result("P", "c", "C2", 0.5),
        ];
        let report = build_report(&[], &designs, &results, ReportThresholds::default(), at());
        let p = report.project("P").unwrap();

        assert_eq!(p.high.len(), 2);
        assert_eq!(p.medium.len(), 1);
        assert_eq!(p.low.len(), 1);
        assert_eq!(p.mapped_designs, 3);
        assert_eq!(p.mapping_rate, 75.0);
        assert_eq!(p.unmapped.len(), 1);
        assert_eq!(p.unmapped[0].label, "d");
    }

    #[test]
    fn summary_breaks_down_match_types() {
        let mut exact = result("P", "a", "a", 1.0);
        exact.match_type = MatchType::Exact;
        let results = [exact, result("P", "b", "B", 0.95), result("P", "c", "B", 0.7)];
        let report = build_report(&[], &[], &results, ReportThresholds::default(), at());

        let summary = &report.summary;
        assert_eq!(summary.total_mappings, 3);
        assert_eq!(summary.distinct_design_labels, 3);
        assert_eq!(summary.distinct_field_labels, 2);
        assert_eq!(summary.by_match_type.len(), 2);
        assert_eq!(summary.by_match_type[0].match_type, MatchType::Exact);
        assert_eq!(summary.by_match_type[1].count, 2);
        assert!((summary.by_match_type[1].average_confidence - 0.825).abs() < 1e-9);
    }

    #[test]
    fn export_orders_by_project_name_then_confidence() {
        let projects = [
            Project {
                project_id: "A1".to_string(),
                name: Some("Zebra".to_string()),
            },
            Project {
                project_id: "B2".to_string(),
                name: Some("Alpha".to_string()),
            },
        ];
        let results = [
            result("A1", "z1", "Z1", 0.95),
            result("B2", "b1", "B1", 0.5),
            result("B2", "b2", "B2", 1.0),
        ];
        let report = build_report(&projects, &[], &results, ReportThresholds::default(), at());
        let rows = export_rows(&report);

        let order: Vec<_> = rows.iter().map(|r| (r.project.as_str(), r.design_label.as_str())).collect();
        assert_eq!(order, [("Alpha", "b2"), ("Alpha", "b1"), ("Zebra", "z1")]);
    }

    #[test]
    fn unnamed_projects_sort_by_id() {
        let designs = [design("MOH", "x"), design("LAW", "y")];
        let report = build_report(&[], &designs, &[], ReportThresholds::default(), at());
        let ids: Vec<_> = report.projects.iter().map(|p| p.project_id.as_str()).collect();
        assert_eq!(ids, ["LAW", "MOH"]);
    }
}
