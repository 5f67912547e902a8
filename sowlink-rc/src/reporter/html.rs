//! Printable field verification report
//!
//! A self-contained HTML page: overall summary cards, then per project a
//! coverage line and tables for high-confidence matches (sign-off), low
//! confidence matches (action required) and unmapped design records,
//! followed by the verification checklist. All record text is escaped.

use super::{ProjectReport, ReconciliationReport};
use sowlink_common::MatchResult;
use std::fmt::Write;

const STYLE: &str = r#"
    body { font-family: -apple-system, "Segoe UI", Roboto, sans-serif; margin: 20px; background: #f5f5f5; color: #333; }
    .container { max-width: 1200px; margin: 0 auto; background: white; padding: 30px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
    h1 { border-bottom: 3px solid #007bff; padding-bottom: 10px; }
    h2 { margin-top: 30px; border-bottom: 1px solid #ddd; padding-bottom: 5px; }
    .summary-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 16px; margin: 20px 0; }
    .summary-card { background: #f8f9fa; padding: 16px; border-radius: 8px; border-left: 4px solid #007bff; }
    .summary-card .value { font-size: 28px; font-weight: bold; margin: 4px 0; }
    table { width: 100%; border-collapse: collapse; margin: 16px 0; }
    th { background: #007bff; color: white; padding: 10px; text-align: left; }
    td { padding: 8px 10px; border-bottom: 1px solid #ddd; }
    .confidence-high { background: #d4edda; color: #155724; padding: 2px 8px; border-radius: 4px; font-weight: 600; }
    .confidence-medium { background: #fff3cd; color: #856404; padding: 2px 8px; border-radius: 4px; font-weight: 600; }
    .confidence-low { background: #f8d7da; color: #721c24; padding: 2px 8px; border-radius: 4px; font-weight: 600; }
    .match-type { display: inline-block; padding: 4px 8px; border-radius: 4px; font-size: 12px; font-weight: 600; text-transform: uppercase; background: #6c757d; color: white; }
    .action-required { background: #fff5f5; border-left: 4px solid #dc3545; padding: 15px; margin: 20px 0; border-radius: 4px; }
    .verification-needed { background: #fffbf0; border-left: 4px solid #ffc107; padding: 15px; margin: 20px 0; border-radius: 4px; }
    .footer { margin-top: 40px; padding-top: 20px; border-top: 1px solid #ddd; text-align: center; color: #666; font-size: 14px; }
    @media print { .container { box-shadow: none; } table, .summary-card { break-inside: avoid; } }
"#;

const CHECKLIST: [&str; 6] = [
    "Physical label matches the records",
    "GPS coordinates are accurate (within 10 meters)",
    "Status matches field condition",
    "Associated drops are correctly linked",
    "Any damage or maintenance issues noted",
    "Photos taken for documentation",
];

/// Escape text for use in element content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render_html(report: &ReconciliationReport) -> String {
    let mut html = String::new();
    // Writing into a String cannot fail
    let _ = write_document(&mut html, report);
    html
}

fn write_document(html: &mut String, report: &ReconciliationReport) -> std::fmt::Result {
    writeln!(html, "<!DOCTYPE html>")?;
    writeln!(html, "<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">")?;
    writeln!(html, "<title>Field Verification Report</title>")?;
    writeln!(html, "<style>{}</style>\n</head>\n<body>\n<div class=\"container\">", STYLE)?;
    writeln!(html, "<h1>Field Verification Report</h1>")?;
    writeln!(
        html,
        "<p><strong>Generated:</strong> {}</p>",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    )?;
    writeln!(
        html,
        "<p><strong>Purpose:</strong> Verify design-to-field mappings against what is installed</p>"
    )?;

    write_summary(html, report)?;

    for project in &report.projects {
        write_project(html, project, report)?;
    }

    writeln!(html, "<h2>Field Verification Checklist</h2>")?;
    writeln!(html, "<div class=\"verification-needed\">")?;
    writeln!(html, "<p><strong>For each mapping, field teams should verify:</strong></p>\n<ol>")?;
    for item in CHECKLIST {
        writeln!(html, "<li>&#9744; {}</li>", item)?;
    }
    writeln!(html, "</ol>\n</div>")?;

    writeln!(html, "<div class=\"footer\"><p>Generated by sowlink</p></div>")?;
    writeln!(html, "</div>\n</body>\n</html>")?;
    Ok(())
}

fn write_summary(html: &mut String, report: &ReconciliationReport) -> std::fmt::Result {
    let s = &report.summary;
    let cards = [
        ("Projects", s.project_count.to_string(), format!("{} with mappings", s.projects_with_mappings)),
        ("Total Mappings", s.total_mappings.to_string(), "Design/field pairs found".to_string()),
        ("Average Confidence", format!("{:.0}%", s.average_confidence * 100.0), "Across all mappings".to_string()),
        ("Design Records Mapped", s.distinct_design_labels.to_string(), format!("{} field records used", s.distinct_field_labels)),
    ];

    writeln!(html, "<div class=\"summary-grid\">")?;
    for (title, value, subtitle) in cards {
        writeln!(
            html,
            "<div class=\"summary-card\"><h3>{}</h3><p class=\"value\">{}</p><p>{}</p></div>",
            title, value, subtitle
        )?;
    }
    writeln!(html, "</div>")?;

    if !s.by_match_type.is_empty() {
        writeln!(html, "<table>\n<thead><tr><th>Match Type</th><th>Count</th><th>Average Confidence</th></tr></thead>\n<tbody>")?;
        for t in &s.by_match_type {
            writeln!(
                html,
                "<tr><td><span class=\"match-type\">{}</span></td><td>{}</td><td>{:.0}%</td></tr>",
                t.match_type,
                t.count,
                t.average_confidence * 100.0
            )?;
        }
        writeln!(html, "</tbody>\n</table>")?;
    }
    Ok(())
}

fn write_project(html: &mut String, project: &ProjectReport, report: &ReconciliationReport) -> std::fmt::Result {
    writeln!(html, "<h2>{}</h2>", escape_html(&project.project_name))?;
    writeln!(html, "<p><strong>Project ID:</strong> {}</p>", escape_html(&project.project_id))?;
    writeln!(html, "<p><strong>Mapping Coverage:</strong> {}</p>", project.coverage_string())?;
    if !project.medium.is_empty() {
        writeln!(
            html,
            "<p><strong>Medium confidence:</strong> {} mappings (spot check)</p>",
            project.medium.len()
        )?;
    }

    if !project.high.is_empty() {
        writeln!(
            html,
            "<div class=\"verification-needed\"><strong>High Confidence Matches - Please Verify:</strong>\
             <p>These records were matched automatically with high confidence. Confirm the mapping in the field.</p></div>"
        )?;
        write_match_table(html, &project.high, "Field Verification", "&#9744; Verified &#9744; Incorrect", report)?;
    }

    if !project.low.is_empty() {
        writeln!(
            html,
            "<div class=\"action-required\"><strong>Low Confidence Matches - Action Required:</strong>\
             <p>These matches need field verification to confirm or correct the mapping.</p></div>"
        )?;
        write_match_table(
            html,
            &project.low,
            "Field Action",
            "&#9744; Confirm &#9744; Find Correct &#9744; Not Found",
            report,
        )?;
    }

    if !project.unmapped.is_empty() {
        writeln!(
            html,
            "<div class=\"action-required\"><strong>Unmapped Design Records - Field Search Required:</strong>\
             <p>No field record could be matched. Locate and map these in the field.</p></div>"
        )?;
        writeln!(
            html,
            "<table>\n<thead><tr><th>Design Label</th><th>Kind</th><th>GPS Coordinates</th><th>Status</th><th>Field Notes</th></tr></thead>\n<tbody>"
        )?;
        for design in &project.unmapped {
            let gps = match (design.latitude, design.longitude) {
                (Some(lat), Some(lon)) => format!("{:.6}, {:.6}", lat, lon),
                _ => "No GPS".to_string(),
            };
            let status = if design.status.trim().is_empty() {
                "Unknown"
            } else {
                design.status.as_str()
            };
            writeln!(
                html,
                "<tr><td><strong>{}</strong></td><td>{}</td><td>{}</td><td>{}</td><td>_______________________</td></tr>",
                escape_html(&design.label),
                design.kind,
                gps,
                escape_html(status)
            )?;
        }
        writeln!(html, "</tbody>\n</table>")?;
    }
    Ok(())
}

fn write_match_table(
    html: &mut String,
    results: &[MatchResult],
    action_header: &str,
    action_cell: &str,
    report: &ReconciliationReport,
) -> std::fmt::Result {
    writeln!(
        html,
        "<table>\n<thead><tr><th>Design Label</th><th>Field Label</th><th>Match Type</th><th>Confidence</th><th>Distance</th><th>{}</th></tr></thead>\n<tbody>",
        action_header
    )?;
    for result in results {
        let class = match report.thresholds.band(result.confidence_score) {
            super::ConfidenceBand::High => "confidence-high",
            super::ConfidenceBand::Medium => "confidence-medium",
            super::ConfidenceBand::Low => "confidence-low",
        };
        let distance = result
            .distance_meters
            .map(|d| format!("{:.1}m", d))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            html,
            "<tr><td><strong>{}</strong></td><td>{}</td><td><span class=\"match-type\">{}</span></td><td><span class=\"{}\">{:.0}%</span></td><td>{}</td><td>{}</td></tr>",
            escape_html(&result.design_label),
            escape_html(&result.field_label),
            result.match_type,
            class,
            result.confidence_score * 100.0,
            distance,
            action_cell
        )?;
    }
    writeln!(html, "</tbody>\n</table>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{build_report, ReportThresholds};
    use chrono::{TimeZone, Utc};
    use sowlink_common::{DesignRecord, MatchType, Project, RecordKind};

    fn sample() -> ReconciliationReport {
        let projects = [Project {
            project_id: "LAW".to_string(),
            name: Some("Lawley <North>".to_string()),
        }];
        let designs = [
            DesignRecord {
                project_id: "LAW".to_string(),
                label: "LAW.P.A001".to_string(),
                kind: RecordKind::Pole,
                latitude: Some(-26.1),
                longitude: Some(28.2),
                status: "pending".to_string(),
                attributes: Default::default(),
            },
            DesignRecord {
                project_id: "LAW".to_string(),
                label: "LAW.P.A002".to_string(),
                kind: RecordKind::Pole,
                latitude: None,
                longitude: None,
                status: String::new(),
                attributes: Default::default(),
            },
        ];
        let results = [MatchResult {
            project_id: "LAW".to_string(),
            design_label: "LAW.P.A001".to_string(),
            field_label: "LAW.P.001".to_string(),
            match_type: MatchType::Normalized,
            confidence_score: 0.95,
            distance_meters: Some(6.9),
        }];
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        build_report(&projects, &designs, &results, ReportThresholds::default(), at)
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<a href=\"x\">&'"), "&lt;a href=&quot;x&quot;&gt;&amp;&#39;");
    }

    #[test]
    fn renders_sections() {
        let html = render_html(&sample());
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Lawley &lt;North&gt;"));
        assert!(!html.contains("Lawley <North>"));
        assert!(html.contains("1 of 2 design records mapped (50.0%)"));
        assert!(html.contains("High Confidence Matches - Please Verify"));
        assert!(html.contains("6.9m"));
        assert!(html.contains("No GPS"));
        assert!(html.contains("Unknown"));
        assert!(html.contains("Field Verification Checklist"));
        assert!(!html.contains("Low Confidence Matches"));
    }

    #[test]
    fn empty_report_still_renders() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let report = build_report(&[], &[], &[], ReportThresholds::default(), at);
        let html = render_html(&report);
        assert!(html.contains("2026-03-01 09:30 UTC"));
        assert!(html.ends_with("</html>\n"));
    }
}
