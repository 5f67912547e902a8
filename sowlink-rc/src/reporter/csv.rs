//! CSV export for field teams
//!
//! RFC 4180 quoting: a field containing a comma, quote, CR or LF is wrapped
//! in double quotes with embedded quotes doubled. Lines end with CRLF.

use super::ExportRow;

pub const HEADER: [&str; 7] = [
    "Project",
    "Design Label",
    "Field Label",
    "Match Type",
    "Confidence",
    "Distance (m)",
    "Verification Status",
];

pub fn render_csv(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    push_line(&mut out, HEADER.iter().map(|h| h.to_string()));

    for row in rows {
        push_line(
            &mut out,
            [
                row.project.clone(),
                row.design_label.clone(),
                row.field_label.clone(),
                row.match_type.as_str().to_string(),
                format!("{:.0}%", row.confidence_score * 100.0),
                row.distance_meters
                    .map(|d| format!("{:.1}", d))
                    .unwrap_or_default(),
                // Filled in by the field team
                String::new(),
            ]
            .into_iter(),
        );
    }
    out
}

fn push_line(out: &mut String, fields: impl Iterator<Item = String>) {
    let line: Vec<String> = fields.map(|f| quote(&f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

pub fn quote(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
