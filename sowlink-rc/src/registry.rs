//! Field Registry client
//!
//! Pulls as-built installation records for a site code page by page. Each
//! registry record describes one installation and may name a pole, a drop
//! (`DR<digits>`), or both; [`to_field_records`] turns them into field
//! records of the matching kind.

use crate::ingest::parse_coordinate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use sowlink_common::config::RegistryConfig;
use sowlink_common::db::models::Attributes;
use sowlink_common::{FieldRecord, RecordKind};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

static DROP_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^DR[0-9]+$").expect("drop label pattern is valid"));

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One installation as the registry reports it
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryRecord {
    #[serde(default)]
    pub prop_id: Value,
    #[serde(default)]
    pub drp: Option<String>,
    #[serde(default)]
    pub pole: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Value,
    #[serde(default)]
    pub longitude: Value,
}

/// One page of search results
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryPage {
    pub success: bool,
    #[serde(default)]
    pub result: Vec<RegistryRecord>,
    #[serde(default)]
    pub total_pages: f64,
    #[serde(default)]
    pub current_page: Option<u64>,
}

pub struct FieldRegistryClient {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    page_size: u32,
}

impl FieldRegistryClient {
    pub fn new(config: &RegistryConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            page_size: config.page_size.max(1),
        }
    }

    /// Fetch one page (1-based) of records matching the site code
    pub async fn fetch_page(&self, site: &str, page: u32) -> Result<RegistryPage, RegistryError> {
        let url = format!("{}/api/apps/app/getattributes", self.base_url);
        let start = (page.saturating_sub(1) as u64) * self.page_size as u64;
        let form = [
            ("action", "get".to_string()),
            ("sort", "prop_id".to_string()),
            ("q", site.to_string()),
            ("page", page.to_string()),
            ("start", start.to_string()),
            ("limit", self.page_size.to_string()),
        ];

        debug!(url = %url, site, page, "requesting registry page");
        let mut request = self.client.post(&url).form(&form);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RegistryError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch every page for a site, keeping records whose `site` matches
    ///
    /// Stops at the reported last page, at `max_pages`, or when the registry
    /// answers with `success: false`.
    pub async fn fetch_site(&self, site: &str, max_pages: Option<u32>) -> Result<Vec<RegistryRecord>, RegistryError> {
        let target = site.trim().to_uppercase();
        let mut records = Vec::new();
        let mut page = 1;

        loop {
            let result = self.fetch_page(&target, page).await?;
            if !result.success {
                warn!(site = %target, page, "registry reported an unsuccessful search, stopping");
                break;
            }

            let total_pages = result.total_pages.ceil().max(1.0) as u32;
            records.extend(result.result.into_iter().filter(|r| {
                r.site
                    .as_deref()
                    .map_or(false, |s| s.trim().eq_ignore_ascii_case(&target))
            }));
            info!(site = %target, page, total_pages, records = records.len(), "fetched registry page");

            if page >= total_pages || max_pages.map_or(false, |max| page >= max) {
                break;
            }
            page += 1;
        }

        Ok(records)
    }
}

/// Convert registry records into pole and drop field records
///
/// The first occurrence of a label wins: several drops share one pole, and
/// the registry may repeat an installation across pages. Drop labels must
/// look like `DR<digits>`.
pub fn to_field_records(project_id: &str, records: &[RegistryRecord]) -> Vec<FieldRecord> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for record in records {
        let latitude = parse_coordinate(&record.latitude);
        let longitude = parse_coordinate(&record.longitude);
        let pole = clean(record.pole.as_deref());
        let drop = clean(record.drp.as_deref()).filter(|d| DROP_LABEL.is_match(d));

        if let Some(label) = &pole {
            if seen.insert(label.clone()) {
                let mut attributes = Attributes::new();
                insert_text(&mut attributes, "site", record.site.as_deref());
                out.push(FieldRecord {
                    project_id: project_id.to_string(),
                    label: label.clone(),
                    kind: RecordKind::Pole,
                    latitude,
                    longitude,
                    status: clean(record.status.as_deref()),
                    attributes,
                });
            }
        }

        if let Some(label) = drop {
            if seen.insert(label.clone()) {
                let mut attributes = Attributes::new();
                if !record.prop_id.is_null() {
                    attributes.insert("prop_id".to_string(), record.prop_id.clone());
                }
                insert_text(&mut attributes, "address", record.address.as_deref());
                insert_text(&mut attributes, "pole", pole.as_deref());
                insert_text(&mut attributes, "site", record.site.as_deref());
                out.push(FieldRecord {
                    project_id: project_id.to_string(),
                    label,
                    kind: RecordKind::Drop,
                    latitude,
                    longitude,
                    status: clean(record.status.as_deref()),
                    attributes,
                });
            }
        }
    }
    out
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn insert_text(attributes: &mut Attributes, key: &str, value: Option<&str>) {
    if let Some(v) = clean(value) {
        attributes.insert(key.to_string(), Value::String(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> RegistryRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn page_parses_mixed_coordinate_types() {
        let page: RegistryPage = serde_json::from_value(json!({
            "success": true,
            "result": [
                {"prop_id": 1, "drp": "DR1", "pole": "LAW.P.A1", "site": "LAW", "latitude": "-26.1", "longitude": 28.0},
                {"prop_id": "2", "drp": null, "pole": null, "site": "LAW", "latitude": null}
            ],
            "total_pages": 2.0,
            "current_page": 1
        }))
        .unwrap();

        assert_eq!(page.result.len(), 2);
        assert_eq!(parse_coordinate(&page.result[0].latitude), Some(-26.1));
        assert_eq!(parse_coordinate(&page.result[1].latitude), None);
    }

    #[test]
    fn records_yield_poles_and_drops() {
        let records = [
            record(json!({"prop_id": 10, "drp": "DR100", "pole": "LAW.P.A1", "site": "LAW", "address": "1 Main Rd", "status": "Installed", "latitude": -26.1, "longitude": 28.1})),
            record(json!({"prop_id": 11, "drp": "DR101", "pole": "LAW.P.A1", "site": "LAW", "latitude": -26.2, "longitude": 28.2})),
            record(json!({"prop_id": 12, "drp": "pending", "pole": " ", "site": "LAW"})),
        ];

        let fields = to_field_records("LAW", &records);
        let labels: Vec<_> = fields.iter().map(|f| (f.label.as_str(), f.kind)).collect();
        assert_eq!(
            labels,
            [
                ("LAW.P.A1", RecordKind::Pole),
                ("DR100", RecordKind::Drop),
                ("DR101", RecordKind::Drop)
            ]
        );

        let pole = &fields[0];
        assert_eq!(pole.latitude, Some(-26.1));
        assert_eq!(pole.status.as_deref(), Some("Installed"));

        let drop = &fields[1];
        assert_eq!(drop.attributes.get("prop_id"), Some(&json!(10)));
        assert_eq!(drop.attributes.get("address"), Some(&json!("1 Main Rd")));
        assert_eq!(drop.attributes.get("pole"), Some(&json!("LAW.P.A1")));
    }
}
