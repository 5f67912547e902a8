//! Column alias table
//!
//! Spreadsheet exports name the same column differently (`label_1`,
//! `Pole Number`, `lat`, `Latitude`, ...). The alias table maps each logical
//! field to the source column names tried in order.

use serde_json::{Map, Value};
use sowlink_common::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalField {
    Label,
    Latitude,
    Longitude,
    Status,
}

impl LogicalField {
    pub const ALL: [LogicalField; 4] = [
        LogicalField::Label,
        LogicalField::Latitude,
        LogicalField::Longitude,
        LogicalField::Status,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalField::Label => "label",
            LogicalField::Latitude => "latitude",
            LogicalField::Longitude => "longitude",
            LogicalField::Status => "status",
        }
    }

    fn default_aliases(&self) -> &'static [&'static str] {
        match self {
            LogicalField::Label => &[
                "label",
                "label_1",
                "Label_1",
                "pole_number",
                "Pole Number",
                "drop_number",
                "Drop Number",
            ],
            LogicalField::Latitude => &["lat", "Lat", "latitude", "Latitude"],
            LogicalField::Longitude => &["lon", "Lon", "lng", "longitude", "Longitude"],
            LogicalField::Status => &["status", "Status"],
        }
    }
}

impl fmt::Display for LogicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LogicalField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown logical field in [ingest.aliases]: {}", s)))
    }
}

/// Logical field → ordered source column names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliases {
    table: BTreeMap<LogicalField, Vec<String>>,
}

impl Default for ColumnAliases {
    fn default() -> Self {
        let table = LogicalField::ALL
            .into_iter()
            .map(|f| {
                let aliases = f.default_aliases().iter().map(|a| a.to_string()).collect();
                (f, aliases)
            })
            .collect();
        Self { table }
    }
}

impl ColumnAliases {
    /// Built-in table with per-field replacements from configuration
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let mut aliases = Self::default();
        for (name, columns) in overrides {
            let field: LogicalField = name.parse()?;
            if columns.is_empty() {
                return Err(Error::Config(format!(
                    "[ingest.aliases] {} must list at least one column",
                    name
                )));
            }
            aliases.table.insert(field, columns.clone());
        }
        Ok(aliases)
    }

    pub fn aliases(&self, field: LogicalField) -> &[String] {
        self.table.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// First alias present with a non-null, non-blank value
    ///
    /// Returns the matching column name together with its value.
    pub fn resolve<'a>(
        &'a self,
        field: LogicalField,
        row: &'a Map<String, Value>,
    ) -> Option<(&'a str, &'a Value)> {
        self.aliases(field).iter().find_map(|alias| {
            let value = row.get(alias)?;
            match value {
                Value::Null => None,
                Value::String(s) if s.trim().is_empty() => None,
                _ => Some((alias.as_str(), value)),
            }
        })
    }
}
