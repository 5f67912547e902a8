//! Pole/drop label normalization
//!
//! Design spreadsheets label poles like `LAW.P.A001` while the Field Registry
//! records the same pole as `LAW.P.001`. Normalization removes the single
//! letter infix after `.P.` and extracts the trailing numeric suffix used by
//! the suffix join.
//!
//! Pure functions, no I/O, never fail.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `<prefix>.P.<Letter><digits>` (ASCII only)
static LETTER_INFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.*\.P\.)([A-Z])([0-9]+)$").expect("letter infix pattern is valid")
});

/// Normalized forms of one raw label
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizedIdentifier {
    /// Trimmed input
    pub original: Option<String>,
    /// Letter infix removed when present, otherwise `original`
    pub normalized: Option<String>,
    /// Trailing ASCII digit run as an integer
    pub numeric_suffix: Option<u64>,
}

impl NormalizedIdentifier {
    /// True when normalization changed the label
    pub fn was_rewritten(&self) -> bool {
        self.original != self.normalized
    }
}

/// Normalize an optional raw label
///
/// Absent, empty, or whitespace-only input yields an identifier with every
/// field absent.
pub fn normalize(label: Option<&str>) -> NormalizedIdentifier {
    let trimmed = match label.map(str::trim) {
        Some(s) if !s.is_empty() => s,
        _ => return NormalizedIdentifier::default(),
    };

    let normalized = match LETTER_INFIX.captures(trimmed) {
        Some(caps) => format!("{}{}", &caps[1], &caps[3]),
        None => trimmed.to_string(),
    };

    NormalizedIdentifier {
        original: Some(trimmed.to_string()),
        normalized: Some(normalized),
        numeric_suffix: numeric_suffix(trimmed),
    }
}

/// Normalize a present label
pub fn normalize_label(label: &str) -> NormalizedIdentifier {
    normalize(Some(label))
}

/// Longest trailing ASCII digit run, `None` when absent or too large
pub fn numeric_suffix(label: &str) -> Option<u64> {
    let trimmed = label.trim_end();
    let digits_start = trimmed
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;

    trimmed[digits_start..].parse::<u64>().ok()
}

/// Label normalization counters gathered during an import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationStats {
    /// Labels normalization left unchanged
    pub exact: usize,
    /// Labels rewritten by removing the letter infix
    pub normalized: usize,
    /// Labels carrying a numeric suffix
    pub with_suffix: usize,
}

impl NormalizationStats {
    pub fn record(&mut self, id: &NormalizedIdentifier) {
        if id.original.is_none() {
            return;
        }
        if id.was_rewritten() {
            self.normalized += 1;
        } else {
            self.exact += 1;
        }
        if id.numeric_suffix.is_some() {
            self.with_suffix += 1;
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} exact, {} normalized, {} with numeric suffix",
            self.exact, self.normalized, self.with_suffix
        )
    }
}
