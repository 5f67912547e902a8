//! Configuration loading and root folder resolution
//!
//! Two layers of configuration:
//! 1. **TOML bootstrap**: root folder, database path, logging, reconciliation
//!    thresholds, Field Registry endpoint, ingestion column aliases
//! 2. **Command line**: per-invocation overrides (root folder, config path)
//!
//! Root folder resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `SOWLINK_ROOT_FOLDER` environment variable
//! 3. TOML `root_folder`
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "SOWLINK_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "sowlink.db";

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; a missing file yields the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and generated reports
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Database file (relative paths resolve against the root folder)
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Matching and reporting parameters
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,

    /// Field Registry endpoint (only needed by `sync-field`)
    #[serde(default)]
    pub registry: Option<RegistryConfig>,

    /// Spreadsheet ingestion settings
    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Reconciliation parameters passed explicitly into the pipeline
///
/// Defaults:
/// - High-confidence band: `>= 0.9`
/// - Low-confidence band: `< 0.7`
/// - Coordinate agreement box: 0.0001 degrees on each axis (~11m at the equator)
/// - Write batch size: 500 rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// Results at or above this score are "please confirm"
    pub high_confidence_threshold: f64,

    /// Results below this score need field verification
    pub low_confidence_threshold: f64,

    /// Maximum per-axis coordinate difference (degrees) that counts as agreement
    pub coordinate_epsilon_deg: f64,

    /// Rows per store write
    pub batch_size: usize,

    /// Remove automatic results the latest run no longer produces
    pub prune_stale: bool,

    /// Proximity fallback strategy
    pub proximity: ProximityConfig,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            high_confidence_threshold: 0.9,
            low_confidence_threshold: 0.7,
            coordinate_epsilon_deg: 0.0001,
            batch_size: 500,
            prune_stale: true,
            proximity: ProximityConfig::default(),
        }
    }
}

impl ReconciliationConfig {
    /// Check value ranges and ordering constraints
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);

        if !in_unit(self.high_confidence_threshold) || !in_unit(self.low_confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence thresholds must be within [0, 1] (high={}, low={})",
                self.high_confidence_threshold, self.low_confidence_threshold
            )));
        }
        if self.low_confidence_threshold > self.high_confidence_threshold {
            return Err(Error::Config(format!(
                "low_confidence_threshold ({}) exceeds high_confidence_threshold ({})",
                self.low_confidence_threshold, self.high_confidence_threshold
            )));
        }
        if !(self.coordinate_epsilon_deg > 0.0) || !self.coordinate_epsilon_deg.is_finite() {
            return Err(Error::Config(format!(
                "coordinate_epsilon_deg must be positive, got {}",
                self.coordinate_epsilon_deg
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".to_string()));
        }
        self.proximity.validate()
    }
}

/// Proximity fallback: nearest field record within a ground radius
///
/// Candidates are pre-filtered to a per-axis degree box, then kept when the
/// ground distance is within `radius_m`. Confidence comes from the first
/// band whose bound the distance is under, else `far_confidence`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProximityConfig {
    pub enabled: bool,

    /// Per-axis pre-filter box in degrees (~30m)
    pub box_deg: f64,

    /// Search radius in metres (inclusive)
    pub radius_m: f64,

    /// Distance bands, ascending by `under_m`
    pub bands: Vec<ProximityBand>,

    /// Confidence beyond the last band
    pub far_confidence: f64,
}

/// `distance < under_m` scores `confidence`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProximityBand {
    pub under_m: f64,
    pub confidence: f64,
}

impl Default for ProximityConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            box_deg: 0.0003,
            radius_m: 30.0,
            bands: vec![
                ProximityBand { under_m: 5.0, confidence: 0.9 },
                ProximityBand { under_m: 10.0, confidence: 0.8 },
                ProximityBand { under_m: 20.0, confidence: 0.7 },
            ],
            far_confidence: 0.6,
        }
    }
}

impl ProximityConfig {
    /// Confidence for a candidate at `meters`
    pub fn confidence_at(&self, meters: f64) -> f64 {
        self.bands
            .iter()
            .find(|band| meters < band.under_m)
            .map_or(self.far_confidence, |band| band.confidence)
    }

    fn validate(&self) -> Result<()> {
        if !(self.radius_m > 0.0) || !(self.box_deg > 0.0) {
            return Err(Error::Config(format!(
                "proximity radius_m and box_deg must be positive (radius_m={}, box_deg={})",
                self.radius_m, self.box_deg
            )));
        }
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.far_confidence) {
            return Err(Error::Config(format!(
                "proximity far_confidence must be within [0, 1], got {}",
                self.far_confidence
            )));
        }
        let mut previous = 0.0;
        for band in &self.bands {
            if !(band.under_m > previous) || !in_unit(band.confidence) {
                return Err(Error::Config(format!(
                    "proximity bands must ascend with confidence in [0, 1] (under_m={}, confidence={})",
                    band.under_m, band.confidence
                )));
            }
            previous = band.under_m;
        }
        Ok(())
    }
}

/// Field Registry endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL, e.g. `https://registry.example.com` (no trailing slash needed)
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default)]
    pub api_token: Option<String>,

    /// Records requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn default_page_size() -> u32 {
    500
}

/// Spreadsheet ingestion settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Logical field name → source column aliases (replaces built-in list for that field)
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

/// Default config file location: `<config_dir>/sowlink/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sowlink").join("config.toml"))
}

/// Load TOML configuration
///
/// An explicitly requested file must exist. When no path is given the default
/// location is tried; a missing default file is not an error and yields the
/// built-in defaults.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let (config_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => match default_config_path() {
            Some(p) => (p, false),
            None => {
                warn!("Could not determine config directory, using defaults");
                return Ok(TomlConfig::default());
            }
        },
    };

    if !config_path.exists() {
        if explicit {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        info!(
            "No config file at {}, using built-in defaults",
            config_path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    let config = parse_toml_config(&content)?;
    info!("Loaded configuration from {}", config_path.display());
    Ok(config)
}

/// Parse and validate TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    let config: TomlConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    config.reconciliation.validate()?;
    Ok(config)
}

/// Resolves the root folder following the documented priority order
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    /// Create a resolver for the named module (used only in log output)
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    /// Command-line override
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Root folder from the TOML file
    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    /// Resolve the root folder; never fails, falls back to the compiled default
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!(module = %self.module_name, "Root folder from {}: {}", ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from TOML config: {}", path.display());
            return path.clone();
        }

        let path = default_root_folder();
        info!(module = %self.module_name, "Root folder (default): {}", path.display());
        path
    }
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sowlink"))
        .unwrap_or_else(|| PathBuf::from("./sowlink_data"))
}

/// Creates the root folder and locates the database inside it
pub struct RootFolderInitializer {
    root_folder: PathBuf,
    database_override: Option<PathBuf>,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self {
            root_folder,
            database_override: None,
        }
    }

    /// Use the TOML `database_path` when present
    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.database_override = config.database_path.clone();
        self
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Create the root folder (and parents) if missing; idempotent
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Database file path
    pub fn database_path(&self) -> PathBuf {
        match &self.database_override {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => self.root_folder.join(path),
            None => self.root_folder.join(DATABASE_FILE_NAME),
        }
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(ReconciliationConfig::default().validate().is_ok());
    }

    #[test]
    fn inverted_thresholds_rejected() {
        let config = ReconciliationConfig {
            high_confidence_threshold: 0.6,
            low_confidence_threshold: 0.8,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = ReconciliationConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_positive_epsilon_rejected() {
        let mut config = ReconciliationConfig::default();
        config.coordinate_epsilon_deg = 0.0;
        assert!(config.validate().is_err());
        config.coordinate_epsilon_deg = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unordered_proximity_bands_rejected() {
        let mut config = ReconciliationConfig::default();
        config.proximity.bands.swap(0, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn proximity_bands_score_by_distance() {
        let proximity = ProximityConfig::default();
        assert_eq!(proximity.confidence_at(2.0), 0.9);
        assert_eq!(proximity.confidence_at(5.0), 0.8);
        assert_eq!(proximity.confidence_at(15.0), 0.7);
        assert_eq!(proximity.confidence_at(25.0), 0.6);
    }

    #[test]
    fn database_path_defaults_inside_root() {
        let init = RootFolderInitializer::new(PathBuf::from("/data/sowlink"));
        assert_eq!(init.database_path(), PathBuf::from("/data/sowlink/sowlink.db"));
    }

    #[test]
    fn relative_database_override_resolves_against_root() {
        let config = TomlConfig {
            database_path: Some(PathBuf::from("db/recon.db")),
            ..Default::default()
        };
        let init = RootFolderInitializer::new(PathBuf::from("/data/sowlink")).with_config(&config);
        assert_eq!(init.database_path(), PathBuf::from("/data/sowlink/db/recon.db"));
    }
}
