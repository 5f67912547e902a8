//! # SOW Link Common Library
//!
//! Shared code for the sowlink binaries:
//! - Error type and result alias
//! - TOML bootstrap configuration and root folder resolution
//! - Database initialization and schema
//! - Persisted entity models (projects, design/field records, match results, runs)

pub mod config;
pub mod db;
pub mod error;

pub use config::{ProximityBand, ProximityConfig, ReconciliationConfig, TomlConfig};
pub use db::models::{
    Coordinates, DesignRecord, FieldRecord, MatchResult, MatchType, Project, ReconciliationRun,
    RecordKind, RunState,
};
pub use error::{Error, Result};
