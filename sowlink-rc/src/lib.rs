//! # sowlink-rc: design/field reconciliation core
//!
//! Pipeline stages, in dependency order:
//! - [`normalizer`]: label normalization (pure)
//! - [`ingest`]: spreadsheet rows → canonical records via the column alias table
//! - [`matcher`]: ordered match strategies and the resolver
//! - [`reporter`]: confidence bands, unmapped list, CSV and HTML renderings
//!
//! [`reconciler::Reconciler`] runs the stages over an injected
//! [`db::ReconciliationStore`]; [`registry`] pulls field records from the
//! Field Registry.

pub mod db;
pub mod ingest;
pub mod matcher;
pub mod normalizer;
pub mod reconciler;
pub mod registry;
pub mod reporter;

pub use db::{MemoryStore, ReconciliationStore, SqliteStore};
pub use reconciler::{load_report, Reconciler};
