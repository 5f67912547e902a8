//! Database initialization and persisted entity models

pub mod init;
pub mod models;

pub use init::{init_database, open_readonly};
