//! Error type shared by the reconciler and the report service

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Attribute columns and row files
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A design or field record named by label does not exist in the project
    #[error("{side} record {label} not found in project {project_id}")]
    RecordNotFound {
        side: &'static str,
        label: String,
        project_id: String,
    },

    /// Malformed row, unknown enum text, or a mismatched manual pairing
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn design_not_found(project_id: &str, label: &str) -> Self {
        Error::RecordNotFound {
            side: "design",
            label: label.to_string(),
            project_id: project_id.to_string(),
        }
    }

    pub fn field_not_found(project_id: &str, label: &str) -> Self {
        Error::RecordNotFound {
            side: "field",
            label: label.to_string(),
            project_id: project_id.to_string(),
        }
    }

    /// True when the error names a missing record rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound { .. })
    }
}
