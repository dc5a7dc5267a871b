//! Graph failure kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("graph integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl GraphError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }
}
