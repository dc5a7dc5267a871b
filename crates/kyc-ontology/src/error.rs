//! Ontology failure kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OntologyError {
    #[error("{kind} '{code}' not found")]
    NotFound { kind: &'static str, code: String },

    #[error("ontology integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    #[error("derivation source '{0}' is not a public attribute")]
    NonPublicSource(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl OntologyError {
    pub fn not_found(kind: &'static str, code: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            code: code.into(),
        }
    }
}
