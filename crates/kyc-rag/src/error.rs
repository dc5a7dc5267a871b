//! Retrieval failure kinds.

use thiserror::Error;

use crate::embedder::EmbeddingError;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("{kind} '{code}' not found")]
    NotFound { kind: &'static str, code: String },

    #[error("attribute '{0}' has no embedding")]
    NoEmbedding(String),

    #[error("feedback must reference an attribute, document or regulation")]
    MissingFeedbackTarget,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RagError {
    pub fn not_found(kind: &'static str, code: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            code: code.into(),
        }
    }
}
