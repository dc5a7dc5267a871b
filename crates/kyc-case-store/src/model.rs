//! Case store records and failure kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("version conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            key: key.into(),
        }
    }
}

/// One immutable snapshot row, joined with the amendment that produced it
/// (absent for direct submissions).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseVersionRecord {
    pub case_name: String,
    pub version: i32,
    pub dsl_snapshot: String,
    pub sha256_hash: String,
    pub status: String,
    pub amendment_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of a save: either a fresh version or the collapsed existing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedVersion {
    pub version: i32,
    pub sha256_hash: String,
    /// False when the save collapsed onto an identical latest snapshot.
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmendmentRecord {
    pub case_name: String,
    pub new_version: i32,
    pub amendment_type: String,
    pub actor: String,
    pub note: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarRecord {
    pub name: String,
    pub version: String,
    pub ebnf: String,
    pub created_at: DateTime<Utc>,
}
