//! Versioned case snapshot persistence.
//!
//! Every validated submission or amendment appends a `kyc_cases` row; rows
//! are never rewritten. Versions are dense per case name and saves are
//! idempotent on the sha-256 of the snapshot text. The amendment log,
//! grammar versions and validation audit live alongside.

pub mod model;
pub mod store;

pub use model::{AmendmentRecord, CaseVersionRecord, GrammarRecord, SavedVersion, StoreError};
pub use store::CaseStore;
