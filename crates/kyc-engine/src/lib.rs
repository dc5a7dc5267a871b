//! Amendment engine.
//!
//! Orchestrates the case lifecycle protocol: load the latest snapshot,
//! apply a named mutator (panic-safe), validate, serialize, and commit a
//! new version with its amendment-log entry. Persistence is behind the
//! [`ports::CaseVersionPort`] seam so the protocol itself stays testable
//! without a database.

pub mod engine;
pub mod error;
pub mod ports;

pub use engine::{AmendmentEngine, AmendmentOutcome, SubmitOutcome, LOCAL_NOTE, SYSTEM_ACTOR};
pub use error::EngineError;
pub use ports::CaseVersionPort;
