//! Engine failure kinds.

use kyc_dsl_core::amendments::AmendmentError;
use kyc_dsl_core::binder::BindError;
use kyc_dsl_core::parser::ParseError;
use kyc_dsl_core::validator::ValidationReport;
use kyc_case_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("amendment rejected: {message}")]
    Rejected {
        message: String,
        report: Box<ValidationReport>,
    },

    #[error(transparent)]
    Amendment(#[from] AmendmentError),

    #[error("amendment failure: {0}")]
    AmendmentFailure(String),

    #[error("source contains no cases")]
    EmptySource,

    #[error(transparent)]
    Store(#[from] StoreError),
}
