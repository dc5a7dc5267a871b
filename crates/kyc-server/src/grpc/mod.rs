//! gRPC service implementations.
//!
//! Each service maps component errors onto gRPC status codes: missing or
//! malformed request fields are `InvalidArgument`, unknown entities are
//! `NotFound`, integrity and lifecycle violations are `FailedPrecondition`,
//! and storage or transport failures are `Internal`. Business validation
//! failures travel inside the response payloads, not as statuses.

pub mod cases;
pub mod cbu;
pub mod convert;
pub mod dictionary;
pub mod dsl;
pub mod ontology;
pub mod rag;

use tonic::Status;
use tracing::error;

use kyc_case_store::StoreError;
use kyc_cbu_graph::GraphError;
use kyc_engine::EngineError;
use kyc_ontology::OntologyError;
use kyc_rag::RagError;

/// Reject empty required request fields.
pub fn require(field: &'static str, value: &str) -> Result<(), Status> {
    if value.trim().is_empty() {
        return Err(Status::invalid_argument(format!("{field} is required")));
    }
    Ok(())
}

pub fn store_status(e: StoreError) -> Status {
    match e {
        StoreError::NotFound { .. } => Status::not_found(e.to_string()),
        StoreError::Conflict(_) => Status::aborted(e.to_string()),
        StoreError::Database(_) => internal(e),
    }
}

pub fn engine_status(e: EngineError) -> Status {
    match e {
        EngineError::Parse(_) | EngineError::Bind(_) | EngineError::EmptySource => {
            Status::invalid_argument(e.to_string())
        }
        EngineError::Rejected { .. } => Status::failed_precondition(e.to_string()),
        EngineError::Amendment(kyc_dsl_core::amendments::AmendmentError::Unknown(_)) => {
            Status::invalid_argument(e.to_string())
        }
        EngineError::Amendment(_) => Status::failed_precondition(e.to_string()),
        EngineError::AmendmentFailure(_) => internal(e),
        EngineError::Store(inner) => store_status(inner),
    }
}

pub fn ontology_status(e: OntologyError) -> Status {
    match e {
        OntologyError::NotFound { .. } | OntologyError::UnknownAttribute(_) => {
            Status::not_found(e.to_string())
        }
        OntologyError::IntegrityViolation(_) | OntologyError::NonPublicSource(_) => {
            Status::failed_precondition(e.to_string())
        }
        OntologyError::Database(_) => internal(e),
    }
}

pub fn rag_status(e: RagError) -> Status {
    match e {
        RagError::NotFound { .. } => Status::not_found(e.to_string()),
        RagError::NoEmbedding(_) => Status::failed_precondition(e.to_string()),
        RagError::MissingFeedbackTarget => Status::invalid_argument(e.to_string()),
        RagError::Embedding(_) | RagError::Database(_) => internal(e),
    }
}

pub fn graph_status(e: GraphError) -> Status {
    match e {
        GraphError::NotFound { .. } => Status::not_found(e.to_string()),
        GraphError::IntegrityViolation(_) => Status::failed_precondition(e.to_string()),
        GraphError::Database(_) => internal(e),
    }
}

fn internal(e: impl std::fmt::Display) -> Status {
    error!("internal error: {e}");
    Status::internal("internal error")
}
