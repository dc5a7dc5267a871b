//! Shared application state, built once at bootstrap and cloned into every
//! handler.

use std::sync::Arc;

use kyc_case_store::CaseStore;
use kyc_cbu_graph::GraphRepository;
use kyc_dsl_core::policy::PolicyRegistry;
use kyc_engine::AmendmentEngine;
use kyc_ontology::OntologyCatalog;
use kyc_rag::{FeedbackRepository, RagRepository, SharedEmbedder};

#[derive(Clone)]
pub struct AppState {
    pub store: CaseStore,
    pub catalog: Arc<OntologyCatalog>,
    pub policies: Arc<PolicyRegistry>,
    pub engine: Arc<AmendmentEngine>,
    pub rag: RagRepository,
    pub feedback: FeedbackRepository,
    pub graphs: GraphRepository,
    pub embedder: SharedEmbedder,
}
