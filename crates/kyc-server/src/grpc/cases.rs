//! `kyc.data.CaseService` implementation.
//!
//! List RPCs stream one record per case in source order through a bounded
//! channel; a client that stops consuming drops the receiver, which ends
//! the producer task.

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};
use tracing::warn;

use kyc_case_store::CaseVersionRecord;
use kyc_dsl_core::binder::bind;
use kyc_dsl_core::parser::parse;
use kyc_engine::{EngineError, SYSTEM_ACTOR};
use kyc_rag::retrieval::clamp_limit;

use crate::proto::kyc::data::case_service_server::CaseService;
use crate::proto::kyc::data::*;
use crate::state::AppState;

use super::convert::timestamp;
use super::{engine_status, require, store_status};

pub struct CaseGrpc {
    state: AppState,
}

impl CaseGrpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

fn record_to_proto(record: CaseVersionRecord) -> CaseRecord {
    CaseRecord {
        name: record.case_name,
        version: record.version,
        dsl: record.dsl_snapshot,
        sha256_hash: record.sha256_hash,
        status: record.status,
        amendment_type: record.amendment_type.unwrap_or_default(),
        created_at: Some(timestamp(record.created_at)),
    }
}

/// Content filters for ListCases are evaluated against the bound case; an
/// unparsable legacy snapshot is skipped with a warning.
fn matches_filters(record: &CaseVersionRecord, jurisdiction: &str, policy: &str) -> bool {
    if jurisdiction.is_empty() && policy.is_empty() {
        return true;
    }
    let bound = match parse(&record.dsl_snapshot).map_err(|e| e.to_string()).and_then(|dsl| {
        bind(&dsl).map_err(|e| e.to_string())
    }) {
        Ok(bound) => bound,
        Err(e) => {
            warn!(case = %record.case_name, "skipping unparsable snapshot: {e}");
            return false;
        }
    };
    let Some(case) = bound.cases.first() else {
        return false;
    };

    let jurisdiction_ok = jurisdiction.is_empty()
        || case
            .document_requirements
            .iter()
            .any(|g| g.jurisdiction == jurisdiction);
    let policy_ok = policy.is_empty() || case.policies.iter().any(|p| p == policy);
    jurisdiction_ok && policy_ok
}

#[tonic::async_trait]
impl CaseService for CaseGrpc {
    async fn get_case(
        &self,
        request: Request<GetCaseRequest>,
    ) -> Result<Response<CaseRecord>, Status> {
        let req = request.into_inner();
        require("name", &req.name)?;
        let record = self
            .state
            .store
            .get_latest_version(&req.name)
            .await
            .map_err(store_status)?;
        Ok(Response::new(record_to_proto(record)))
    }

    async fn create_case(
        &self,
        request: Request<CreateCaseRequest>,
    ) -> Result<Response<MutationResponse>, Status> {
        let req = request.into_inner();
        require("dsl", &req.dsl)?;

        match self.state.engine.submit(&req.dsl, SYSTEM_ACTOR).await {
            Ok(outcomes) => {
                let first = &outcomes[0];
                Ok(Response::new(MutationResponse {
                    success: true,
                    message: format!("stored {} case(s)", outcomes.len()),
                    case_name: first.case_name.clone(),
                    new_version: first.version,
                    sha256_hash: first.sha256_hash.clone(),
                }))
            }
            Err(EngineError::Rejected { message, .. }) => Ok(Response::new(MutationResponse {
                success: false,
                message,
                case_name: String::new(),
                new_version: 0,
                sha256_hash: String::new(),
            })),
            Err(e) => Err(engine_status(e)),
        }
    }

    async fn update_case(
        &self,
        request: Request<UpdateCaseRequest>,
    ) -> Result<Response<MutationResponse>, Status> {
        let req = request.into_inner();
        require("name", &req.name)?;
        require("dsl", &req.dsl)?;

        // The updated source must still describe the named case.
        let bound =
            kyc_engine::AmendmentEngine::parse_and_bind(&req.dsl).map_err(engine_status)?;
        if !bound.cases.iter().any(|c| c.name == req.name) {
            return Err(Status::invalid_argument(format!(
                "dsl does not contain case '{}'",
                req.name
            )));
        }
        // Updating an unknown case is a client error.
        self.state
            .store
            .get_latest_version(&req.name)
            .await
            .map_err(store_status)?;

        match self.state.engine.submit(&req.dsl, SYSTEM_ACTOR).await {
            Ok(outcomes) => {
                let outcome = outcomes
                    .iter()
                    .find(|o| o.case_name == req.name)
                    .unwrap_or(&outcomes[0]);
                Ok(Response::new(MutationResponse {
                    success: true,
                    message: if outcome.no_op {
                        "update produced an identical snapshot".to_string()
                    } else {
                        "case updated".to_string()
                    },
                    case_name: outcome.case_name.clone(),
                    new_version: outcome.version,
                    sha256_hash: outcome.sha256_hash.clone(),
                }))
            }
            Err(EngineError::Rejected { message, .. }) => Ok(Response::new(MutationResponse {
                success: false,
                message,
                case_name: req.name,
                new_version: 0,
                sha256_hash: String::new(),
            })),
            Err(e) => Err(engine_status(e)),
        }
    }

    async fn delete_case(
        &self,
        request: Request<DeleteCaseRequest>,
    ) -> Result<Response<MutationResponse>, Status> {
        let req = request.into_inner();
        require("name", &req.name)?;
        let removed = self
            .state
            .store
            .delete_case(&req.name)
            .await
            .map_err(store_status)?;
        Ok(Response::new(MutationResponse {
            success: true,
            message: format!("deleted {removed} version(s)"),
            case_name: req.name,
            new_version: 0,
            sha256_hash: String::new(),
        }))
    }

    type ListCasesStream = ReceiverStream<Result<CaseRecord, Status>>;

    async fn list_cases(
        &self,
        request: Request<ListCasesRequest>,
    ) -> Result<Response<Self::ListCasesStream>, Status> {
        let req = request.into_inner();
        let limit = clamp_limit(Some(req.limit as i64));
        let offset = (req.offset as i64).max(0);

        let records = self
            .state
            .store
            .list_latest_cases(limit, offset)
            .await
            .map_err(store_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for record in records {
                if !matches_filters(&record, &req.jurisdiction, &req.policy) {
                    continue;
                }
                if tx.send(Ok(record_to_proto(record))).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    type GetCaseVersionsStream = ReceiverStream<Result<CaseRecord, Status>>;

    async fn get_case_versions(
        &self,
        request: Request<GetCaseVersionsRequest>,
    ) -> Result<Response<Self::GetCaseVersionsStream>, Status> {
        let req = request.into_inner();
        require("name", &req.name)?;

        let versions = self
            .state
            .store
            .list_case_versions(&req.name)
            .await
            .map_err(store_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for record in versions {
                if tx.send(Ok(record_to_proto(record))).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(dsl: &str) -> CaseVersionRecord {
        CaseVersionRecord {
            case_name: "TEST".to_string(),
            version: 1,
            dsl_snapshot: dsl.to_string(),
            sha256_hash: String::new(),
            status: "pending".to_string(),
            amendment_type: None,
            created_at: Utc::now(),
        }
    }

    const SNAPSHOT: &str = r#"(kyc-case TEST
        (nature-purpose (nature "N") (purpose "P"))
        (client-business-unit C)
        (policy CDD-STANDARD)
        (kyc-token "pending")
        (document-requirements (jurisdiction LU) (required)))"#;

    #[test]
    fn empty_filters_match_everything() {
        assert!(matches_filters(&record(SNAPSHOT), "", ""));
    }

    #[test]
    fn jurisdiction_filter_checks_requirement_groups() {
        assert!(matches_filters(&record(SNAPSHOT), "LU", ""));
        assert!(!matches_filters(&record(SNAPSHOT), "GB", ""));
    }

    #[test]
    fn policy_filter_checks_policy_codes() {
        assert!(matches_filters(&record(SNAPSHOT), "", "CDD-STANDARD"));
        assert!(!matches_filters(&record(SNAPSHOT), "", "EDD-HIGH-RISK"));
    }

    #[test]
    fn unparsable_snapshot_is_filtered_out() {
        assert!(!matches_filters(&record("(not-a-case"), "LU", ""));
    }
}
