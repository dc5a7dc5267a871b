//! `kyc.dsl.DslService` implementation.

use tonic::{Request, Response, Status};
use tracing::info;

use kyc_dsl_core::amendments::AmendmentKind;
use kyc_dsl_core::grammar;
use kyc_dsl_core::model::FunctionAction;
use kyc_dsl_core::serializer::serialize;
use kyc_dsl_core::validator::FindingStatus;
use kyc_engine::{EngineError, SYSTEM_ACTOR};

use crate::proto::kyc::dsl::dsl_service_server::DslService;
use crate::proto::kyc::dsl::*;
use crate::state::AppState;

use super::convert::{case_from_proto, case_to_proto, timestamp};
use super::{engine_status, require, store_status};

pub struct DslGrpc {
    state: AppState,
}

impl DslGrpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl DslService for DslGrpc {
    async fn execute(
        &self,
        request: Request<ExecuteRequest>,
    ) -> Result<Response<ExecuteResponse>, Status> {
        let req = request.into_inner();
        require("case_id", &req.case_id)?;
        require("function_name", &req.function_name)?;

        let action = FunctionAction::try_from(req.function_name.as_str())
            .map_err(Status::invalid_argument)?;

        match self
            .state
            .engine
            .execute_function(&req.case_id, action, SYSTEM_ACTOR)
            .await
        {
            Ok(outcome) => Ok(Response::new(ExecuteResponse {
                updated_dsl: outcome.updated_dsl,
                success: true,
                message: format!("executed function '{action}' on case '{}'", req.case_id),
                case_id: req.case_id,
                new_version: outcome.version,
            })),
            Err(EngineError::Rejected { message, .. }) => Ok(Response::new(ExecuteResponse {
                updated_dsl: String::new(),
                success: false,
                message,
                case_id: req.case_id,
                new_version: 0,
            })),
            Err(e) => Err(engine_status(e)),
        }
    }

    async fn validate(
        &self,
        request: Request<ValidateRequest>,
    ) -> Result<Response<ValidationResult>, Status> {
        let req = request.into_inner();
        if req.case_id.trim().is_empty() && req.dsl.trim().is_empty() {
            return Err(Status::invalid_argument(
                "one of case_id or dsl is required",
            ));
        }

        let source = if !req.dsl.trim().is_empty() {
            req.dsl
        } else {
            self.state
                .store
                .get_latest_dsl(&req.case_id)
                .await
                .map_err(store_status)?
        };

        let reports = match self.state.engine.assess(&source) {
            Ok(reports) => reports,
            Err(e @ (EngineError::Parse(_) | EngineError::Bind(_) | EngineError::EmptySource)) => {
                return Ok(Response::new(ValidationResult {
                    valid: false,
                    errors: vec![e.to_string()],
                    warnings: vec![],
                    issues: vec![ValidationIssue {
                        severity: "ERROR".to_string(),
                        message: e.to_string(),
                        code: "PARSE_ERROR".to_string(),
                    }],
                }));
            }
            Err(e) => return Err(engine_status(e)),
        };

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut issues = Vec::new();
        for report in &reports {
            for finding in &report.findings {
                match finding.status {
                    FindingStatus::Fail => errors.push(finding.message.clone()),
                    FindingStatus::Warn => warnings.push(finding.message.clone()),
                    FindingStatus::Pass => {}
                }
                issues.push(ValidationIssue {
                    severity: finding.severity.as_str().to_string(),
                    message: finding.message.clone(),
                    code: finding.check_name.clone(),
                });
            }
        }

        Ok(Response::new(ValidationResult {
            valid: reports.iter().all(|r| r.passed),
            errors,
            warnings,
            issues,
        }))
    }

    async fn parse(
        &self,
        request: Request<ParseRequest>,
    ) -> Result<Response<ParseResponse>, Status> {
        let req = request.into_inner();
        require("dsl", &req.dsl)?;

        match kyc_engine::AmendmentEngine::parse_and_bind(&req.dsl) {
            Ok(bound) => Ok(Response::new(ParseResponse {
                success: true,
                message: format!("parsed {} case(s)", bound.cases.len()),
                cases: bound.cases.iter().map(case_to_proto).collect(),
                errors: bound.warnings,
            })),
            Err(e) => Ok(Response::new(ParseResponse {
                success: false,
                message: format!("parse failed: {e}"),
                cases: vec![],
                errors: vec![e.to_string()],
            })),
        }
    }

    async fn serialize(
        &self,
        request: Request<SerializeRequest>,
    ) -> Result<Response<SerializeResponse>, Status> {
        let req = request.into_inner();
        let Some(case) = req.case else {
            return Ok(Response::new(SerializeResponse {
                success: false,
                dsl: String::new(),
                message: "no case provided".to_string(),
            }));
        };

        let case = case_from_proto(case);
        let dsl = serialize(std::slice::from_ref(&case));
        Ok(Response::new(SerializeResponse {
            success: true,
            dsl,
            message: "serialization successful".to_string(),
        }))
    }

    async fn amend(
        &self,
        request: Request<AmendRequest>,
    ) -> Result<Response<AmendResponse>, Status> {
        let req = request.into_inner();
        require("case_name", &req.case_name)?;
        require("amendment_type", &req.amendment_type)?;

        let kind = AmendmentKind::try_from(req.amendment_type.as_str())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        match self
            .state
            .engine
            .apply_amendment(&req.case_name, kind, SYSTEM_ACTOR)
            .await
        {
            Ok(outcome) => {
                info!(case = %req.case_name, step = %kind, version = outcome.version, "amendment applied");
                Ok(Response::new(AmendResponse {
                    success: true,
                    message: if outcome.no_op {
                        format!("amendment '{kind}' was a no-op")
                    } else {
                        format!("applied amendment '{kind}'")
                    },
                    updated_dsl: outcome.updated_dsl,
                    new_version: outcome.version,
                    sha256_hash: outcome.sha256_hash,
                }))
            }
            Err(EngineError::Rejected { message, .. }) => Ok(Response::new(AmendResponse {
                success: false,
                message,
                updated_dsl: String::new(),
                new_version: 0,
                sha256_hash: String::new(),
            })),
            Err(e) => Err(engine_status(e)),
        }
    }

    async fn list_amendments(
        &self,
        _request: Request<ListAmendmentsRequest>,
    ) -> Result<Response<ListAmendmentsResponse>, Status> {
        let amendments = AmendmentKind::ALL
            .into_iter()
            .map(|kind| AmendmentType {
                name: kind.as_str().to_string(),
                description: kind.description().to_string(),
                parameters: kind.parameters().iter().map(|p| p.to_string()).collect(),
            })
            .collect();
        Ok(Response::new(ListAmendmentsResponse { amendments }))
    }

    async fn get_grammar(
        &self,
        _request: Request<GetGrammarRequest>,
    ) -> Result<Response<GrammarResponse>, Status> {
        match self.state.store.get_grammar(grammar::GRAMMAR_NAME).await {
            Ok(record) => Ok(Response::new(GrammarResponse {
                ebnf: record.ebnf,
                version: record.version,
                created_at: Some(timestamp(record.created_at)),
            })),
            // The table may be empty before the first bootstrap completes;
            // the built-in grammar is authoritative either way.
            Err(kyc_case_store::StoreError::NotFound { .. }) => {
                Ok(Response::new(GrammarResponse {
                    ebnf: grammar::current_grammar_ebnf().to_string(),
                    version: grammar::GRAMMAR_VERSION.to_string(),
                    created_at: None,
                }))
            }
            Err(e) => Err(store_status(e)),
        }
    }
}
