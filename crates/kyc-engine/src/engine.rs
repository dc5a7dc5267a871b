//! The amendment application protocol.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use kyc_dsl_core::amendments::{self, AmendmentError, AmendmentKind};
use kyc_dsl_core::binder::{bind, BindResult};
use kyc_dsl_core::model::{Case, FunctionAction};
use kyc_dsl_core::parser::parse;
use kyc_dsl_core::policy::PolicyRegistry;
use kyc_dsl_core::serializer::serialize;
use kyc_dsl_core::validator::{ValidationReport, Validator};
use kyc_ontology::OntologyCatalog;

use crate::error::EngineError;
use crate::ports::CaseVersionPort;

pub const SYSTEM_ACTOR: &str = "System";
pub const LOCAL_NOTE: &str = "local";

/// Result of one applied amendment.
#[derive(Debug, Clone, Serialize)]
pub struct AmendmentOutcome {
    pub case_name: String,
    pub version: i32,
    pub sha256_hash: String,
    pub updated_dsl: String,
    /// True when the mutator produced byte-identical text and the save
    /// collapsed onto the existing version.
    pub no_op: bool,
    /// Present when the validation audit write failed; the amendment itself
    /// still succeeded.
    pub audit_error: Option<String>,
}

/// Result of a validated submission of one case.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub case_name: String,
    pub version: i32,
    pub sha256_hash: String,
    pub no_op: bool,
    pub audit_error: Option<String>,
}

pub struct AmendmentEngine {
    store: Arc<dyn CaseVersionPort>,
    catalog: Arc<OntologyCatalog>,
    policies: Arc<PolicyRegistry>,
}

impl AmendmentEngine {
    pub fn new(
        store: Arc<dyn CaseVersionPort>,
        catalog: Arc<OntologyCatalog>,
        policies: Arc<PolicyRegistry>,
    ) -> Self {
        Self {
            store,
            catalog,
            policies,
        }
    }

    fn validator(&self) -> Validator<'_> {
        Validator::new(self.catalog.as_ref(), &self.policies)
            .with_versions(kyc_dsl_core::grammar::GRAMMAR_VERSION, self.catalog.version())
    }

    /// Parse and bind a source, requiring at least one case.
    pub fn parse_and_bind(source: &str) -> Result<BindResult, EngineError> {
        let bound = bind(&parse(source)?)?;
        if bound.cases.is_empty() {
            return Err(EngineError::EmptySource);
        }
        Ok(bound)
    }

    /// Validate a source without persisting anything. Reports are returned
    /// for passing and failing cases alike.
    pub fn assess(&self, source: &str) -> Result<Vec<ValidationReport>, EngineError> {
        let bound = Self::parse_and_bind(source)?;
        let validator = self.validator();
        Ok(bound.cases.iter().map(|c| validator.validate_case(c)).collect())
    }

    /// First validated submission (or re-submission) of DSL source. Each
    /// case is validated with audit, canonicalized and saved.
    #[instrument(skip(self, source), fields(actor = actor))]
    pub async fn submit(
        &self,
        source: &str,
        actor: &str,
    ) -> Result<Vec<SubmitOutcome>, EngineError> {
        let bound = Self::parse_and_bind(source)?;
        let validator = self.validator();

        let mut outcomes = Vec::with_capacity(bound.cases.len());
        for case in &bound.cases {
            let report = validator.validate_case(case);
            let audit_error = self.audit(&report, actor).await;
            if !report.passed {
                return Err(rejected(report));
            }

            let canonical = serialize(std::slice::from_ref(case));
            let saved = self
                .store
                .save_version(&case.name, &canonical, case.status.token_label())
                .await?;
            info!(case = %case.name, version = saved.version, "case submitted");
            outcomes.push(SubmitOutcome {
                case_name: case.name.clone(),
                version: saved.version,
                sha256_hash: saved.sha256_hash,
                no_op: !saved.created,
                audit_error,
            });
        }
        Ok(outcomes)
    }

    /// Apply a named amendment to the latest version of a case.
    #[instrument(skip(self), fields(case = case_name, step = %kind))]
    pub async fn apply_amendment(
        &self,
        case_name: &str,
        kind: AmendmentKind,
        actor: &str,
    ) -> Result<AmendmentOutcome, EngineError> {
        let catalog = Arc::clone(&self.catalog);
        let policies = Arc::clone(&self.policies);
        self.apply_mutation(case_name, kind.as_str(), actor, move |case| {
            amendments::apply(kind, case, catalog.as_ref(), &policies)
        })
        .await
    }

    /// Execute a case function: appends the action to the case and commits
    /// the resulting version. No amendment-log entry is written; the log is
    /// reserved for the named amendments.
    #[instrument(skip(self), fields(case = case_name, function = %action))]
    pub async fn execute_function(
        &self,
        case_name: &str,
        action: FunctionAction,
        actor: &str,
    ) -> Result<AmendmentOutcome, EngineError> {
        let source = self.store.latest_dsl(case_name).await?;
        let mut bound = Self::parse_and_bind(&source)?;
        let case = &mut bound.cases[0];
        case.add_function(action);
        self.commit(case, None, actor).await
    }

    /// The full §4.6 protocol with an arbitrary mutator. Mutator panics are
    /// converted to [`EngineError::AmendmentFailure`]; nothing is persisted
    /// when the mutator or the post-mutation validation fails.
    pub async fn apply_mutation<F>(
        &self,
        case_name: &str,
        step: &str,
        actor: &str,
        mutator: F,
    ) -> Result<AmendmentOutcome, EngineError>
    where
        F: FnOnce(&mut Case) -> Result<(), AmendmentError>,
    {
        let source = self.store.latest_dsl(case_name).await?;
        let mut bound = Self::parse_and_bind(&source)?;
        let case = &mut bound.cases[0];

        match std::panic::catch_unwind(AssertUnwindSafe(|| mutator(case))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(EngineError::AmendmentFailure(format!(
                    "mutator for '{step}' panicked"
                )))
            }
        }

        self.commit(case, Some(step), actor).await
    }

    /// Validate, serialize and save a mutated case, logging the amendment
    /// when a new version was actually created.
    async fn commit(
        &self,
        case: &Case,
        step: Option<&str>,
        actor: &str,
    ) -> Result<AmendmentOutcome, EngineError> {
        let report = self.validator().validate_case(case);
        let audit_error = self.audit(&report, actor).await;
        if !report.passed {
            return Err(rejected(report));
        }

        let text = serialize(std::slice::from_ref(case));
        let saved = self
            .store
            .save_version(&case.name, &text, case.status.token_label())
            .await?;

        if saved.created {
            if let Some(step) = step {
                self.store
                    .record_amendment(&case.name, saved.version, step, actor, LOCAL_NOTE)
                    .await?;
            }
            info!(case = %case.name, version = saved.version, "amendment committed");
        } else {
            info!(case = %case.name, version = saved.version, "amendment was a no-op");
        }

        Ok(AmendmentOutcome {
            case_name: case.name.clone(),
            version: saved.version,
            sha256_hash: saved.sha256_hash,
            updated_dsl: text,
            no_op: !saved.created,
            audit_error,
        })
    }

    /// Best-effort audit write. Failures degrade to a warning on the
    /// outcome rather than blocking the operation.
    async fn audit(&self, report: &ValidationReport, actor: &str) -> Option<String> {
        match self.store.record_validation(report, actor).await {
            Ok(()) => None,
            Err(e) => {
                warn!(case = %report.case_name, "validation audit write failed: {e}");
                Some(e.to_string())
            }
        }
    }
}

fn rejected(report: ValidationReport) -> EngineError {
    EngineError::Rejected {
        message: report
            .error_message
            .clone()
            .unwrap_or_else(|| "validation failed".to_string()),
        report: Box::new(report),
    }
}
