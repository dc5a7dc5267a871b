//! Three-layer case validator with audit findings.
//!
//! Layers run in order — structural, semantic, ownership — short-circuiting
//! after the first layer that produces a fatal finding. Every executed check
//! counts toward the audit totals; only WARN/FAIL findings are recorded.
//! The caller persists the report (best-effort) via the case store.

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grammar;
use crate::model::{Case, FunctionAction, OwnershipNode};
use crate::ontology_view::OntologyView;
use crate::policy::PolicyRegistry;

/// Lowercase token labels accepted by the structural layer.
pub const TOKEN_LABEL_PATTERN: &str = "^(pending|approved|declined|review)$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckLayer {
    Structural,
    Semantic,
    Ownership,
}

impl CheckLayer {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckLayer::Structural => "structural",
            CheckLayer::Semantic => "semantic",
            CheckLayer::Ownership => "ownership",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FindingStatus {
    Pass,
    Warn,
    Fail,
}

impl FindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingStatus::Pass => "PASS",
            FindingStatus::Warn => "WARN",
            FindingStatus::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

/// One recorded WARN/FAIL check outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    pub check_type: CheckLayer,
    pub check_name: String,
    pub status: FindingStatus,
    pub message: String,
    pub entity_ref: Option<String>,
    pub severity: Severity,
}

/// Per-case validation outcome, shaped for the `kyc_case_validations`
/// audit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub case_name: String,
    pub version: i32,
    pub grammar_version: String,
    pub ontology_version: String,
    pub passed: bool,
    pub error_message: Option<String>,
    pub total_checks: u32,
    pub passed_checks: u32,
    pub failed_checks: u32,
    pub findings: Vec<ValidationFinding>,
}

impl ValidationReport {
    pub fn status(&self) -> &'static str {
        if self.passed {
            "PASS"
        } else {
            "FAIL"
        }
    }
}

/// Returned when any case fails; carries the failing report in full.
#[derive(Debug, Error)]
#[error("case '{case_name}' failed validation: {message}")]
pub struct ValidationError {
    pub case_name: String,
    pub message: String,
    pub report: ValidationReport,
}

pub struct Validator<'a> {
    ontology: &'a dyn OntologyView,
    policies: &'a PolicyRegistry,
    grammar_version: String,
    ontology_version: String,
    token_pattern: Regex,
}

impl<'a> Validator<'a> {
    pub fn new(ontology: &'a dyn OntologyView, policies: &'a PolicyRegistry) -> Self {
        Self {
            ontology,
            policies,
            grammar_version: grammar::GRAMMAR_VERSION.to_string(),
            ontology_version: "bootstrap".to_string(),
            token_pattern: Regex::new(TOKEN_LABEL_PATTERN).unwrap(),
        }
    }

    pub fn with_versions(
        mut self,
        grammar_version: impl Into<String>,
        ontology_version: impl Into<String>,
    ) -> Self {
        self.grammar_version = grammar_version.into();
        self.ontology_version = ontology_version.into();
        self
    }

    /// Validate all cases, failing on the first report that is not PASS.
    pub fn validate(&self, cases: &[Case]) -> Result<Vec<ValidationReport>, ValidationError> {
        let mut reports = Vec::with_capacity(cases.len());
        for case in cases {
            let report = self.validate_case(case);
            if !report.passed {
                return Err(ValidationError {
                    case_name: report.case_name.clone(),
                    message: report
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "validation failed".to_string()),
                    report,
                });
            }
            reports.push(report);
        }
        Ok(reports)
    }

    /// Run the three layers against one case and build the audit report.
    pub fn validate_case(&self, case: &Case) -> ValidationReport {
        let mut ctx = CheckContext::default();

        self.structural_checks(case, &mut ctx);
        if !ctx.layer_failed {
            self.semantic_checks(case, &mut ctx);
        }
        if !ctx.layer_failed {
            self.ownership_checks(case, &mut ctx);
        }

        let error_message = ctx
            .findings
            .iter()
            .find(|f| matches!(f.severity, Severity::Error | Severity::Critical))
            .map(|f| f.message.clone());

        ValidationReport {
            case_name: case.name.clone(),
            version: case.version,
            grammar_version: self.grammar_version.clone(),
            ontology_version: self.ontology_version.clone(),
            passed: ctx.failed == 0,
            error_message,
            total_checks: ctx.total,
            passed_checks: ctx.total - ctx.failed,
            failed_checks: ctx.failed,
            findings: ctx.findings,
        }
    }

    // ------------------------------------------------------------------
    // Layer 1: structural
    // ------------------------------------------------------------------

    fn structural_checks(&self, case: &Case, ctx: &mut CheckContext) {
        ctx.begin_layer();

        ctx.check(
            CheckLayer::Structural,
            "case_name",
            !case.name.is_empty(),
            Severity::Critical,
            "case name must not be empty",
            None,
        );

        ctx.check(
            CheckLayer::Structural,
            "nature_purpose",
            !case.nature.is_empty() && !case.purpose.is_empty(),
            Severity::Error,
            "nature-purpose section with non-empty nature and purpose is required",
            None,
        );

        ctx.check(
            CheckLayer::Structural,
            "client_business_unit",
            !case.cbu_name.is_empty(),
            Severity::Error,
            "client-business-unit section is required",
            None,
        );

        for function in &case.functions {
            ctx.check(
                CheckLayer::Structural,
                "function_vocabulary",
                FunctionAction::try_from(function.name.as_str()).is_ok(),
                Severity::Error,
                &format!("unknown function action '{}'", function.name),
                Some(&function.name),
            );
        }

        match &case.token {
            None => ctx.fail(
                CheckLayer::Structural,
                "kyc_token",
                Severity::Error,
                "kyc-token section is required",
                None,
            ),
            Some(label) => {
                let normalized = label.to_ascii_lowercase();
                ctx.check(
                    CheckLayer::Structural,
                    "token_label",
                    self.token_pattern.is_match(&normalized),
                    Severity::Error,
                    &format!("token label '{label}' is not a recognized lifecycle label"),
                    Some(label),
                );
                ctx.check(
                    CheckLayer::Structural,
                    "token_status_match",
                    normalized == case.status.token_label(),
                    Severity::Error,
                    &format!(
                        "token label '{label}' does not match case status '{}'",
                        case.status
                    ),
                    Some(label),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Layer 2: semantic (ontology and policy registry references)
    // ------------------------------------------------------------------

    fn semantic_checks(&self, case: &Case, ctx: &mut CheckContext) {
        ctx.begin_layer();

        for code in &case.policies {
            ctx.check(
                CheckLayer::Semantic,
                "policy_registry",
                self.policies.contains(code),
                Severity::Error,
                &format!("policy '{code}' is not in the policy registry"),
                Some(code),
            );
        }

        for code in &case.obligations {
            ctx.check(
                CheckLayer::Semantic,
                "obligation_policy",
                self.policies.contains(code),
                Severity::Error,
                &format!("obligation references unknown policy '{code}'"),
                Some(code),
            );
        }

        for entry in &case.data_dictionary {
            ctx.check(
                CheckLayer::Semantic,
                "attribute_reference",
                self.ontology.has_attribute(&entry.attribute_code),
                Severity::Error,
                &format!("attribute '{}' is not in the ontology", entry.attribute_code),
                Some(&entry.attribute_code),
            );
            for doc in [&entry.primary, &entry.secondary, &entry.tertiary]
                .into_iter()
                .flatten()
            {
                ctx.check(
                    CheckLayer::Semantic,
                    "document_reference",
                    self.ontology.has_document(doc),
                    Severity::Error,
                    &format!("document '{doc}' is not in the ontology"),
                    Some(doc),
                );
            }
        }

        for group in &case.document_requirements {
            for doc in &group.documents {
                ctx.check(
                    CheckLayer::Semantic,
                    "document_reference",
                    self.ontology.has_document(&doc.code),
                    Severity::Error,
                    &format!("document '{}' is not in the ontology", doc.code),
                    Some(&doc.code),
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Layer 3: ownership
    // ------------------------------------------------------------------

    fn ownership_checks(&self, case: &Case, ctx: &mut CheckContext) {
        ctx.begin_layer();

        // Nodes attach to the most recent entity node; leading owner nodes
        // attach to the CBU itself.
        let mut issuer = if case.cbu_name.is_empty() {
            case.name.clone()
        } else {
            case.cbu_name.clone()
        };
        let mut sums: Vec<(String, f64)> = Vec::new();

        for node in &case.ownership {
            match node {
                OwnershipNode::Entity { name } => issuer = name.clone(),
                OwnershipNode::Owner { percent, .. }
                | OwnershipNode::BeneficialOwner { percent, .. } => {
                    match sums.iter_mut().find(|(name, _)| *name == issuer) {
                        Some((_, sum)) => *sum += percent,
                        None => sums.push((issuer.clone(), *percent)),
                    }
                    if let OwnershipNode::BeneficialOwner { name, percent } = node {
                        if *percent == 0.0 {
                            ctx.warn(
                                CheckLayer::Ownership,
                                "zero_percent_beneficial_owner",
                                &format!("beneficial owner '{name}' declares 0%"),
                                Some(name),
                            );
                        }
                    }
                }
                OwnershipNode::Controller { .. } => {}
            }
        }

        for (entity, sum) in sums {
            ctx.check(
                CheckLayer::Ownership,
                "ownership_sum",
                sum <= 100.01,
                Severity::Error,
                &format!("ownership of '{entity}' sums to {sum:.2}%, exceeding 100%"),
                Some(&entity),
            );
        }
    }
}

/// Per-report check accumulator.
#[derive(Default)]
struct CheckContext {
    findings: Vec<ValidationFinding>,
    total: u32,
    failed: u32,
    layer_failed: bool,
}

impl CheckContext {
    fn begin_layer(&mut self) {
        self.layer_failed = false;
    }

    fn check(
        &mut self,
        layer: CheckLayer,
        name: &str,
        passed: bool,
        severity: Severity,
        message: &str,
        entity_ref: Option<&str>,
    ) {
        self.total += 1;
        if !passed {
            self.failed += 1;
            self.layer_failed = true;
            self.findings.push(ValidationFinding {
                check_type: layer,
                check_name: name.to_string(),
                status: FindingStatus::Fail,
                message: message.to_string(),
                entity_ref: entity_ref.map(str::to_string),
                severity,
            });
        }
    }

    fn fail(
        &mut self,
        layer: CheckLayer,
        name: &str,
        severity: Severity,
        message: &str,
        entity_ref: Option<&str>,
    ) {
        self.check(layer, name, false, severity, message, entity_ref);
    }

    fn warn(
        &mut self,
        layer: CheckLayer,
        name: &str,
        message: &str,
        entity_ref: Option<&str>,
    ) {
        self.total += 1;
        self.findings.push(ValidationFinding {
            check_type: layer,
            check_name: name.to_string(),
            status: FindingStatus::Warn,
            message: message.to_string(),
            entity_ref: entity_ref.map(str::to_string),
            severity: Severity::Warning,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::bind;
    use crate::ontology_view::InMemoryOntology;
    use crate::parser::parse;

    fn fixture_case(src: &str) -> Case {
        bind(&parse(src).unwrap()).unwrap().cases.remove(0)
    }

    fn fixture_ontology() -> InMemoryOntology {
        InMemoryOntology::default()
            .with_documents(["UBO-DECL", "PASSPORT"])
            .with_attributes(["UBO_NAME"])
    }

    fn registry() -> PolicyRegistry {
        let mut r = PolicyRegistry::with_defaults();
        r.insert("POL-1");
        r
    }

    const VALID: &str = r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
        (client-business-unit C) (function DISCOVER-POLICIES)
        (policy POL-1) (obligation POL-1) (kyc-token "pending"))"#;

    #[test]
    fn valid_case_passes_with_no_findings() {
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(VALID));
        assert!(report.passed, "unexpected findings: {:?}", report.findings);
        assert!(report.findings.is_empty());
        assert_eq!(report.failed_checks, 0);
        assert_eq!(report.passed_checks, report.total_checks);
    }

    #[test]
    fn unknown_function_action_fails_structurally() {
        let src = VALID.replace("DISCOVER-POLICIES", "UNKNOWN-ACTION");
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(&src));

        assert!(!report.passed);
        let finding = &report.findings[0];
        assert_eq!(finding.check_type, CheckLayer::Structural);
        assert_eq!(finding.check_name, "function_vocabulary");
        assert_eq!(finding.status, FindingStatus::Fail);
        assert_eq!(finding.severity, Severity::Error);
        assert_eq!(finding.entity_ref.as_deref(), Some("UNKNOWN-ACTION"));
    }

    #[test]
    fn structural_failure_short_circuits_semantic_layer() {
        // Missing token AND an unknown policy; only the structural finding
        // should be recorded.
        let src = r#"(kyc-case T (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C) (policy NOT-REGISTERED))"#;
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(src));

        assert!(!report.passed);
        assert!(report
            .findings
            .iter()
            .all(|f| f.check_type == CheckLayer::Structural));
    }

    #[test]
    fn unknown_policy_fails_semantically() {
        let src = VALID.replace("(policy POL-1)", "(policy NOT-REGISTERED)");
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(&src));
        assert!(!report.passed);
        assert_eq!(report.findings[0].check_name, "policy_registry");
        assert_eq!(report.findings[0].entity_ref.as_deref(), Some("NOT-REGISTERED"));
    }

    #[test]
    fn unknown_document_in_requirements_fails() {
        let src = r#"(kyc-case T (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C) (kyc-token "pending")
            (document-requirements (jurisdiction LU)
              (required (document NO-SUCH-DOC "Missing"))))"#;
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(src));
        assert!(!report.passed);
        assert_eq!(report.findings[0].check_name, "document_reference");
    }

    #[test]
    fn token_status_mismatch_fails() {
        let mut case = fixture_case(VALID);
        case.token = Some("approved".to_string());
        // status stays Pending
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&case);
        assert!(!report.passed);
        assert!(report
            .findings
            .iter()
            .any(|f| f.check_name == "token_status_match"));
    }

    #[test]
    fn ownership_over_100_percent_fails() {
        let src = r#"(kyc-case T (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C) (kyc-token "pending")
            (ownership-structure (entity H) (owner A 60%) (beneficial-owner B 45%)))"#;
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(src));
        assert!(!report.passed);
        assert_eq!(report.findings[0].check_name, "ownership_sum");
        assert_eq!(report.findings[0].entity_ref.as_deref(), Some("H"));
    }

    #[test]
    fn ownership_within_tolerance_passes() {
        let src = r#"(kyc-case T (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C) (kyc-token "pending")
            (ownership-structure (entity H) (owner A 60%) (owner B 40.005%)))"#;
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        assert!(validator.validate_case(&fixture_case(src)).passed);
    }

    #[test]
    fn zero_percent_beneficial_owner_warns_but_passes() {
        let src = r#"(kyc-case T (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit C) (kyc-token "pending")
            (ownership-structure (entity H) (beneficial-owner B 0%)))"#;
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let report = validator.validate_case(&fixture_case(src));
        assert!(report.passed);
        assert_eq!(report.findings.len(), 1);
        assert_eq!(report.findings[0].status, FindingStatus::Warn);
        assert_eq!(report.findings[0].severity, Severity::Warning);
    }

    #[test]
    fn validate_surfaces_first_failing_case() {
        let ontology = fixture_ontology();
        let policies = registry();
        let validator = Validator::new(&ontology, &policies);
        let bad = fixture_case(&VALID.replace("DISCOVER-POLICIES", "NOPE"));
        let good = fixture_case(VALID);
        let err = validator.validate(&[good, bad]).unwrap_err();
        assert_eq!(err.case_name, "TEST");
        assert!(err.message.contains("unknown function action"));
    }
}
