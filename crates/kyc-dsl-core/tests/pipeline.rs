//! End-to-end tests over the pure pipeline: parse → bind → validate →
//! serialize → re-bind.

use kyc_dsl_core::{
    bind, parse, serialize,
    ontology_view::InMemoryOntology,
    model::{CaseStatus, FunctionAction},
    PolicyRegistry, Validator,
};

const REFERENCE: &str = r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
  (client-business-unit C) (function DISCOVER-POLICIES)
  (policy POL-1) (obligation POL-1) (kyc-token "pending"))"#;

#[test]
fn reference_case_binds_to_expected_fields() {
    let bound = bind(&parse(REFERENCE).unwrap()).unwrap();
    assert_eq!(bound.cases.len(), 1);
    let case = &bound.cases[0];

    assert_eq!(case.name, "TEST");
    assert_eq!(case.nature, "N");
    assert_eq!(case.purpose, "P");
    assert_eq!(case.cbu_name, "C");
    assert_eq!(case.functions.len(), 1);
    assert_eq!(case.functions[0].name, "DISCOVER-POLICIES");
    assert_eq!(case.policies, vec!["POL-1".to_string()]);
    assert_eq!(case.obligations, vec!["POL-1".to_string()]);
    assert_eq!(case.status, CaseStatus::Pending);
    assert_eq!(case.token.as_deref(), Some("pending"));
}

#[test]
fn serialize_then_rebind_yields_the_same_case() {
    let bound = bind(&parse(REFERENCE).unwrap()).unwrap();
    let text = serialize(&bound.cases);
    let rebound = bind(&parse(&text).unwrap()).unwrap();
    assert_eq!(bound.cases, rebound.cases);
}

#[test]
fn validated_pipeline_accepts_the_reference_case() {
    let ontology = InMemoryOntology::default();
    let mut policies = PolicyRegistry::with_defaults();
    policies.insert("POL-1");

    let bound = bind(&parse(REFERENCE).unwrap()).unwrap();
    let validator = Validator::new(&ontology, &policies);
    let reports = validator.validate(&bound.cases).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].passed);
}

#[test]
fn amended_case_survives_the_full_loop() {
    let ontology = InMemoryOntology::default().with_primary_source(
        "UBO_NAME",
        "UBO-DECL",
        "UBO Declaration",
    );
    let mut policies = PolicyRegistry::with_defaults();
    policies.insert("POL-1");

    let mut case = bind(&parse(REFERENCE).unwrap()).unwrap().cases.remove(0);
    kyc_dsl_core::amendments::apply(
        kyc_dsl_core::AmendmentKind::OwnershipDiscovery,
        &mut case,
        &ontology,
        &policies,
    )
    .unwrap();
    assert!(case.has_function(FunctionAction::VerifyOwnership));

    let text = serialize(std::slice::from_ref(&case));
    let rebound = bind(&parse(&text).unwrap()).unwrap().cases.remove(0);
    assert_eq!(case, rebound);

    let validator = Validator::new(&ontology, &policies);
    assert!(validator.validate_case(&rebound).passed);
}
