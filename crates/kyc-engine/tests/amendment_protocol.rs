//! Protocol tests for the amendment engine over an in-memory store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use kyc_case_store::{CaseStore, SavedVersion, StoreError};
use kyc_dsl_core::amendments::{AmendmentError, AmendmentKind};
use kyc_dsl_core::policy::PolicyRegistry;
use kyc_dsl_core::validator::ValidationReport;
use kyc_engine::{AmendmentEngine, CaseVersionPort, EngineError, SYSTEM_ACTOR};
use kyc_ontology::OntologyCatalog;

const SEED: &str = r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
  (client-business-unit C) (function DISCOVER-POLICIES)
  (policy CDD-STANDARD) (kyc-token "pending"))"#;

#[derive(Default)]
struct MemState {
    versions: Vec<(String, i32, String, String, String)>,
    amendments: Vec<(String, i32, String, String, String)>,
    validations: Vec<ValidationReport>,
    fail_audit: bool,
}

#[derive(Default)]
struct MemStore {
    state: Mutex<MemState>,
}

impl MemStore {
    fn latest(&self, name: &str) -> Option<(i32, String, String)> {
        let state = self.state.lock().unwrap();
        state
            .versions
            .iter()
            .filter(|(n, ..)| n == name)
            .max_by_key(|(_, v, ..)| *v)
            .map(|(_, v, dsl, hash, _)| (*v, dsl.clone(), hash.clone()))
    }

    fn amendment_count(&self) -> usize {
        self.state.lock().unwrap().amendments.len()
    }
}

#[async_trait]
impl CaseVersionPort for MemStore {
    async fn latest_dsl(&self, name: &str) -> Result<String, StoreError> {
        self.latest(name)
            .map(|(_, dsl, _)| dsl)
            .ok_or_else(|| StoreError::not_found("case", name))
    }

    async fn save_version(
        &self,
        name: &str,
        dsl_snapshot: &str,
        status: &str,
    ) -> Result<SavedVersion, StoreError> {
        let hash = CaseStore::hash_snapshot(dsl_snapshot);
        if let Some((version, _, latest_hash)) = self.latest(name) {
            if latest_hash == hash {
                return Ok(SavedVersion {
                    version,
                    sha256_hash: hash,
                    created: false,
                });
            }
        }
        let mut state = self.state.lock().unwrap();
        let version = state
            .versions
            .iter()
            .filter(|(n, ..)| n == name)
            .map(|(_, v, ..)| *v)
            .max()
            .unwrap_or(0)
            + 1;
        state.versions.push((
            name.to_string(),
            version,
            dsl_snapshot.to_string(),
            hash.clone(),
            status.to_string(),
        ));
        Ok(SavedVersion {
            version,
            sha256_hash: hash,
            created: true,
        })
    }

    async fn record_amendment(
        &self,
        name: &str,
        new_version: i32,
        amendment_type: &str,
        actor: &str,
        note: &str,
    ) -> Result<(), StoreError> {
        self.state.lock().unwrap().amendments.push((
            name.to_string(),
            new_version,
            amendment_type.to_string(),
            actor.to_string(),
            note.to_string(),
        ));
        Ok(())
    }

    async fn record_validation(
        &self,
        report: &ValidationReport,
        _actor: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_audit {
            return Err(StoreError::Conflict("audit table unavailable".to_string()));
        }
        state.validations.push(report.clone());
        Ok(())
    }
}

fn engine_with(store: Arc<MemStore>) -> AmendmentEngine {
    AmendmentEngine::new(
        store,
        Arc::new(OntologyCatalog::default()),
        Arc::new(PolicyRegistry::with_defaults()),
    )
}

#[tokio::test]
async fn submission_creates_version_one() {
    let store = Arc::new(MemStore::default());
    let engine = engine_with(Arc::clone(&store));

    let outcomes = engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].version, 1);
    assert!(!outcomes[0].no_op);

    // Resubmitting the identical case collapses onto version 1.
    let again = engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();
    assert_eq!(again[0].version, 1);
    assert!(again[0].no_op);
}

#[tokio::test]
async fn amendment_is_append_only_and_idempotent() {
    let store = Arc::new(MemStore::default());
    let engine = engine_with(Arc::clone(&store));
    engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();
    let (v1, _, h1) = store.latest("TEST").unwrap();
    assert_eq!(v1, 1);

    // With an empty ontology the mutator still adds SOLICIT-DOCUMENTS and
    // mirrors the policy into an obligation, so the text changes.
    let first = engine
        .apply_amendment("TEST", AmendmentKind::DocumentSolicitation, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert_eq!(first.version, 2);
    assert!(!first.no_op);
    assert_ne!(first.sha256_hash, h1);
    assert!(first.updated_dsl.contains("(function SOLICIT-DOCUMENTS)"));
    assert_eq!(store.amendment_count(), 1);

    // Reapplying yields identical text: same (v, h), no new log entry.
    let second = engine
        .apply_amendment("TEST", AmendmentKind::DocumentSolicitation, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert_eq!(second.version, 2);
    assert!(second.no_op);
    assert_eq!(second.sha256_hash, first.sha256_hash);
    assert_eq!(store.amendment_count(), 1);
}

#[tokio::test]
async fn approve_after_decline_is_an_invalid_transition() {
    let store = Arc::new(MemStore::default());
    let engine = engine_with(Arc::clone(&store));
    engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();

    engine
        .apply_amendment("TEST", AmendmentKind::Decline, SYSTEM_ACTOR)
        .await
        .unwrap();

    let err = engine
        .apply_amendment("TEST", AmendmentKind::Approve, SYSTEM_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Amendment(AmendmentError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn panicking_mutator_becomes_amendment_failure() {
    let store = Arc::new(MemStore::default());
    let engine = engine_with(Arc::clone(&store));
    engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();
    let before = store.latest("TEST").unwrap();

    let err = engine
        .apply_mutation("TEST", "exploding-step", SYSTEM_ACTOR, |_case| {
            panic!("boom")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AmendmentFailure(_)));

    // Nothing was persisted.
    assert_eq!(store.latest("TEST").unwrap(), before);
    assert_eq!(store.amendment_count(), 0);
}

#[tokio::test]
async fn invalid_mutation_is_rejected_by_validation() {
    let store = Arc::new(MemStore::default());
    let engine = engine_with(Arc::clone(&store));
    engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();

    let err = engine
        .apply_mutation("TEST", "bad-step", SYSTEM_ACTOR, |case| {
            case.functions.push(kyc_dsl_core::model::CaseFunction {
                name: "NOT-A-FUNCTION".to_string(),
                status: Default::default(),
            });
            Ok(())
        })
        .await
        .unwrap_err();

    match err {
        EngineError::Rejected { report, .. } => {
            assert!(report
                .findings
                .iter()
                .any(|f| f.check_name == "function_vocabulary"));
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
    assert_eq!(store.latest("TEST").unwrap().0, 1);
}

#[tokio::test]
async fn audit_failure_does_not_block_the_amendment() {
    let store = Arc::new(MemStore::default());
    store.state.lock().unwrap().fail_audit = true;
    let engine = engine_with(Arc::clone(&store));

    // Submission also audits best-effort.
    let outcomes = engine.submit(SEED, SYSTEM_ACTOR).await.unwrap();
    assert!(outcomes[0].audit_error.is_some());

    let outcome = engine
        .apply_amendment("TEST", AmendmentKind::RiskAssessment, SYSTEM_ACTOR)
        .await
        .unwrap();
    assert!(outcome.audit_error.is_some());
    assert_eq!(outcome.version, 2);
}

#[tokio::test]
async fn unknown_case_is_not_found() {
    let store = Arc::new(MemStore::default());
    let engine = engine_with(store);
    let err = engine
        .apply_amendment("GHOST", AmendmentKind::Review, SYSTEM_ACTOR)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(StoreError::NotFound { .. })));
}
