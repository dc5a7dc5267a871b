//! Named amendment mutators.
//!
//! An amendment is a pure transition over a [`Case`]; the engine crate wraps
//! these in the load → mutate → validate → serialize → save protocol. The
//! set of names is closed: the wire form is the kebab-case string, the
//! in-process form is [`AmendmentKind`] so every dispatch is exhaustive.

use thiserror::Error;

use crate::model::{Case, CaseStatus, FunctionAction, OwnershipNode};
use crate::ontology_view::OntologyView;
use crate::policy::{PolicyRegistry, GLOBAL_JURISDICTION};

#[derive(Debug, Error)]
pub enum AmendmentError {
    #[error("unknown amendment '{0}'")]
    Unknown(String),

    #[error("invalid transition: cannot {attempted} a case in status '{from}'")]
    InvalidTransition {
        from: CaseStatus,
        attempted: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmendmentKind {
    PolicyDiscovery,
    DocumentSolicitation,
    DocumentDiscovery,
    OwnershipDiscovery,
    RiskAssessment,
    RegulatorNotify,
    Approve,
    Decline,
    Review,
}

impl AmendmentKind {
    pub const ALL: [AmendmentKind; 9] = [
        AmendmentKind::PolicyDiscovery,
        AmendmentKind::DocumentSolicitation,
        AmendmentKind::DocumentDiscovery,
        AmendmentKind::OwnershipDiscovery,
        AmendmentKind::RiskAssessment,
        AmendmentKind::RegulatorNotify,
        AmendmentKind::Approve,
        AmendmentKind::Decline,
        AmendmentKind::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AmendmentKind::PolicyDiscovery => "policy-discovery",
            AmendmentKind::DocumentSolicitation => "document-solicitation",
            AmendmentKind::DocumentDiscovery => "document-discovery",
            AmendmentKind::OwnershipDiscovery => "ownership-discovery",
            AmendmentKind::RiskAssessment => "risk-assessment",
            AmendmentKind::RegulatorNotify => "regulator-notify",
            AmendmentKind::Approve => "approve",
            AmendmentKind::Decline => "decline",
            AmendmentKind::Review => "review",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AmendmentKind::PolicyDiscovery => {
                "Add the policy discovery function and the jurisdiction's default policies"
            }
            AmendmentKind::DocumentSolicitation => {
                "Add the document solicitation function and obligations mirroring policies"
            }
            AmendmentKind::DocumentDiscovery => {
                "Auto-populate document requirements from the ontology's primary sources"
            }
            AmendmentKind::OwnershipDiscovery => {
                "Add the ownership verification function and seed the ownership structure"
            }
            AmendmentKind::RiskAssessment => "Add the risk assessment function",
            AmendmentKind::RegulatorNotify => "Add the regulator notification function",
            AmendmentKind::Approve => "Finalize the case as approved",
            AmendmentKind::Decline => "Finalize the case as declined",
            AmendmentKind::Review => "Send the case to review",
        }
    }

    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            AmendmentKind::PolicyDiscovery => &["jurisdiction"],
            AmendmentKind::DocumentDiscovery => &["jurisdiction"],
            _ => &[],
        }
    }
}

impl std::fmt::Display for AmendmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AmendmentKind {
    type Error = AmendmentError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == value)
            .ok_or_else(|| AmendmentError::Unknown(value.to_string()))
    }
}

/// Apply one amendment to a case in place.
pub fn apply(
    kind: AmendmentKind,
    case: &mut Case,
    ontology: &dyn OntologyView,
    policies: &PolicyRegistry,
) -> Result<(), AmendmentError> {
    match kind {
        AmendmentKind::PolicyDiscovery => {
            case.add_function(FunctionAction::DiscoverPolicies);
            let jurisdiction = case_jurisdiction(case).to_string();
            for code in policies.defaults_for(&jurisdiction) {
                if !case.policies.contains(code) {
                    case.policies.push(code.clone());
                }
            }
        }
        AmendmentKind::DocumentSolicitation => {
            case.add_function(FunctionAction::SolicitDocuments);
            let missing: Vec<String> = case
                .policies
                .iter()
                .filter(|p| !case.obligations.contains(p))
                .cloned()
                .collect();
            case.obligations.extend(missing);
        }
        AmendmentKind::DocumentDiscovery => {
            let jurisdiction = case_jurisdiction(case).to_string();
            let attributes: Vec<String> = case
                .data_dictionary
                .iter()
                .map(|e| e.attribute_code.clone())
                .collect();
            for attribute in attributes {
                let Some(doc) = ontology.primary_document(&attribute) else {
                    continue;
                };
                let group = case.requirement_group_mut(&jurisdiction);
                if !group.documents.iter().any(|d| d.code == doc.code) {
                    group.documents.push(crate::model::DocumentRef {
                        code: doc.code,
                        name: doc.name,
                    });
                }
            }
        }
        AmendmentKind::OwnershipDiscovery => {
            case.add_function(FunctionAction::VerifyOwnership);
            if case.ownership.is_empty() && !case.cbu_name.is_empty() {
                case.ownership.push(OwnershipNode::Entity {
                    name: case.cbu_name.clone(),
                });
            }
        }
        AmendmentKind::RiskAssessment => {
            case.add_function(FunctionAction::AssessRisk);
        }
        AmendmentKind::RegulatorNotify => {
            case.add_function(FunctionAction::RegulatorNotify);
        }
        AmendmentKind::Approve => {
            if case.status == CaseStatus::Declined {
                return Err(AmendmentError::InvalidTransition {
                    from: case.status,
                    attempted: "approve",
                });
            }
            case.set_status(CaseStatus::Approved);
        }
        AmendmentKind::Decline => {
            case.set_status(CaseStatus::Declined);
        }
        AmendmentKind::Review => {
            case.set_status(CaseStatus::Review);
        }
    }
    Ok(())
}

/// The jurisdiction an amendment operates in: the first requirement group's,
/// falling back to the global set.
pub fn case_jurisdiction(case: &Case) -> &str {
    case.document_requirements
        .first()
        .map(|g| g.jurisdiction.as_str())
        .unwrap_or(GLOBAL_JURISDICTION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::bind;
    use crate::ontology_view::InMemoryOntology;
    use crate::parser::parse;

    fn fixture() -> Case {
        let src = r#"(kyc-case TEST (nature-purpose (nature "N") (purpose "P"))
            (client-business-unit ACME) (policy CDD-STANDARD) (kyc-token "pending"))"#;
        bind(&parse(src).unwrap()).unwrap().cases.remove(0)
    }

    #[test]
    fn wire_names_round_trip() {
        for kind in AmendmentKind::ALL {
            assert_eq!(AmendmentKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(matches!(
            AmendmentKind::try_from("not-an-amendment"),
            Err(AmendmentError::Unknown(_))
        ));
    }

    #[test]
    fn policy_discovery_adds_function_and_default_policies() {
        let mut case = fixture();
        let ontology = InMemoryOntology::default();
        let policies = PolicyRegistry::with_defaults();
        apply(AmendmentKind::PolicyDiscovery, &mut case, &ontology, &policies).unwrap();

        assert!(case.has_function(FunctionAction::DiscoverPolicies));
        assert!(case.policies.contains(&"CIP-VERIFY".to_string()));
        // Already-present code is not duplicated.
        assert_eq!(
            case.policies.iter().filter(|p| *p == "CDD-STANDARD").count(),
            1
        );
    }

    #[test]
    fn document_solicitation_mirrors_policies_into_obligations() {
        let mut case = fixture();
        let ontology = InMemoryOntology::default();
        let policies = PolicyRegistry::with_defaults();
        apply(
            AmendmentKind::DocumentSolicitation,
            &mut case,
            &ontology,
            &policies,
        )
        .unwrap();

        assert!(case.has_function(FunctionAction::SolicitDocuments));
        assert_eq!(case.obligations, vec!["CDD-STANDARD"]);

        // Reapplying changes nothing.
        let before = case.clone();
        apply(
            AmendmentKind::DocumentSolicitation,
            &mut case,
            &ontology,
            &policies,
        )
        .unwrap();
        assert_eq!(case, before);
    }

    #[test]
    fn document_discovery_pulls_primary_sources() {
        let mut case = fixture();
        case.data_dictionary.push(crate::model::AttributeSource {
            attribute_code: "UBO_NAME".into(),
            primary: None,
            secondary: None,
            tertiary: None,
        });
        let ontology = InMemoryOntology::default().with_primary_source(
            "UBO_NAME",
            "UBO-DECL",
            "UBO Declaration",
        );
        let policies = PolicyRegistry::with_defaults();

        apply(AmendmentKind::DocumentDiscovery, &mut case, &ontology, &policies).unwrap();
        let group = &case.document_requirements[0];
        assert_eq!(group.jurisdiction, GLOBAL_JURISDICTION);
        assert_eq!(group.documents[0].code, "UBO-DECL");

        // Second application finds the document already present.
        let before = case.clone();
        apply(AmendmentKind::DocumentDiscovery, &mut case, &ontology, &policies).unwrap();
        assert_eq!(case, before);
    }

    #[test]
    fn document_discovery_with_empty_ontology_is_a_no_op() {
        let mut case = fixture();
        let ontology = InMemoryOntology::default();
        let policies = PolicyRegistry::with_defaults();
        let before = case.clone();
        apply(AmendmentKind::DocumentDiscovery, &mut case, &ontology, &policies).unwrap();
        assert_eq!(case, before);
    }

    #[test]
    fn ownership_discovery_seeds_root_entity() {
        let mut case = fixture();
        let ontology = InMemoryOntology::default();
        let policies = PolicyRegistry::with_defaults();
        apply(AmendmentKind::OwnershipDiscovery, &mut case, &ontology, &policies).unwrap();

        assert!(case.has_function(FunctionAction::VerifyOwnership));
        assert_eq!(
            case.ownership,
            vec![OwnershipNode::Entity { name: "ACME".into() }]
        );
    }

    #[test]
    fn approve_after_decline_is_rejected() {
        let mut case = fixture();
        let ontology = InMemoryOntology::default();
        let policies = PolicyRegistry::with_defaults();
        apply(AmendmentKind::Decline, &mut case, &ontology, &policies).unwrap();
        assert_eq!(case.token.as_deref(), Some("declined"));

        let err = apply(AmendmentKind::Approve, &mut case, &ontology, &policies).unwrap_err();
        assert!(matches!(
            err,
            AmendmentError::InvalidTransition { from: CaseStatus::Declined, .. }
        ));
    }

    #[test]
    fn lifecycle_transitions_update_token() {
        let mut case = fixture();
        let ontology = InMemoryOntology::default();
        let policies = PolicyRegistry::with_defaults();

        apply(AmendmentKind::Review, &mut case, &ontology, &policies).unwrap();
        assert_eq!(case.status, CaseStatus::Review);
        assert_eq!(case.token.as_deref(), Some("review"));

        apply(AmendmentKind::Approve, &mut case, &ontology, &policies).unwrap();
        assert_eq!(case.status, CaseStatus::Approved);
        assert_eq!(case.token.as_deref(), Some("approved"));
    }
}
