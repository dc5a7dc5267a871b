//! Typed case model bound from the DSL.
//!
//! A [`Case`] is the root entity of the pipeline. The binder produces these
//! from parsed S-expressions; the validator checks them against the ontology
//! and policy registry; the serializer turns them back into canonical DSL
//! text. Observable-field equality is the round-trip contract, so every
//! collection keeps its insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Case lifecycle status. The `kyc-token` label is the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    #[default]
    Pending,
    Approved,
    Declined,
    Review,
}

impl CaseStatus {
    /// Canonical lowercase token label.
    pub fn token_label(&self) -> &'static str {
        match self {
            CaseStatus::Pending => "pending",
            CaseStatus::Approved => "approved",
            CaseStatus::Declined => "declined",
            CaseStatus::Review => "review",
        }
    }

    /// Parse a token label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_ascii_lowercase().as_str() {
            "pending" => Some(CaseStatus::Pending),
            "approved" => Some(CaseStatus::Approved),
            "declined" => Some(CaseStatus::Declined),
            "review" => Some(CaseStatus::Review),
            _ => None,
        }
    }
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token_label())
    }
}

/// Closed vocabulary of case function actions.
///
/// The bound model keeps the raw string (unknown actions are a validation
/// finding, not a bind failure); this enum is the semantic vocabulary used
/// by the validator and the amendment mutators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionAction {
    DiscoverPolicies,
    SolicitDocuments,
    ExtractData,
    VerifyOwnership,
    AssessRisk,
    RegulatorNotify,
}

impl FunctionAction {
    pub const ALL: [FunctionAction; 6] = [
        FunctionAction::DiscoverPolicies,
        FunctionAction::SolicitDocuments,
        FunctionAction::ExtractData,
        FunctionAction::VerifyOwnership,
        FunctionAction::AssessRisk,
        FunctionAction::RegulatorNotify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionAction::DiscoverPolicies => "DISCOVER-POLICIES",
            FunctionAction::SolicitDocuments => "SOLICIT-DOCUMENTS",
            FunctionAction::ExtractData => "EXTRACT-DATA",
            FunctionAction::VerifyOwnership => "VERIFY-OWNERSHIP",
            FunctionAction::AssessRisk => "ASSESS-RISK",
            FunctionAction::RegulatorNotify => "REGULATOR-NOTIFY",
        }
    }
}

impl std::fmt::Display for FunctionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for FunctionAction {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == value)
            .ok_or_else(|| format!("unknown function action '{value}'"))
    }
}

/// A `(function ACTION)` entry. The name is kept as bound; vocabulary
/// membership is a structural validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseFunction {
    pub name: String,
    #[serde(default)]
    pub status: FunctionStatus,
}

impl CaseFunction {
    pub fn new(action: FunctionAction) -> Self {
        Self {
            name: action.as_str().to_string(),
            status: FunctionStatus::Pending,
        }
    }
}

/// Per-function execution status. Not part of the wire grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FunctionStatus {
    #[default]
    Pending,
    Complete,
}

/// One node of the ownership structure. Exactly one role per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum OwnershipNode {
    /// An issuing entity; subsequent owner/beneficial-owner nodes attach to it.
    Entity { name: String },
    Owner { name: String, percent: f64 },
    BeneficialOwner { name: String, percent: f64 },
    Controller { name: String, role: String },
}

/// Primary/secondary/tertiary document sources for one data-dictionary
/// attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSource {
    pub attribute_code: String,
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub tertiary: Option<String>,
}

/// A document reference inside a requirement group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub code: String,
    pub name: String,
}

/// Required documents grouped by jurisdiction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRequirement {
    pub jurisdiction: String,
    pub documents: Vec<DocumentRef>,
}

/// The root entity of the DSL pipeline: one KYC assessment for a named
/// client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Case {
    pub name: String,
    pub nature: String,
    pub purpose: String,
    pub cbu_name: String,
    pub status: CaseStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub version: i32,
    pub policies: Vec<String>,
    pub obligations: Vec<String>,
    pub functions: Vec<CaseFunction>,
    pub ownership: Vec<OwnershipNode>,
    pub data_dictionary: Vec<AttributeSource>,
    pub document_requirements: Vec<DocumentRequirement>,
    /// Lifecycle token label; matches `status` for a valid case.
    pub token: Option<String>,
}

impl Case {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether the case carries the given function action.
    pub fn has_function(&self, action: FunctionAction) -> bool {
        self.functions.iter().any(|f| f.name == action.as_str())
    }

    /// Append a function action if absent. Returns true when added.
    pub fn add_function(&mut self, action: FunctionAction) -> bool {
        if self.has_function(action) {
            return false;
        }
        self.functions.push(CaseFunction::new(action));
        true
    }

    /// Set the lifecycle status and keep the token label in lock-step.
    pub fn set_status(&mut self, status: CaseStatus) {
        self.status = status;
        self.token = Some(status.token_label().to_string());
    }

    /// The requirement group for a jurisdiction, creating it when missing.
    pub fn requirement_group_mut(&mut self, jurisdiction: &str) -> &mut DocumentRequirement {
        if let Some(idx) = self
            .document_requirements
            .iter()
            .position(|r| r.jurisdiction == jurisdiction)
        {
            return &mut self.document_requirements[idx];
        }
        self.document_requirements.push(DocumentRequirement {
            jurisdiction: jurisdiction.to_string(),
            documents: Vec::new(),
        });
        self.document_requirements.last_mut().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_label_round_trip() {
        for status in [
            CaseStatus::Pending,
            CaseStatus::Approved,
            CaseStatus::Declined,
            CaseStatus::Review,
        ] {
            assert_eq!(CaseStatus::from_label(status.token_label()), Some(status));
        }
        assert_eq!(CaseStatus::from_label("APPROVED"), Some(CaseStatus::Approved));
        assert_eq!(CaseStatus::from_label("unknown"), None);
    }

    #[test]
    fn function_action_vocabulary() {
        assert_eq!(
            FunctionAction::try_from("DISCOVER-POLICIES"),
            Ok(FunctionAction::DiscoverPolicies)
        );
        assert!(FunctionAction::try_from("UNKNOWN-ACTION").is_err());
    }

    #[test]
    fn add_function_is_idempotent() {
        let mut case = Case::new("TEST");
        assert!(case.add_function(FunctionAction::AssessRisk));
        assert!(!case.add_function(FunctionAction::AssessRisk));
        assert_eq!(case.functions.len(), 1);
    }

    #[test]
    fn set_status_updates_token() {
        let mut case = Case::new("TEST");
        case.set_status(CaseStatus::Approved);
        assert_eq!(case.token.as_deref(), Some("approved"));
    }
}
