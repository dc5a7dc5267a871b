//! Ontology entity models.
//!
//! Codes are the primary identifiers throughout; every cross-reference is a
//! code, resolved against the in-memory catalog. Enumerated columns are
//! stored as text and parsed on load.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A regulation a document can trace back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regulation {
    pub code: String,
    pub name: String,
    pub jurisdiction: String,
    pub authority: String,
    pub description: String,
    pub effective_from: Option<NaiveDate>,
    pub effective_to: Option<NaiveDate>,
}

/// Where a document originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Official,
    Client,
    Operational,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Official => "Official",
            SourceType::Client => "Client",
            SourceType::Operational => "Operational",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Official" => Some(SourceType::Official),
            "Client" => Some(SourceType::Client),
            "Operational" => Some(SourceType::Operational),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub code: String,
    pub name: String,
    pub domain: String,
    pub jurisdiction: String,
    pub regulation_code: String,
    pub source_type: SourceType,
    pub validity_years: i32,
    pub description: String,
    pub title: Option<String>,
    pub doc_type: Option<String>,
}

/// Public attributes are observable from documents; private attributes are
/// computed from public ones via derivation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeClass {
    Public,
    Private,
}

impl AttributeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeClass::Public => "Public",
            AttributeClass::Private => "Private",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Public" => Some(AttributeClass::Public),
            "Private" => Some(AttributeClass::Private),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    pub code: String,
    pub name: String,
    pub domain: String,
    pub description: String,
    pub risk_category: String,
    pub is_personal_data: bool,
    pub attribute_class: AttributeClass,
}

/// Evidence tier of an attribute→document link. Ordering is tier rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceTier {
    Primary,
    Secondary,
    Tertiary,
}

impl SourceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTier::Primary => "Primary",
            SourceTier::Secondary => "Secondary",
            SourceTier::Tertiary => "Tertiary",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Primary" => Some(SourceTier::Primary),
            "Secondary" => Some(SourceTier::Secondary),
            "Tertiary" => Some(SourceTier::Tertiary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDocumentLink {
    pub attribute_code: String,
    pub document_code: String,
    pub source_tier: SourceTier,
    pub is_mandatory: bool,
    pub jurisdiction: String,
    pub regulation_code: String,
    pub notes: String,
    /// Feedback-adjusted ranking weight in [0, 1].
    pub relevance_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRegulationLink {
    pub document_code: String,
    pub regulation_code: String,
    pub applicability: String,
    pub jurisdiction: String,
}

/// Rule deriving a private attribute from a public source. The rule
/// expression is opaque; it is never evaluated here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDerivation {
    pub derived_code: String,
    pub source_code: String,
    pub rule_expression: String,
    pub rule_type: String,
    pub description: String,
}
