//! Retrieval and feedback data shapes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Medium => "MEDIUM",
            RiskLevel::High => "HIGH",
            RiskLevel::Critical => "CRITICAL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(RiskLevel::Low),
            "MEDIUM" => Some(RiskLevel::Medium),
            "HIGH" => Some(RiskLevel::High),
            "CRITICAL" => Some(RiskLevel::Critical),
            _ => None,
        }
    }
}

/// Semantic profile of an attribute, the unit of vector search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeMetadata {
    pub attribute_code: String,
    pub synonyms: Vec<String>,
    pub data_type: String,
    pub domain_values: Vec<String>,
    pub risk_level: RiskLevel,
    pub example_values: Vec<String>,
    pub regulatory_citations: Vec<String>,
    pub business_context: String,
    pub data_sensitivity: String,
    pub retention_period_days: Option<i32>,
}

/// One vector search hit over attribute metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSearchResult {
    pub attribute: AttributeMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

/// Document joined through an attribute-document link, ranked by the
/// feedback-adjusted relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedDocument {
    pub code: String,
    pub name: String,
    pub source_tier: String,
    pub is_mandatory: bool,
    pub jurisdiction: String,
    pub relevance_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedRegulation {
    pub code: String,
    pub name: String,
    pub jurisdiction: String,
    pub relevance_score: f32,
}

/// Attribute hit enriched with its evidence documents and regulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiModalResult {
    pub attribute: AttributeSearchResult,
    pub documents: Vec<LinkedDocument>,
    pub regulations: Vec<LinkedRegulation>,
}

/// Vector search hit over documents or regulations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSearchHit {
    pub code: String,
    pub name: String,
    pub jurisdiction: String,
    pub similarity_score: f32,
    pub distance: f32,
}

/// Snippet-level hit inside a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSectionHit {
    pub document_code: String,
    pub section_number: String,
    pub section_title: String,
    pub text_excerpt: String,
    pub page_number: Option<i32>,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecommendation {
    pub cluster_code: String,
    pub cluster_name: String,
    pub similarity: f32,
    pub member_count: i32,
}

/// Embedding coverage and risk distribution for the stats endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagStats {
    pub total: i64,
    pub with_embeddings: i64,
    pub coverage_percent: f64,
    pub risk_distribution: Vec<RiskBucket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBucket {
    pub risk_level: String,
    pub count: i64,
}

// ----------------------------------------------------------------------
// Feedback
// ----------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }

    /// Direction of the relevance adjustment.
    pub fn sign(&self) -> f32 {
        match self {
            Sentiment::Positive => 1.0,
            Sentiment::Negative => -1.0,
            Sentiment::Neutral => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Human,
    Ai,
    Automated,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentType::Human => "human",
            AgentType::Ai => "ai",
            AgentType::Automated => "automated",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "human" => Some(AgentType::Human),
            "ai" => Some(AgentType::Ai),
            "automated" => Some(AgentType::Automated),
            _ => None,
        }
    }
}

/// Insert-only feedback record. At least one of the entity codes must be
/// populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Option<i64>,
    pub query_text: String,
    pub attribute_code: Option<String>,
    pub document_code: Option<String>,
    pub regulation_code: Option<String>,
    pub sentiment: Sentiment,
    pub confidence: f32,
    pub agent_name: Option<String>,
    pub agent_type: AgentType,
    pub created_at: Option<DateTime<Utc>>,
}

impl FeedbackEntry {
    pub fn has_target(&self) -> bool {
        self.attribute_code.is_some()
            || self.document_code.is_some()
            || self.regulation_code.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummaryRow {
    pub sentiment: String,
    pub agent_type: String,
    pub count: i64,
    pub avg_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeFeedbackRow {
    pub attribute_code: String,
    pub sentiment: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentTrendPoint {
    pub day: NaiveDate,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackAnalytics {
    pub total: i64,
    pub positive: i64,
    pub negative: i64,
    pub neutral: i64,
    pub avg_confidence: f64,
    pub by_agent_type: Vec<(String, i64)>,
    pub top_attributes: Vec<AttributeFeedbackRow>,
    pub recent: Vec<FeedbackEntry>,
    pub sentiment_trend: Vec<SentimentTrendPoint>,
}
