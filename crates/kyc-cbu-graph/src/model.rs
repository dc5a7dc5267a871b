//! Graph data shapes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEntity {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub jurisdiction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRole {
    pub entity_id: String,
    pub role: String,
}

/// Directed, typed edge set of the ownership/control graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Owns,
    Controls,
    Delegates,
    ReportsTo,
    Custodies,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::Owns => "owns",
            RelationType::Controls => "controls",
            RelationType::Delegates => "delegates",
            RelationType::ReportsTo => "reports_to",
            RelationType::Custodies => "custodies",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "owns" => Some(RelationType::Owns),
            "controls" => Some(RelationType::Controls),
            "delegates" => Some(RelationType::Delegates),
            "reports_to" => Some(RelationType::ReportsTo),
            "custodies" => Some(RelationType::Custodies),
            _ => None,
        }
    }

    /// Edges that carry beneficial control.
    pub fn carries_control(&self) -> bool {
        matches!(self, RelationType::Owns | RelationType::Controls)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    pub from_id: String,
    pub to_id: String,
    pub relation_type: RelationType,
    pub control_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CbuGraph {
    pub cbu_id: String,
    pub name: String,
    pub entities: Vec<GraphEntity>,
    pub roles: Vec<GraphRole>,
    pub relationships: Vec<GraphRelationship>,
}

impl CbuGraph {
    pub fn entity(&self, id: &str) -> Option<&GraphEntity> {
        self.entities.iter().find(|e| e.id == id)
    }
}
