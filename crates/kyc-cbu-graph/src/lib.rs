//! CBU ownership graph.
//!
//! Entities and relationships live in owning collections keyed by string
//! id; adjacency is computed on demand. The repository loads a graph per
//! CBU; analysis (validation, control chains) is pure.

pub mod analysis;
pub mod error;
pub mod model;
pub mod repository;

pub use analysis::{validate_graph, control_chain, relationships_of, ControlChain, GraphIssue, GraphValidation, IssueSeverity};
pub use error::GraphError;
pub use model::{CbuGraph, GraphEntity, GraphRelationship, GraphRole, RelationType};
pub use repository::GraphRepository;
