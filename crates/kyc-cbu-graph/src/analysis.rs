//! Pure graph analysis: structural validation and control-chain tracing.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::Serialize;

use crate::error::GraphError;
use crate::model::{CbuGraph, GraphRelationship, RelationType};

/// Incoming `owns` tolerance band: above the upper bound is an error,
/// strictly inside (0, lower) is an incomplete-structure warning.
const OWNS_UPPER: f64 = 100.01;
const OWNS_LOWER: f64 = 99.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphValidation {
    pub valid: bool,
    pub issues: Vec<GraphIssue>,
    /// Largest per-entity incoming `owns` sum; a quick over-allocation
    /// signal for the caller.
    pub total_control_pct: f64,
}

/// One hop of a control chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainLink {
    pub from_id: String,
    pub to_id: String,
    pub relation_type: RelationType,
    pub control_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlChain {
    pub chain: Vec<ChainLink>,
    pub effective_control_pct: f64,
}

/// In/out edges of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRelationships {
    pub inbound: Vec<GraphRelationship>,
    pub outbound: Vec<GraphRelationship>,
}

pub fn relationships_of(graph: &CbuGraph, entity_id: &str) -> Result<EntityRelationships, GraphError> {
    if graph.entity(entity_id).is_none() {
        return Err(GraphError::not_found("entity", entity_id));
    }
    Ok(EntityRelationships {
        inbound: graph
            .relationships
            .iter()
            .filter(|r| r.to_id == entity_id)
            .cloned()
            .collect(),
        outbound: graph
            .relationships
            .iter()
            .filter(|r| r.from_id == entity_id)
            .cloned()
            .collect(),
    })
}

/// Structural validation: dangling edge endpoints and out-of-range
/// percentages are errors; incomplete ownership, self-loops and ownership
/// cycles are warnings.
pub fn validate_graph(graph: &CbuGraph) -> GraphValidation {
    let mut issues = Vec::new();
    let ids: BTreeSet<&str> = graph.entities.iter().map(|e| e.id.as_str()).collect();

    let mut incoming_owns: BTreeMap<&str, f64> = BTreeMap::new();

    for rel in &graph.relationships {
        if !ids.contains(rel.from_id.as_str()) {
            issues.push(error(format!(
                "relationship references unknown entity '{}'",
                rel.from_id
            )));
        }
        if !ids.contains(rel.to_id.as_str()) {
            issues.push(error(format!(
                "relationship references unknown entity '{}'",
                rel.to_id
            )));
        }
        if !(0.0..=100.0).contains(&rel.control_pct) {
            issues.push(error(format!(
                "{} edge {} -> {} has control_pct {} outside [0, 100]",
                rel.relation_type.as_str(),
                rel.from_id,
                rel.to_id,
                rel.control_pct
            )));
        }
        if rel.from_id == rel.to_id {
            issues.push(warning(format!(
                "entity '{}' has a self-referencing {} edge",
                rel.from_id,
                rel.relation_type.as_str()
            )));
        }
        if rel.relation_type == RelationType::Owns {
            *incoming_owns.entry(rel.to_id.as_str()).or_default() += rel.control_pct;
        }
    }

    let mut total_control_pct: f64 = 0.0;
    for (entity, sum) in &incoming_owns {
        total_control_pct = total_control_pct.max(*sum);
        if *sum > OWNS_UPPER {
            issues.push(error(format!(
                "entity '{entity}' is owned {sum:.2}%, exceeding 100%"
            )));
        } else if *sum > 0.0 && *sum < OWNS_LOWER {
            issues.push(warning(format!(
                "entity '{entity}' ownership sums to {sum:.2}%, structure may be incomplete"
            )));
        }
    }

    for component in cyclic_components(graph) {
        issues.push(warning(format!(
            "ownership/control cycle involving {}",
            component.join(", ")
        )));
    }

    GraphValidation {
        valid: !issues.iter().any(|i| i.severity == IssueSeverity::Error),
        issues,
        total_control_pct,
    }
}

/// BFS from the root over `owns ∪ controls` edges to the target, with the
/// effective control percentage multiplied along the path. The root is the
/// first entity (ascending id) with no incoming `owns` edge.
pub fn control_chain(graph: &CbuGraph, target: &str) -> Result<ControlChain, GraphError> {
    if graph.entity(target).is_none() {
        return Err(GraphError::not_found("entity", target));
    }

    let owned: BTreeSet<&str> = graph
        .relationships
        .iter()
        .filter(|r| r.relation_type == RelationType::Owns)
        .map(|r| r.to_id.as_str())
        .collect();

    let mut root_candidates: Vec<&str> = graph
        .entities
        .iter()
        .map(|e| e.id.as_str())
        .filter(|id| !owned.contains(id))
        .collect();
    root_candidates.sort_unstable();
    let root = root_candidates
        .first()
        .copied()
        .ok_or_else(|| GraphError::not_found("graph root", &graph.cbu_id))?;

    // Predecessor BFS over control-carrying edges.
    let mut predecessor: HashMap<&str, &GraphRelationship> = HashMap::new();
    let mut queue = VecDeque::from([root]);
    let mut visited: BTreeSet<&str> = BTreeSet::from([root]);

    while let Some(current) = queue.pop_front() {
        if current == target {
            break;
        }
        for rel in graph
            .relationships
            .iter()
            .filter(|r| r.relation_type.carries_control() && r.from_id == current)
        {
            if visited.insert(rel.to_id.as_str()) {
                predecessor.insert(rel.to_id.as_str(), rel);
                queue.push_back(rel.to_id.as_str());
            }
        }
    }

    if target != root && !predecessor.contains_key(target) {
        return Err(GraphError::not_found("control path", target));
    }

    let mut chain = Vec::new();
    let mut cursor = target;
    while cursor != root {
        let rel = predecessor[cursor];
        chain.push(ChainLink {
            from_id: rel.from_id.clone(),
            to_id: rel.to_id.clone(),
            relation_type: rel.relation_type,
            control_pct: rel.control_pct,
        });
        cursor = rel.from_id.as_str();
    }
    chain.reverse();

    let effective_control_pct = chain
        .iter()
        .fold(100.0_f64, |acc, link| acc * link.control_pct / 100.0);

    Ok(ControlChain {
        chain,
        effective_control_pct,
    })
}

/// Strongly connected components of size > 1 in the `owns ∪ controls`
/// subgraph, each reported once as a sorted id list.
fn cyclic_components(graph: &CbuGraph) -> Vec<Vec<String>> {
    let ids: Vec<&str> = graph.entities.iter().map(|e| e.id.as_str()).collect();
    let index_of: HashMap<&str, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); ids.len()];
    for rel in &graph.relationships {
        if !rel.relation_type.carries_control() {
            continue;
        }
        if let (Some(&from), Some(&to)) = (
            index_of.get(rel.from_id.as_str()),
            index_of.get(rel.to_id.as_str()),
        ) {
            adjacency[from].push(to);
        }
    }

    // Tarjan's algorithm, iterative to keep deep chains off the stack.
    let n = ids.len();
    let mut index = vec![usize::MAX; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut components = Vec::new();

    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        let mut call_stack: Vec<(usize, usize)> = vec![(start, 0)];
        while let Some((v, child)) = call_stack.last().copied() {
            if child == 0 {
                index[v] = next_index;
                lowlink[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if child < adjacency[v].len() {
                let w = adjacency[v][child];
                call_stack.last_mut().unwrap().1 += 1;
                if index[w] == usize::MAX {
                    call_stack.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w]);
                }
            } else {
                if lowlink[v] == index[v] {
                    let mut component = Vec::new();
                    while let Some(w) = stack.pop() {
                        on_stack[w] = false;
                        component.push(ids[w].to_string());
                        if w == v {
                            break;
                        }
                    }
                    if component.len() > 1 {
                        component.sort_unstable();
                        components.push(component);
                    }
                }
                call_stack.pop();
                if let Some((parent, _)) = call_stack.last().copied() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
            }
        }
    }

    components.sort();
    components
}

fn error(message: String) -> GraphIssue {
    GraphIssue {
        severity: IssueSeverity::Error,
        message,
    }
}

fn warning(message: String) -> GraphIssue {
    GraphIssue {
        severity: IssueSeverity::Warning,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GraphEntity, GraphRelationship, RelationType};

    fn entity(id: &str) -> GraphEntity {
        GraphEntity {
            id: id.to_string(),
            name: format!("{id} Ltd"),
            entity_type: "company".to_string(),
            jurisdiction: Some("LU".to_string()),
        }
    }

    fn edge(from: &str, to: &str, relation: RelationType, pct: f64) -> GraphRelationship {
        GraphRelationship {
            from_id: from.to_string(),
            to_id: to.to_string(),
            relation_type: relation,
            control_pct: pct,
        }
    }

    fn graph(entities: &[&str], relationships: Vec<GraphRelationship>) -> CbuGraph {
        CbuGraph {
            cbu_id: "CBU-1".to_string(),
            name: "Test CBU".to_string(),
            entities: entities.iter().map(|id| entity(id)).collect(),
            roles: Vec::new(),
            relationships,
        }
    }

    #[test]
    fn control_chain_multiplies_percentages() {
        let g = graph(
            &["E1", "E2", "E5"],
            vec![
                edge("E1", "E2", RelationType::Owns, 100.0),
                edge("E2", "E5", RelationType::Owns, 50.0),
            ],
        );
        let chain = control_chain(&g, "E5").unwrap();
        assert_eq!(chain.chain.len(), 2);
        assert_eq!(chain.chain[0].from_id, "E1");
        assert_eq!(chain.chain[1].to_id, "E5");
        assert!((chain.effective_control_pct - 50.0).abs() < 1e-9);
    }

    #[test]
    fn control_chain_traverses_controls_edges_too() {
        let g = graph(
            &["E1", "E2", "E3"],
            vec![
                edge("E1", "E2", RelationType::Controls, 100.0),
                edge("E2", "E3", RelationType::Owns, 25.0),
            ],
        );
        let chain = control_chain(&g, "E3").unwrap();
        assert_eq!(chain.chain.len(), 2);
        assert!((chain.effective_control_pct - 25.0).abs() < 1e-9);
    }

    #[test]
    fn unreachable_target_is_not_found() {
        let g = graph(
            &["E1", "E2", "E3"],
            vec![edge("E1", "E2", RelationType::Owns, 100.0)],
        );
        assert!(matches!(
            control_chain(&g, "E3"),
            Err(GraphError::NotFound { kind: "control path", .. })
        ));
        assert!(matches!(
            control_chain(&g, "GHOST"),
            Err(GraphError::NotFound { kind: "entity", .. })
        ));
    }

    #[test]
    fn over_allocation_is_an_error() {
        let g = graph(
            &["A", "B", "C"],
            vec![
                edge("A", "C", RelationType::Owns, 70.0),
                edge("B", "C", RelationType::Owns, 40.0),
            ],
        );
        let result = validate_graph(&g);
        assert!(!result.valid);
        assert!((result.total_control_pct - 110.0).abs() < 1e-9);
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Error && i.message.contains("exceeding 100%")));
    }

    #[test]
    fn incomplete_ownership_is_a_warning() {
        let g = graph(
            &["A", "B"],
            vec![edge("A", "B", RelationType::Owns, 60.0)],
        );
        let result = validate_graph(&g);
        assert!(result.valid);
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Warning && i.message.contains("incomplete")));
    }

    #[test]
    fn dangling_endpoint_and_bad_percent_are_errors() {
        let g = graph(
            &["A"],
            vec![
                edge("A", "MISSING", RelationType::Owns, 50.0),
                edge("A", "A", RelationType::Controls, 120.0),
            ],
        );
        let result = validate_graph(&g);
        assert!(!result.valid);
        let errors = result
            .issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .count();
        assert_eq!(errors, 2);
        // The self-loop also warns.
        assert!(result
            .issues
            .iter()
            .any(|i| i.severity == IssueSeverity::Warning && i.message.contains("self-referencing")));
    }

    #[test]
    fn cycle_reported_once_per_component() {
        let g = graph(
            &["A", "B", "C", "D"],
            vec![
                edge("A", "B", RelationType::Owns, 50.0),
                edge("B", "A", RelationType::Controls, 50.0),
                edge("C", "D", RelationType::Owns, 50.0),
            ],
        );
        let result = validate_graph(&g);
        let cycle_warnings: Vec<&GraphIssue> = result
            .issues
            .iter()
            .filter(|i| i.message.contains("cycle"))
            .collect();
        assert_eq!(cycle_warnings.len(), 1);
        assert!(cycle_warnings[0].message.contains("A, B"));
    }

    #[test]
    fn relationships_split_by_direction() {
        let g = graph(
            &["A", "B", "C"],
            vec![
                edge("A", "B", RelationType::Owns, 100.0),
                edge("B", "C", RelationType::Delegates, 0.0),
            ],
        );
        let rels = relationships_of(&g, "B").unwrap();
        assert_eq!(rels.inbound.len(), 1);
        assert_eq!(rels.outbound.len(), 1);
        assert!(relationships_of(&g, "NOPE").is_err());
    }
}
