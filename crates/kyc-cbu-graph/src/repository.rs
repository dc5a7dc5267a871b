//! Postgres loader for CBU graphs.

use sqlx::PgPool;
use tracing::debug;

use crate::error::GraphError;
use crate::model::{CbuGraph, GraphEntity, GraphRelationship, GraphRole, RelationType};

#[derive(Clone)]
pub struct GraphRepository {
    pool: PgPool,
}

impl GraphRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load one CBU's graph: entities, roles and relationships, ordered by
    /// id so analysis and streaming are deterministic.
    pub async fn get_graph(&self, cbu_id: &str) -> Result<CbuGraph, GraphError> {
        let name = sqlx::query_scalar::<_, String>(
            "SELECT name FROM cbu_graphs WHERE cbu_id = $1",
        )
        .bind(cbu_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GraphError::not_found("cbu", cbu_id))?;

        let entities = sqlx::query_as::<_, (String, String, String, Option<String>)>(
            r#"
            SELECT entity_id, name, entity_type, jurisdiction
            FROM cbu_entities
            WHERE cbu_id = $1
            ORDER BY entity_id
            "#,
        )
        .bind(cbu_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(id, name, entity_type, jurisdiction)| GraphEntity {
            id,
            name,
            entity_type,
            jurisdiction,
        })
        .collect();

        let roles = sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT entity_id, role
            FROM cbu_entity_roles
            WHERE cbu_id = $1
            ORDER BY entity_id, role
            "#,
        )
        .bind(cbu_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(entity_id, role)| GraphRole { entity_id, role })
        .collect();

        let relationship_rows = sqlx::query_as::<_, (String, String, String, f64)>(
            r#"
            SELECT from_id, to_id, relation_type, control_pct
            FROM cbu_relationships
            WHERE cbu_id = $1
            ORDER BY from_id, to_id, relation_type
            "#,
        )
        .bind(cbu_id)
        .fetch_all(&self.pool)
        .await?;

        let mut relationships = Vec::with_capacity(relationship_rows.len());
        for (from_id, to_id, relation, control_pct) in relationship_rows {
            let relation_type = RelationType::parse(&relation).ok_or_else(|| {
                GraphError::IntegrityViolation(format!(
                    "edge {from_id} -> {to_id} has unknown relation type '{relation}'"
                ))
            })?;
            relationships.push(GraphRelationship {
                from_id,
                to_id,
                relation_type,
                control_pct,
            });
        }

        let graph = CbuGraph {
            cbu_id: cbu_id.to_string(),
            name,
            entities,
            roles,
            relationships,
        };
        debug!(
            cbu = cbu_id,
            entities = graph.entities.len(),
            relationships = graph.relationships.len(),
            "loaded cbu graph"
        );
        Ok(graph)
    }

    /// Entity lookup without loading the whole graph.
    pub async fn get_entity(
        &self,
        cbu_id: &str,
        entity_id: &str,
    ) -> Result<GraphEntity, GraphError> {
        let row = sqlx::query_as::<_, (String, String, String, Option<String>)>(
            r#"
            SELECT entity_id, name, entity_type, jurisdiction
            FROM cbu_entities
            WHERE cbu_id = $1 AND entity_id = $2
            "#,
        )
        .bind(cbu_id)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| GraphError::not_found("entity", entity_id))?;

        let (id, name, entity_type, jurisdiction) = row;
        Ok(GraphEntity {
            id,
            name,
            entity_type,
            jurisdiction,
        })
    }
}
