//! `kyc.cbu.CbuGraphService` implementation.

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use kyc_cbu_graph::{analysis, model};

use crate::proto::kyc::cbu::cbu_graph_service_server::CbuGraphService;
use crate::proto::kyc::cbu::*;
use crate::state::AppState;

use super::{graph_status, require};

pub struct CbuGrpc {
    state: AppState,
}

impl CbuGrpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

fn entity_to_proto(e: &model::GraphEntity) -> GraphEntity {
    GraphEntity {
        id: e.id.clone(),
        name: e.name.clone(),
        entity_type: e.entity_type.clone(),
        jurisdiction: e.jurisdiction.clone().unwrap_or_default(),
    }
}

fn relationship_to_proto(r: &model::GraphRelationship) -> GraphRelationship {
    GraphRelationship {
        from_id: r.from_id.clone(),
        to_id: r.to_id.clone(),
        relation_type: r.relation_type.as_str().to_string(),
        control_pct: r.control_pct,
    }
}

#[tonic::async_trait]
impl CbuGraphService for CbuGrpc {
    async fn get_graph(
        &self,
        request: Request<GetGraphRequest>,
    ) -> Result<Response<CbuGraph>, Status> {
        let req = request.into_inner();
        require("cbu_id", &req.cbu_id)?;
        let graph = self
            .state
            .graphs
            .get_graph(&req.cbu_id)
            .await
            .map_err(graph_status)?;

        Ok(Response::new(CbuGraph {
            cbu_id: graph.cbu_id.clone(),
            name: graph.name.clone(),
            entities: graph.entities.iter().map(entity_to_proto).collect(),
            roles: graph
                .roles
                .iter()
                .map(|r| GraphRole {
                    entity_id: r.entity_id.clone(),
                    role: r.role.clone(),
                })
                .collect(),
            relationships: graph.relationships.iter().map(relationship_to_proto).collect(),
        }))
    }

    async fn get_entity(
        &self,
        request: Request<GetEntityRequest>,
    ) -> Result<Response<GraphEntity>, Status> {
        let req = request.into_inner();
        require("cbu_id", &req.cbu_id)?;
        require("entity_id", &req.entity_id)?;
        let entity = self
            .state
            .graphs
            .get_entity(&req.cbu_id, &req.entity_id)
            .await
            .map_err(graph_status)?;
        Ok(Response::new(entity_to_proto(&entity)))
    }

    type ListEntitiesStream = ReceiverStream<Result<GraphEntity, Status>>;

    async fn list_entities(
        &self,
        request: Request<GetGraphRequest>,
    ) -> Result<Response<Self::ListEntitiesStream>, Status> {
        let req = request.into_inner();
        require("cbu_id", &req.cbu_id)?;
        let graph = self
            .state
            .graphs
            .get_graph(&req.cbu_id)
            .await
            .map_err(graph_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for entity in &graph.entities {
                if tx.send(Ok(entity_to_proto(entity))).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn get_relationships(
        &self,
        request: Request<GetRelationshipsRequest>,
    ) -> Result<Response<GetRelationshipsResponse>, Status> {
        let req = request.into_inner();
        require("cbu_id", &req.cbu_id)?;
        require("entity_id", &req.entity_id)?;

        let graph = self
            .state
            .graphs
            .get_graph(&req.cbu_id)
            .await
            .map_err(graph_status)?;
        let relationships =
            analysis::relationships_of(&graph, &req.entity_id).map_err(graph_status)?;

        Ok(Response::new(GetRelationshipsResponse {
            inbound: relationships.inbound.iter().map(relationship_to_proto).collect(),
            outbound: relationships.outbound.iter().map(relationship_to_proto).collect(),
        }))
    }

    async fn validate_graph(
        &self,
        request: Request<GetGraphRequest>,
    ) -> Result<Response<ValidateGraphResponse>, Status> {
        let req = request.into_inner();
        require("cbu_id", &req.cbu_id)?;
        let graph = self
            .state
            .graphs
            .get_graph(&req.cbu_id)
            .await
            .map_err(graph_status)?;

        let result = analysis::validate_graph(&graph);
        Ok(Response::new(ValidateGraphResponse {
            valid: result.valid,
            issues: result
                .issues
                .into_iter()
                .map(|issue| GraphIssue {
                    severity: match issue.severity {
                        analysis::IssueSeverity::Error => "ERROR".to_string(),
                        analysis::IssueSeverity::Warning => "WARNING".to_string(),
                    },
                    message: issue.message,
                })
                .collect(),
            total_control_pct: result.total_control_pct,
        }))
    }

    async fn get_control_chain(
        &self,
        request: Request<GetControlChainRequest>,
    ) -> Result<Response<GetControlChainResponse>, Status> {
        let req = request.into_inner();
        require("cbu_id", &req.cbu_id)?;
        require("target_entity_id", &req.target_entity_id)?;

        let graph = self
            .state
            .graphs
            .get_graph(&req.cbu_id)
            .await
            .map_err(graph_status)?;
        let chain =
            analysis::control_chain(&graph, &req.target_entity_id).map_err(graph_status)?;

        Ok(Response::new(GetControlChainResponse {
            chain: chain
                .chain
                .into_iter()
                .map(|link| ChainLink {
                    from_id: link.from_id,
                    to_id: link.to_id,
                    relation_type: link.relation_type.as_str().to_string(),
                    control_pct: link.control_pct,
                })
                .collect(),
            effective_control_pct: chain.effective_control_pct,
        }))
    }
}
