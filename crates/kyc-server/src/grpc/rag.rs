//! `kyc.rag.RagService` implementation.

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

use kyc_rag::types::{
    AgentType, AttributeMetadata as RagMetadata, AttributeSearchResult, FeedbackEntry, Sentiment,
};

use crate::proto::kyc::rag::rag_service_server::RagService;
use crate::proto::kyc::rag::*;
use crate::state::AppState;

use super::convert::timestamp;
use super::{rag_status, require};

pub struct RagGrpc {
    state: AppState,
}

impl RagGrpc {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, Status> {
        self.state
            .embedder
            .embed(query)
            .await
            .map_err(|e| rag_status(e.into()))
    }
}

fn metadata_to_proto(m: RagMetadata) -> AttributeMetadata {
    AttributeMetadata {
        attribute_code: m.attribute_code,
        synonyms: m.synonyms,
        data_type: m.data_type,
        domain_values: m.domain_values,
        risk_level: m.risk_level.as_str().to_string(),
        example_values: m.example_values,
        regulatory_citations: m.regulatory_citations,
        business_context: m.business_context,
        data_sensitivity: m.data_sensitivity,
        retention_period_days: m.retention_period_days.unwrap_or(0),
    }
}

fn hit_to_proto(hit: AttributeSearchResult) -> AttributeHit {
    AttributeHit {
        attribute: Some(metadata_to_proto(hit.attribute)),
        similarity_score: hit.similarity_score,
        distance: hit.distance,
    }
}

fn feedback_to_proto(entry: FeedbackEntry) -> FeedbackRecord {
    FeedbackRecord {
        id: entry.id.unwrap_or_default(),
        query_text: entry.query_text,
        attribute_code: entry.attribute_code.unwrap_or_default(),
        document_code: entry.document_code.unwrap_or_default(),
        regulation_code: entry.regulation_code.unwrap_or_default(),
        sentiment: entry.sentiment.as_str().to_string(),
        confidence: entry.confidence,
        agent_name: entry.agent_name.unwrap_or_default(),
        agent_type: entry.agent_type.as_str().to_string(),
        created_at: entry.created_at.map(timestamp),
    }
}

#[tonic::async_trait]
impl RagService for RagGrpc {
    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let embeddings_count = self
            .state
            .rag
            .count_embeddings()
            .await
            .map_err(rag_status)?;
        Ok(Response::new(HealthResponse {
            status: "ok".to_string(),
            embeddings_count,
            embedding_model: self.state.embedder.model_name().to_string(),
            embedding_dimensions: self.state.embedder.dimension() as i32,
        }))
    }

    async fn get_stats(
        &self,
        _request: Request<GetStatsRequest>,
    ) -> Result<Response<GetStatsResponse>, Status> {
        let stats = self.state.rag.stats().await.map_err(rag_status)?;
        Ok(Response::new(GetStatsResponse {
            total_attributes: stats.total,
            attributes_with_embeddings: stats.with_embeddings,
            embedding_coverage_percent: stats.coverage_percent,
            risk_distribution: stats
                .risk_distribution
                .into_iter()
                .map(|b| RiskBucket {
                    risk_level: b.risk_level,
                    count: b.count,
                })
                .collect(),
        }))
    }

    async fn search_attributes(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SearchAttributesResponse>, Status> {
        let req = request.into_inner();
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let results = self
            .state
            .rag
            .search_by_vector(&embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(SearchAttributesResponse {
            results: results.into_iter().map(hit_to_proto).collect(),
        }))
    }

    async fn search_attributes_enriched(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SearchEnrichedResponse>, Status> {
        let req = request.into_inner();
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let results = self
            .state
            .rag
            .search_attributes_and_docs(&embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;

        Ok(Response::new(SearchEnrichedResponse {
            results: results
                .into_iter()
                .map(|r| EnrichedHit {
                    attribute: Some(hit_to_proto(r.attribute)),
                    documents: r
                        .documents
                        .into_iter()
                        .map(|d| LinkedDocument {
                            code: d.code,
                            name: d.name,
                            source_tier: d.source_tier,
                            is_mandatory: d.is_mandatory,
                            jurisdiction: d.jurisdiction,
                            relevance_score: d.relevance_score,
                        })
                        .collect(),
                    regulations: r
                        .regulations
                        .into_iter()
                        .map(|reg| LinkedRegulation {
                            code: reg.code,
                            name: reg.name,
                            jurisdiction: reg.jurisdiction,
                            relevance_score: reg.relevance_score,
                        })
                        .collect(),
                })
                .collect(),
        }))
    }

    async fn text_search(
        &self,
        request: Request<TextSearchRequest>,
    ) -> Result<Response<TextSearchResponse>, Status> {
        let req = request.into_inner();
        require("term", &req.term)?;
        let results = self
            .state
            .rag
            .search_by_text(&req.term)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(TextSearchResponse {
            results: results.into_iter().map(metadata_to_proto).collect(),
        }))
    }

    async fn find_similar_attributes(
        &self,
        request: Request<SimilarRequest>,
    ) -> Result<Response<SearchAttributesResponse>, Status> {
        let req = request.into_inner();
        require("attribute_code", &req.attribute_code)?;
        let results = self
            .state
            .rag
            .find_similar_attributes(&req.attribute_code, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(SearchAttributesResponse {
            results: results.into_iter().map(hit_to_proto).collect(),
        }))
    }

    async fn get_attribute_metadata(
        &self,
        request: Request<AttributeCodeRequest>,
    ) -> Result<Response<AttributeMetadata>, Status> {
        let req = request.into_inner();
        require("attribute_code", &req.attribute_code)?;
        let metadata = self
            .state
            .rag
            .get_metadata(&req.attribute_code)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(metadata_to_proto(metadata)))
    }

    async fn search_documents(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<CatalogSearchResponse>, Status> {
        let req = request.into_inner();
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let results = self
            .state
            .rag
            .search_documents(&embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(catalog_response(results)))
    }

    async fn search_regulations(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<CatalogSearchResponse>, Status> {
        let req = request.into_inner();
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let results = self
            .state
            .rag
            .search_regulations(&embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(catalog_response(results)))
    }

    async fn search_document_sections(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<SectionSearchResponse>, Status> {
        let req = request.into_inner();
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let results = self
            .state
            .rag
            .search_document_sections(&embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(SectionSearchResponse {
            results: results
                .into_iter()
                .map(|s| SectionHit {
                    document_code: s.document_code,
                    section_number: s.section_number,
                    section_title: s.section_title,
                    text_excerpt: s.text_excerpt,
                    page_number: s.page_number.unwrap_or(0),
                    similarity_score: s.similarity_score,
                })
                .collect(),
        }))
    }

    async fn recommend_clusters(
        &self,
        request: Request<SearchRequest>,
    ) -> Result<Response<RecommendClustersResponse>, Status> {
        let req = request.into_inner();
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let clusters = self
            .state
            .rag
            .recommend_clusters(&embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(RecommendClustersResponse {
            clusters: clusters
                .into_iter()
                .map(|c| ClusterRecommendation {
                    cluster_code: c.cluster_code,
                    cluster_name: c.cluster_name,
                    similarity: c.similarity,
                    member_count: c.member_count,
                })
                .collect(),
        }))
    }

    async fn search_within_cluster(
        &self,
        request: Request<ClusterSearchRequest>,
    ) -> Result<Response<SearchAttributesResponse>, Status> {
        let req = request.into_inner();
        require("cluster_code", &req.cluster_code)?;
        require("query", &req.query)?;
        let embedding = self.embed_query(&req.query).await?;
        let results = self
            .state
            .rag
            .search_within_cluster(&req.cluster_code, &embedding, req.limit as i64)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(SearchAttributesResponse {
            results: results.into_iter().map(hit_to_proto).collect(),
        }))
    }

    async fn insert_feedback(
        &self,
        request: Request<InsertFeedbackRequest>,
    ) -> Result<Response<InsertFeedbackResponse>, Status> {
        let req = request.into_inner();
        require("query_text", &req.query_text)?;

        let entry = FeedbackEntry {
            id: None,
            query_text: req.query_text,
            attribute_code: none_if_empty(req.attribute_code),
            document_code: none_if_empty(req.document_code),
            regulation_code: none_if_empty(req.regulation_code),
            sentiment: Sentiment::parse(&req.feedback).unwrap_or(Sentiment::Neutral),
            confidence: if req.confidence > 0.0 { req.confidence } else { 0.5 },
            agent_name: none_if_empty(req.agent_name),
            agent_type: AgentType::parse(&req.agent_type).unwrap_or(AgentType::Ai),
            created_at: None,
        };

        let id = self
            .state
            .feedback
            .insert_feedback(&entry)
            .await
            .map_err(rag_status)?;
        Ok(Response::new(InsertFeedbackResponse {
            id,
            status: "recorded".to_string(),
        }))
    }

    type GetRecentFeedbackStream = ReceiverStream<Result<FeedbackRecord, Status>>;

    async fn get_recent_feedback(
        &self,
        request: Request<RecentFeedbackRequest>,
    ) -> Result<Response<Self::GetRecentFeedbackStream>, Status> {
        let req = request.into_inner();
        let limit = if req.limit > 0 { req.limit as i64 } else { 50 };
        let entries = self
            .state
            .feedback
            .get_recent_feedback(limit)
            .await
            .map_err(rag_status)?;

        let (tx, rx) = tokio::sync::mpsc::channel(16);
        tokio::spawn(async move {
            for entry in entries {
                if tx.send(Ok(feedback_to_proto(entry))).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn get_feedback_analytics(
        &self,
        request: Request<FeedbackAnalyticsRequest>,
    ) -> Result<Response<FeedbackAnalyticsResponse>, Status> {
        let req = request.into_inner();
        let top = if req.top > 0 { req.top as i64 } else { 10 };
        let analytics = self
            .state
            .feedback
            .get_feedback_analytics(top)
            .await
            .map_err(rag_status)?;

        Ok(Response::new(FeedbackAnalyticsResponse {
            total: analytics.total,
            positive: analytics.positive,
            negative: analytics.negative,
            neutral: analytics.neutral,
            avg_confidence: analytics.avg_confidence,
            by_agent_type: analytics
                .by_agent_type
                .into_iter()
                .map(|(agent_type, count)| AgentTypeCount { agent_type, count })
                .collect(),
            top_attributes: analytics
                .top_attributes
                .into_iter()
                .map(|row| AttributeSentimentCount {
                    attribute_code: row.attribute_code,
                    sentiment: row.sentiment,
                    count: row.count,
                })
                .collect(),
            recent: analytics.recent.into_iter().map(feedback_to_proto).collect(),
            sentiment_trend: analytics
                .sentiment_trend
                .into_iter()
                .map(|p| TrendPoint {
                    day: p.day.to_string(),
                    positive: p.positive,
                    negative: p.negative,
                    neutral: p.neutral,
                })
                .collect(),
        }))
    }
}

fn catalog_response(results: Vec<kyc_rag::types::CatalogSearchHit>) -> CatalogSearchResponse {
    CatalogSearchResponse {
        results: results
            .into_iter()
            .map(|hit| CatalogHit {
                code: hit.code,
                name: hit.name,
                jurisdiction: hit.jurisdiction,
                similarity_score: hit.similarity_score,
            })
            .collect(),
    }
}

fn none_if_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
