//! Handlers for the `/rag/*` routes.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use kyc_rag::types::{AgentType, FeedbackEntry, Sentiment};

use crate::state::AppState;

use super::error::AppError;

const DEFAULT_SEARCH_LIMIT: i64 = 10;
const DEFAULT_RECENT_LIMIT: i64 = 50;
const DEFAULT_SUMMARY_LIMIT: i64 = 20;
const DEFAULT_TOP: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarParams {
    pub code: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TextSearchParams {
    pub term: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TopParams {
    pub top: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackBody {
    pub query_text: Option<String>,
    pub attribute_code: Option<String>,
    pub document_code: Option<String>,
    pub regulation_code: Option<String>,
    pub feedback: Option<String>,
    pub confidence: Option<f32>,
    pub agent_name: Option<String>,
    pub agent_type: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let embeddings_count = state.rag.count_embeddings().await?;
    Ok(Json(json!({
        "status": "ok",
        "embeddings_count": embeddings_count,
        "embedding_model": state.embedder.model_name(),
        "embedding_dimensions": state.embedder.dimension(),
    })))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let stats = state.rag.stats().await?;
    Ok(Json(json!({
        "total_attributes": stats.total,
        "attributes_with_embeddings": stats.with_embeddings,
        "embedding_coverage_percent": stats.coverage_percent,
        "risk_distribution": stats.risk_distribution,
    })))
}

pub async fn attribute_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let query = required(params.q, "q")?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let embedding = state.embedder.embed(&query).await.map_err(rag)?;
    let results = state.rag.search_by_vector(&embedding, limit).await?;
    Ok(Json(json!({
        "query": query,
        "limit": limit,
        "count": results.len(),
        "results": results,
    })))
}

pub async fn attribute_search_enriched(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, AppError> {
    let query = required(params.q, "q")?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let embedding = state.embedder.embed(&query).await.map_err(rag)?;
    let results = state.rag.search_attributes_and_docs(&embedding, limit).await?;
    Ok(Json(json!({
        "query": query,
        "limit": limit,
        "count": results.len(),
        "results": results,
    })))
}

pub async fn similar_attributes(
    State(state): State<AppState>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<Value>, AppError> {
    let code = required(params.code, "code")?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let results = state.rag.find_similar_attributes(&code, limit).await?;
    Ok(Json(json!({
        "source_attribute": code,
        "limit": limit,
        "count": results.len(),
        "results": results,
    })))
}

pub async fn text_search(
    State(state): State<AppState>,
    Query(params): Query<TextSearchParams>,
) -> Result<Json<Value>, AppError> {
    let term = required(params.term, "term")?;
    let results = state.rag.search_by_text(&term).await?;
    Ok(Json(json!({
        "search_term": term,
        "count": results.len(),
        "results": results,
    })))
}

pub async fn get_attribute(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let metadata = state.rag.get_metadata(&code).await?;
    Ok(Json(serde_json::to_value(metadata).unwrap_or_default()))
}

pub async fn post_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackBody>,
) -> Result<Json<Value>, AppError> {
    let query_text = required(body.query_text, "query_text")?;
    let sentiment = body
        .feedback
        .as_deref()
        .map(|f| {
            Sentiment::parse(f)
                .ok_or_else(|| AppError::bad_request(format!("unknown feedback '{f}'")))
        })
        .transpose()?
        .unwrap_or(Sentiment::Neutral);
    let agent_type = body
        .agent_type
        .as_deref()
        .map(|a| {
            AgentType::parse(a)
                .ok_or_else(|| AppError::bad_request(format!("unknown agent_type '{a}'")))
        })
        .transpose()?
        .unwrap_or(AgentType::Ai);

    let entry = FeedbackEntry {
        id: None,
        query_text,
        attribute_code: body.attribute_code.filter(|s| !s.is_empty()),
        document_code: body.document_code.filter(|s| !s.is_empty()),
        regulation_code: body.regulation_code.filter(|s| !s.is_empty()),
        sentiment,
        confidence: body.confidence.unwrap_or(0.5),
        agent_name: body.agent_name.filter(|s| !s.is_empty()),
        agent_type,
        created_at: None,
    };

    let id = state.feedback.insert_feedback(&entry).await?;
    Ok(Json(json!({
        "status": "recorded",
        "id": id,
        "feedback": entry.sentiment.as_str(),
        "agent_name": entry.agent_name,
        "created_at": chrono::Utc::now(),
    })))
}

pub async fn recent_feedback(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    let entries = state.feedback.get_recent_feedback(limit).await?;
    Ok(Json(json!({
        "count": entries.len(),
        "results": entries,
    })))
}

pub async fn feedback_analytics(
    State(state): State<AppState>,
    Query(params): Query<TopParams>,
) -> Result<Json<Value>, AppError> {
    let top = params.top.unwrap_or(DEFAULT_TOP);
    let analytics = state.feedback.get_feedback_analytics(top).await?;
    Ok(Json(serde_json::to_value(analytics).unwrap_or_default()))
}

pub async fn attribute_feedback(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Value>, AppError> {
    let entries = state
        .feedback
        .get_attribute_feedback(&code, DEFAULT_RECENT_LIMIT)
        .await?;
    Ok(Json(json!({
        "attribute_code": code,
        "count": entries.len(),
        "results": entries,
    })))
}

pub async fn feedback_summary(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Value>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_SUMMARY_LIMIT);
    let summary = state.feedback.get_feedback_summary(limit).await?;
    let by_attribute = state.feedback.get_attribute_feedback_summary(limit).await?;
    Ok(Json(json!({
        "by_sentiment_and_agent": summary,
        "by_attribute": by_attribute,
    })))
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::bad_request(format!(
            "missing required parameter '{name}'"
        ))),
    }
}

fn rag(e: kyc_rag::EmbeddingError) -> AppError {
    AppError::from(kyc_rag::RagError::from(e))
}
