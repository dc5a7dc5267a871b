//! Router construction for the retrieval HTTP surface.

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/rag/health", get(handlers::health))
        .route("/rag/stats", get(handlers::stats))
        .route("/rag/attribute_search", get(handlers::attribute_search))
        .route(
            "/rag/attribute_search_enriched",
            get(handlers::attribute_search_enriched),
        )
        .route("/rag/similar_attributes", get(handlers::similar_attributes))
        .route("/rag/text_search", get(handlers::text_search))
        .route("/rag/attribute/:code", get(handlers::get_attribute))
        .route("/rag/feedback", post(handlers::post_feedback))
        .route("/rag/feedback/recent", get(handlers::recent_feedback))
        .route("/rag/feedback/analytics", get(handlers::feedback_analytics))
        .route(
            "/rag/feedback/attribute/:code",
            get(handlers::attribute_feedback),
        )
        .route("/rag/feedback/summary", get(handlers::feedback_summary))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
