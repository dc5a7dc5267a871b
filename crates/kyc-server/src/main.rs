//! kyc-server — gRPC and HTTP facades for the compliance-data platform.
//!
//! Reads config from env vars:
//!   KYC_DATABASE_URL   — Postgres connection string (required)
//!   KYC_GRPC_ADDR      — gRPC listen address (default: 0.0.0.0:50051)
//!   KYC_HTTP_ADDR      — HTTP listen address (default: 0.0.0.0:8080)
//!   OPENAI_API_KEY     — embedding provider key
//!
//! Bootstrap: connect the pool, ensure the current grammar row exists,
//! load the ontology catalog, then serve gRPC and HTTP concurrently until
//! ctrl-c. Shutdown waits for in-flight requests inside a bounded grace
//! window before closing the pool.

mod config;
mod grpc;
mod http;
mod proto;
mod state;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::{info, warn};

use kyc_case_store::CaseStore;
use kyc_cbu_graph::GraphRepository;
use kyc_dsl_core::grammar;
use kyc_dsl_core::policy::PolicyRegistry;
use kyc_engine::AmendmentEngine;
use kyc_ontology::OntologyRepository;
use kyc_rag::{FeedbackRepository, OpenAiEmbedder, RagRepository, SharedEmbedder};

use crate::config::ServerConfig;
use crate::grpc::{
    cases::CaseGrpc, cbu::CbuGrpc, dictionary::DictionaryGrpc, dsl::DslGrpc,
    ontology::OntologyGrpc, rag::RagGrpc,
};
use crate::proto::kyc::cbu::cbu_graph_service_server::CbuGraphServiceServer;
use crate::proto::kyc::data::case_service_server::CaseServiceServer;
use crate::proto::kyc::data::dictionary_service_server::DictionaryServiceServer;
use crate::proto::kyc::dsl::dsl_service_server::DslServiceServer;
use crate::proto::kyc::ontology::ontology_service_server::OntologyServiceServer;
use crate::proto::kyc::rag::rag_service_server::RagServiceServer;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kyc_server=debug".into()),
        )
        .init();

    let cfg = ServerConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .connect(&cfg.database_url)
        .await
        .context("failed to connect to database")?;
    info!("connected to database");

    let state = bootstrap(&cfg, pool.clone()).await?;

    let grpc_addr = cfg.grpc_addr.parse().context("invalid KYC_GRPC_ADDR")?;
    let reflection = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(proto::FILE_DESCRIPTOR_SET)
        .build_v1()
        .context("failed to build reflection service")?;

    let grpc = tonic::transport::Server::builder()
        .add_service(reflection)
        .add_service(DslServiceServer::new(DslGrpc::new(state.clone())))
        .add_service(CaseServiceServer::new(CaseGrpc::new(state.clone())))
        .add_service(DictionaryServiceServer::new(DictionaryGrpc::new(state.clone())))
        .add_service(OntologyServiceServer::new(OntologyGrpc::new(state.clone())))
        .add_service(CbuGraphServiceServer::new(CbuGrpc::new(state.clone())))
        .add_service(RagServiceServer::new(RagGrpc::new(state.clone())))
        .serve_with_shutdown(grpc_addr, shutdown_signal());
    info!("gRPC listening on {grpc_addr}");

    let http_listener = TcpListener::bind(&cfg.http_addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.http_addr))?;
    info!("HTTP listening on {}", cfg.http_addr);
    let app = http::build_router(state);
    let http = axum::serve(http_listener, app).with_graceful_shutdown(shutdown_signal());

    // Both servers stop accepting on ctrl-c; in-flight requests get the
    // grace window before the pool is torn down.
    let grace = Duration::from_secs(cfg.shutdown_grace_secs);
    let (grpc_result, http_result) = tokio::join!(grpc, http);
    grpc_result.context("gRPC server error")?;
    http_result.context("HTTP server error")?;

    info!("servers stopped, draining for up to {grace:?}");
    tokio::time::timeout(grace, pool.close())
        .await
        .unwrap_or_else(|_| warn!("pool close timed out"));
    info!("shutdown complete");
    Ok(())
}

async fn bootstrap(cfg: &ServerConfig, pool: sqlx::PgPool) -> Result<AppState> {
    let store = CaseStore::new(pool.clone());

    // The grammar table is append-only; inserting the current version is a
    // no-op when it already exists.
    store
        .insert_grammar(
            grammar::GRAMMAR_NAME,
            grammar::GRAMMAR_VERSION,
            grammar::current_grammar_ebnf(),
        )
        .await
        .context("failed to seed grammar")?;

    let catalog = Arc::new(
        OntologyRepository::new(pool.clone())
            .load()
            .await
            .context("failed to load ontology catalog")?,
    );
    let policies = Arc::new(PolicyRegistry::with_defaults());

    if cfg.openai_api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; embedding calls will fail");
    }
    let mut embedder = OpenAiEmbedder::with_model(
        cfg.openai_api_key.clone(),
        cfg.embedding_model.clone(),
        cfg.embedding_dimensions,
    );
    if let Some(url) = &cfg.embedding_api_url {
        embedder = embedder.with_api_url(url);
    }
    let embedder: SharedEmbedder = Arc::new(embedder);

    let engine = Arc::new(AmendmentEngine::new(
        Arc::new(store.clone()),
        Arc::clone(&catalog),
        Arc::clone(&policies),
    ));

    Ok(AppState {
        store,
        catalog,
        policies,
        engine,
        rag: RagRepository::new(pool.clone()),
        feedback: FeedbackRepository::new(pool.clone()),
        graphs: GraphRepository::new(pool),
        embedder,
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
    }
}
