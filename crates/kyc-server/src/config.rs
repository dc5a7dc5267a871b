//! Server configuration, read once from the environment at startup.

use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub grpc_addr: String,
    pub http_addr: String,
    pub db_max_connections: u32,
    pub openai_api_key: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub embedding_api_url: Option<String>,
    pub stream_window_secs: u64,
    pub shutdown_grace_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: std::env::var("KYC_DATABASE_URL")
                .context("KYC_DATABASE_URL must be set")?,
            grpc_addr: env_or("KYC_GRPC_ADDR", "0.0.0.0:50051"),
            http_addr: env_or("KYC_HTTP_ADDR", "0.0.0.0:8080"),
            db_max_connections: env_parse("KYC_DB_MAX_CONNECTIONS", 10),
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            embedding_model: env_or("KYC_EMBEDDING_MODEL", "text-embedding-3-small"),
            embedding_dimensions: env_parse("KYC_EMBEDDING_DIMENSIONS", 1536),
            embedding_api_url: std::env::var("KYC_EMBEDDING_API_URL").ok(),
            stream_window_secs: env_parse("KYC_STREAM_WINDOW_SECS", 60),
            shutdown_grace_secs: env_parse("KYC_SHUTDOWN_GRACE_SECS", 30),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
