//! Retrieval layer: embeddings, vector similarity search and the feedback
//! loop that tunes link relevance over time.
//!
//! The embedder is an opaque HTTP provider behind the [`embedder::Embedder`]
//! trait. Search runs as pgvector cosine-distance queries; similarity is
//! `1 - distance`. Feedback inserts fire a database trigger that adjusts
//! `kyc_attr_doc_links.relevance_score` inside the same transaction.

pub mod embedder;
pub mod error;
pub mod feedback;
pub mod retrieval;
pub mod types;

pub use embedder::{Embedder, EmbeddingError, OpenAiEmbedder, SharedEmbedder};
pub use error::RagError;
pub use feedback::FeedbackRepository;
pub use retrieval::RagRepository;
