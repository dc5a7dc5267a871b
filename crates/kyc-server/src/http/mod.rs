//! HTTP/JSON surface for the retrieval layer.

pub mod error;
pub mod handlers;
pub mod router;

pub use router::build_router;
