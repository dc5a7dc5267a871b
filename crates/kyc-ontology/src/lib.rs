//! Regulatory ontology catalog.
//!
//! The ontology is loaded from Postgres once at bootstrap and held as an
//! immutable in-memory [`catalog::OntologyCatalog`]; request handlers only
//! ever borrow it. It backs semantic validation, the `document-discovery`
//! amendment, and the dictionary/ontology read services.

pub mod catalog;
pub mod error;
pub mod model;
pub mod repository;

pub use catalog::OntologyCatalog;
pub use error::OntologyError;
pub use model::{
    Attribute, AttributeClass, AttributeDerivation, AttributeDocumentLink, Document,
    DocumentRegulationLink, Regulation, SourceTier, SourceType,
};
pub use repository::OntologyRepository;
