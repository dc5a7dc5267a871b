//! Core DSL pipeline for KYC cases.
//!
//! This crate owns the pure half of the platform: the S-expression parser,
//! the binder that produces typed [`model::Case`] values, the grammar and
//! semantic validator, the deterministic serializer, and the named amendment
//! mutators. Nothing in here touches a database or a socket; persistence and
//! wire adapters live in the sibling crates.
//!
//! ## Pipeline
//!
//! ```text
//! DSL text → parser → Dsl (S-expr forms) → binder → Vec<Case>
//! Case + OntologyView + PolicyRegistry → validator → report | error
//! Vec<Case> → serializer → DSL text (round-trip stable)
//! ```

pub mod amendments;
pub mod ast;
pub mod binder;
pub mod grammar;
pub mod model;
pub mod ontology_view;
pub mod parser;
pub mod policy;
pub mod serializer;
pub mod validator;

pub use amendments::{AmendmentError, AmendmentKind};
pub use ast::Expr;
pub use binder::{bind, BindError, BindResult};
pub use model::{Case, CaseStatus, FunctionAction};
pub use ontology_view::OntologyView;
pub use parser::{parse, Dsl, ParseError};
pub use policy::PolicyRegistry;
pub use serializer::serialize;
pub use validator::{ValidationError, ValidationReport, Validator};
