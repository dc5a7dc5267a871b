//! Read-only ontology view borrowed by the validator and the amendment
//! mutators.
//!
//! The catalog itself lives in `kyc-ontology`; this trait is the seam that
//! keeps the DSL pipeline free of database types. Existence checks back the
//! semantic validation layer; `primary_document` backs the
//! `document-discovery` amendment.

/// Primary-source document for an attribute, as discovered in the ontology.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryDocument {
    pub code: String,
    pub name: String,
}

pub trait OntologyView: Send + Sync {
    fn has_document(&self, code: &str) -> bool;
    fn has_attribute(&self, code: &str) -> bool;
    fn has_regulation(&self, code: &str) -> bool;

    /// The primary-tier document linked to an attribute, if any.
    fn primary_document(&self, attribute_code: &str) -> Option<PrimaryDocument>;
}

/// Set-backed ontology view for tests and bootstrap-free tooling.
#[derive(Debug, Default, Clone)]
pub struct InMemoryOntology {
    pub documents: std::collections::BTreeSet<String>,
    pub attributes: std::collections::BTreeSet<String>,
    pub regulations: std::collections::BTreeSet<String>,
    pub primary_sources: std::collections::BTreeMap<String, PrimaryDocument>,
}

impl InMemoryOntology {
    pub fn with_documents<I: IntoIterator<Item = S>, S: Into<String>>(mut self, codes: I) -> Self {
        self.documents.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn with_attributes<I: IntoIterator<Item = S>, S: Into<String>>(mut self, codes: I) -> Self {
        self.attributes.extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn with_primary_source(
        mut self,
        attribute: impl Into<String>,
        document_code: impl Into<String>,
        document_name: impl Into<String>,
    ) -> Self {
        let doc = PrimaryDocument {
            code: document_code.into(),
            name: document_name.into(),
        };
        self.documents.insert(doc.code.clone());
        let attribute = attribute.into();
        self.attributes.insert(attribute.clone());
        self.primary_sources.insert(attribute, doc);
        self
    }
}

impl OntologyView for InMemoryOntology {
    fn has_document(&self, code: &str) -> bool {
        self.documents.contains(code)
    }

    fn has_attribute(&self, code: &str) -> bool {
        self.attributes.contains(code)
    }

    fn has_regulation(&self, code: &str) -> bool {
        self.regulations.contains(code)
    }

    fn primary_document(&self, attribute_code: &str) -> Option<PrimaryDocument> {
        self.primary_sources.get(attribute_code).cloned()
    }
}
