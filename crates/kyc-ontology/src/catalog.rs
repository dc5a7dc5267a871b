//! In-memory ontology catalog.
//!
//! Built once at bootstrap from the `kyc_*` ontology tables and then only
//! borrowed. BTreeMap keys give every listing its by-code ordering for
//! free. The catalog performs no mutation of case data.

use std::collections::BTreeMap;

use kyc_dsl_core::ontology_view::{OntologyView, PrimaryDocument};

use crate::error::OntologyError;
use crate::model::{
    Attribute, AttributeClass, AttributeDerivation, AttributeDocumentLink, Document,
    DocumentRegulationLink, Regulation, SourceTier,
};

#[derive(Debug, Default, Clone)]
pub struct OntologyCatalog {
    regulations: BTreeMap<String, Regulation>,
    documents: BTreeMap<String, Document>,
    attributes: BTreeMap<String, Attribute>,
    attr_doc_links: Vec<AttributeDocumentLink>,
    doc_reg_links: Vec<DocumentRegulationLink>,
    derivations: Vec<AttributeDerivation>,
    version: String,
}

impl OntologyCatalog {
    pub fn new(
        regulations: Vec<Regulation>,
        documents: Vec<Document>,
        attributes: Vec<Attribute>,
        attr_doc_links: Vec<AttributeDocumentLink>,
        doc_reg_links: Vec<DocumentRegulationLink>,
        derivations: Vec<AttributeDerivation>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            regulations: regulations.into_iter().map(|r| (r.code.clone(), r)).collect(),
            documents: documents.into_iter().map(|d| (d.code.clone(), d)).collect(),
            attributes: attributes.into_iter().map(|a| (a.code.clone(), a)).collect(),
            attr_doc_links,
            doc_reg_links,
            derivations,
            version: version.into(),
        }
    }

    /// Version tag recorded in validation audit rows.
    pub fn version(&self) -> &str {
        &self.version
    }

    // ------------------------------------------------------------------
    // Regulations and documents
    // ------------------------------------------------------------------

    pub fn list_regulations(&self) -> impl Iterator<Item = &Regulation> {
        self.regulations.values()
    }

    pub fn get_regulation(&self, code: &str) -> Result<&Regulation, OntologyError> {
        self.regulations
            .get(code)
            .ok_or_else(|| OntologyError::not_found("regulation", code))
    }

    pub fn list_documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn list_documents_by_regulation(&self, regulation_code: &str) -> Vec<&Document> {
        self.documents
            .values()
            .filter(|d| d.regulation_code == regulation_code)
            .collect()
    }

    pub fn get_document(&self, code: &str) -> Result<&Document, OntologyError> {
        self.documents
            .get(code)
            .ok_or_else(|| OntologyError::not_found("document", code))
    }

    pub fn document_linked_to_regulation(&self, document_code: &str) -> bool {
        self.documents
            .get(document_code)
            .map(|d| !d.regulation_code.is_empty())
            .unwrap_or(false)
            || self
                .doc_reg_links
                .iter()
                .any(|l| l.document_code == document_code)
    }

    pub fn get_document_regulation_links(&self, document_code: &str) -> Vec<&DocumentRegulationLink> {
        self.doc_reg_links
            .iter()
            .filter(|l| l.document_code == document_code)
            .collect()
    }

    // ------------------------------------------------------------------
    // Attributes and links
    // ------------------------------------------------------------------

    pub fn list_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.values()
    }

    pub fn get_attribute(&self, code: &str) -> Result<&Attribute, OntologyError> {
        self.attributes
            .get(code)
            .ok_or_else(|| OntologyError::not_found("attribute", code))
    }

    /// Attributes evidenced by a document, ordered by attribute code.
    pub fn get_attributes_for_document(&self, document_code: &str) -> Vec<&Attribute> {
        let mut codes: Vec<&str> = self
            .attr_doc_links
            .iter()
            .filter(|l| l.document_code == document_code)
            .map(|l| l.attribute_code.as_str())
            .collect();
        codes.sort_unstable();
        codes.dedup();
        codes
            .into_iter()
            .filter_map(|c| self.attributes.get(c))
            .collect()
    }

    /// Documents evidencing an attribute, ordered by source tier then code.
    pub fn get_documents_for_attribute(&self, attribute_code: &str) -> Vec<(&Document, SourceTier)> {
        let mut links: Vec<&AttributeDocumentLink> = self
            .attr_doc_links
            .iter()
            .filter(|l| l.attribute_code == attribute_code)
            .collect();
        links.sort_by(|a, b| {
            a.source_tier
                .cmp(&b.source_tier)
                .then_with(|| a.document_code.cmp(&b.document_code))
        });
        links
            .into_iter()
            .filter_map(|l| self.documents.get(&l.document_code).map(|d| (d, l.source_tier)))
            .collect()
    }

    /// Raw links for an attribute, ordered by tier then document code.
    pub fn get_document_sources(&self, attribute_code: &str) -> Vec<&AttributeDocumentLink> {
        let mut links: Vec<&AttributeDocumentLink> = self
            .attr_doc_links
            .iter()
            .filter(|l| l.attribute_code == attribute_code)
            .collect();
        links.sort_by(|a, b| {
            a.source_tier
                .cmp(&b.source_tier)
                .then_with(|| a.document_code.cmp(&b.document_code))
        });
        links
    }

    // ------------------------------------------------------------------
    // Existence sets
    // ------------------------------------------------------------------

    pub fn all_document_codes(&self) -> Vec<String> {
        self.documents.keys().cloned().collect()
    }

    pub fn all_attribute_codes(&self) -> Vec<String> {
        self.attributes.keys().cloned().collect()
    }

    pub fn all_regulation_codes(&self) -> Vec<String> {
        self.regulations.keys().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Classification and derivations
    // ------------------------------------------------------------------

    pub fn list_public_attributes(&self) -> Vec<&Attribute> {
        self.attributes
            .values()
            .filter(|a| a.attribute_class == AttributeClass::Public)
            .collect()
    }

    pub fn list_private_attributes(&self) -> Vec<&Attribute> {
        self.attributes
            .values()
            .filter(|a| a.attribute_class == AttributeClass::Private)
            .collect()
    }

    pub fn get_attribute_derivations(&self, derived_code: &str) -> Vec<&AttributeDerivation> {
        self.derivations
            .iter()
            .filter(|d| d.derived_code == derived_code)
            .collect()
    }

    /// Every derivation source must exist and be a public attribute.
    pub fn validate_derivation_sources<S: AsRef<str>>(
        &self,
        codes: &[S],
    ) -> Result<(), OntologyError> {
        for code in codes {
            let code = code.as_ref();
            let attribute = self
                .attributes
                .get(code)
                .ok_or_else(|| OntologyError::UnknownAttribute(code.to_string()))?;
            if attribute.attribute_class != AttributeClass::Public {
                return Err(OntologyError::NonPublicSource(code.to_string()));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Integrity
    // ------------------------------------------------------------------

    /// Referential integrity across the loaded tables. Run at bootstrap;
    /// the catalog is immutable afterwards so the result holds for the
    /// process lifetime.
    pub fn check_integrity(&self) -> Result<(), OntologyError> {
        let mut violations = Vec::new();

        for link in &self.attr_doc_links {
            if !self.attributes.contains_key(&link.attribute_code) {
                violations.push(format!(
                    "attr-doc link references unknown attribute '{}'",
                    link.attribute_code
                ));
            }
            if !self.documents.contains_key(&link.document_code) {
                violations.push(format!(
                    "attr-doc link references unknown document '{}'",
                    link.document_code
                ));
            }
        }

        for link in &self.doc_reg_links {
            if !self.documents.contains_key(&link.document_code) {
                violations.push(format!(
                    "doc-reg link references unknown document '{}'",
                    link.document_code
                ));
            }
            if !self.regulations.contains_key(&link.regulation_code) {
                violations.push(format!(
                    "doc-reg link references unknown regulation '{}'",
                    link.regulation_code
                ));
            }
        }

        for derivation in &self.derivations {
            if !self.attributes.contains_key(&derivation.derived_code) {
                violations.push(format!(
                    "derivation references unknown attribute '{}'",
                    derivation.derived_code
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(OntologyError::IntegrityViolation(violations.join("; ")))
        }
    }
}

impl OntologyView for OntologyCatalog {
    fn has_document(&self, code: &str) -> bool {
        self.documents.contains_key(code)
    }

    fn has_attribute(&self, code: &str) -> bool {
        self.attributes.contains_key(code)
    }

    fn has_regulation(&self, code: &str) -> bool {
        self.regulations.contains_key(code)
    }

    /// Highest-relevance primary-tier document for the attribute.
    fn primary_document(&self, attribute_code: &str) -> Option<PrimaryDocument> {
        let mut candidates: Vec<&AttributeDocumentLink> = self
            .attr_doc_links
            .iter()
            .filter(|l| l.attribute_code == attribute_code && l.source_tier == SourceTier::Primary)
            .collect();
        candidates.sort_by(|a, b| {
            b.relevance_score
                .total_cmp(&a.relevance_score)
                .then_with(|| a.document_code.cmp(&b.document_code))
        });
        let link = candidates.first()?;
        let document = self.documents.get(&link.document_code)?;
        Some(PrimaryDocument {
            code: document.code.clone(),
            name: document.name.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceType;

    fn attribute(code: &str, class: AttributeClass) -> Attribute {
        Attribute {
            code: code.to_string(),
            name: code.to_string(),
            domain: "kyc".to_string(),
            description: String::new(),
            risk_category: "standard".to_string(),
            is_personal_data: false,
            attribute_class: class,
        }
    }

    fn document(code: &str, regulation: &str) -> Document {
        Document {
            code: code.to_string(),
            name: format!("{code} name"),
            domain: "kyc".to_string(),
            jurisdiction: "LU".to_string(),
            regulation_code: regulation.to_string(),
            source_type: SourceType::Client,
            validity_years: 1,
            description: String::new(),
            title: None,
            doc_type: None,
        }
    }

    fn link(attr: &str, doc: &str, tier: SourceTier, relevance: f32) -> AttributeDocumentLink {
        AttributeDocumentLink {
            attribute_code: attr.to_string(),
            document_code: doc.to_string(),
            source_tier: tier,
            is_mandatory: true,
            jurisdiction: "LU".to_string(),
            regulation_code: String::new(),
            notes: String::new(),
            relevance_score: relevance,
        }
    }

    fn fixture() -> OntologyCatalog {
        OntologyCatalog::new(
            vec![Regulation {
                code: "AMLD5".to_string(),
                name: "5th AML Directive".to_string(),
                jurisdiction: "EU".to_string(),
                authority: "EC".to_string(),
                description: String::new(),
                effective_from: None,
                effective_to: None,
            }],
            vec![document("PASSPORT", "AMLD5"), document("UBO-DECL", "")],
            vec![
                attribute("UBO_NAME", AttributeClass::Public),
                attribute("RISK_SCORE", AttributeClass::Private),
            ],
            vec![
                link("UBO_NAME", "PASSPORT", SourceTier::Secondary, 0.9),
                link("UBO_NAME", "UBO-DECL", SourceTier::Primary, 0.5),
            ],
            vec![DocumentRegulationLink {
                document_code: "UBO-DECL".to_string(),
                regulation_code: "AMLD5".to_string(),
                applicability: "mandatory".to_string(),
                jurisdiction: "LU".to_string(),
            }],
            vec![AttributeDerivation {
                derived_code: "RISK_SCORE".to_string(),
                source_code: "UBO_NAME".to_string(),
                rule_expression: "(score ubo-name)".to_string(),
                rule_type: "expression".to_string(),
                description: String::new(),
            }],
            "test",
        )
    }

    #[test]
    fn listings_are_ordered_by_code() {
        let catalog = fixture();
        let codes: Vec<&str> = catalog.list_documents().map(|d| d.code.as_str()).collect();
        assert_eq!(codes, vec!["PASSPORT", "UBO-DECL"]);
    }

    #[test]
    fn documents_for_attribute_order_by_tier_then_code() {
        let catalog = fixture();
        let docs: Vec<(&str, SourceTier)> = catalog
            .get_documents_for_attribute("UBO_NAME")
            .into_iter()
            .map(|(d, t)| (d.code.as_str(), t))
            .collect();
        assert_eq!(
            docs,
            vec![("UBO-DECL", SourceTier::Primary), ("PASSPORT", SourceTier::Secondary)]
        );
    }

    #[test]
    fn primary_document_prefers_primary_tier() {
        use kyc_dsl_core::ontology_view::OntologyView;
        let catalog = fixture();
        let primary = catalog.primary_document("UBO_NAME").unwrap();
        assert_eq!(primary.code, "UBO-DECL");
    }

    #[test]
    fn not_found_carries_kind_and_code() {
        let catalog = fixture();
        match catalog.get_regulation("MISSING") {
            Err(OntologyError::NotFound { kind, code }) => {
                assert_eq!(kind, "regulation");
                assert_eq!(code, "MISSING");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn derivation_sources_must_be_public() {
        let catalog = fixture();
        assert!(catalog.validate_derivation_sources(&["UBO_NAME"]).is_ok());
        assert!(matches!(
            catalog.validate_derivation_sources(&["RISK_SCORE"]),
            Err(OntologyError::NonPublicSource(_))
        ));
        assert!(matches!(
            catalog.validate_derivation_sources(&["NOPE"]),
            Err(OntologyError::UnknownAttribute(_))
        ));
    }

    #[test]
    fn document_regulation_linkage() {
        let catalog = fixture();
        assert!(catalog.document_linked_to_regulation("PASSPORT"));
        assert!(catalog.document_linked_to_regulation("UBO-DECL"));
        assert_eq!(catalog.get_document_regulation_links("UBO-DECL").len(), 1);
    }

    #[test]
    fn integrity_check_reports_dangling_links() {
        let mut catalog = fixture();
        catalog
            .attr_doc_links
            .push(link("GHOST", "PASSPORT", SourceTier::Primary, 0.1));
        assert!(matches!(
            catalog.check_integrity(),
            Err(OntologyError::IntegrityViolation(_))
        ));
    }

    #[test]
    fn public_private_split() {
        let catalog = fixture();
        assert_eq!(catalog.list_public_attributes().len(), 1);
        assert_eq!(catalog.list_private_attributes().len(), 1);
        assert_eq!(catalog.get_attribute_derivations("RISK_SCORE").len(), 1);
    }
}
