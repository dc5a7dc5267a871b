//! Postgres loader for the ontology catalog.
//!
//! One `load()` at bootstrap reads the five ontology tables in code order
//! and builds the immutable catalog. Unknown enum text in a row is a load
//! error rather than a silent default; the ontology is the source of truth
//! for validation and must not degrade quietly.

use sqlx::PgPool;
use tracing::info;

use crate::catalog::OntologyCatalog;
use crate::error::OntologyError;
use crate::model::{
    Attribute, AttributeClass, AttributeDerivation, AttributeDocumentLink, Document,
    DocumentRegulationLink, Regulation, SourceTier, SourceType,
};

#[derive(Clone)]
pub struct OntologyRepository {
    pool: PgPool,
}

impl OntologyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load every ontology table and build the catalog. Fails on the first
    /// unparseable row or referential violation.
    pub async fn load(&self) -> Result<OntologyCatalog, OntologyError> {
        let regulations = self.load_regulations().await?;
        let documents = self.load_documents().await?;
        let attributes = self.load_attributes().await?;
        let attr_doc_links = self.load_attr_doc_links().await?;
        let doc_reg_links = self.load_doc_reg_links().await?;
        let derivations = self.load_derivations().await?;

        let version = format!(
            "r{}-d{}-a{}",
            regulations.len(),
            documents.len(),
            attributes.len()
        );

        info!(
            regulations = regulations.len(),
            documents = documents.len(),
            attributes = attributes.len(),
            links = attr_doc_links.len(),
            "ontology catalog loaded"
        );

        let catalog = OntologyCatalog::new(
            regulations,
            documents,
            attributes,
            attr_doc_links,
            doc_reg_links,
            derivations,
            version,
        );
        catalog.check_integrity()?;
        Ok(catalog)
    }

    async fn load_regulations(&self) -> Result<Vec<Regulation>, OntologyError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, Option<chrono::NaiveDate>, Option<chrono::NaiveDate>)>(
            r#"
            SELECT code, name, jurisdiction, authority, description, effective_from, effective_to
            FROM kyc_regulations
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(code, name, jurisdiction, authority, description, effective_from, effective_to)| {
                    Regulation {
                        code,
                        name,
                        jurisdiction,
                        authority,
                        description,
                        effective_from,
                        effective_to,
                    }
                },
            )
            .collect())
    }

    async fn load_documents(&self) -> Result<Vec<Document>, OntologyError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, String, i32, String, Option<String>, Option<String>)>(
            r#"
            SELECT code, name, domain, jurisdiction, regulation_code, source_type,
                   validity_years, description, title, doc_type
            FROM kyc_documents
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(code, name, domain, jurisdiction, regulation_code, source_type, validity_years, description, title, doc_type)| {
                    let source_type = SourceType::parse(&source_type).ok_or_else(|| {
                        OntologyError::IntegrityViolation(format!(
                            "document '{code}' has unknown source type '{source_type}'"
                        ))
                    })?;
                    Ok(Document {
                        code,
                        name,
                        domain,
                        jurisdiction,
                        regulation_code,
                        source_type,
                        validity_years,
                        description,
                        title,
                        doc_type,
                    })
                },
            )
            .collect()
    }

    async fn load_attributes(&self) -> Result<Vec<Attribute>, OntologyError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String, bool, String)>(
            r#"
            SELECT code, name, domain, description, risk_category, is_personal_data, attribute_class
            FROM kyc_attributes
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(code, name, domain, description, risk_category, is_personal_data, class)| {
                    let attribute_class = AttributeClass::parse(&class).ok_or_else(|| {
                        OntologyError::IntegrityViolation(format!(
                            "attribute '{code}' has unknown class '{class}'"
                        ))
                    })?;
                    Ok(Attribute {
                        code,
                        name,
                        domain,
                        description,
                        risk_category,
                        is_personal_data,
                        attribute_class,
                    })
                },
            )
            .collect()
    }

    async fn load_attr_doc_links(&self) -> Result<Vec<AttributeDocumentLink>, OntologyError> {
        let rows = sqlx::query_as::<_, (String, String, String, bool, String, String, String, f32)>(
            r#"
            SELECT attribute_code, document_code, source_tier, is_mandatory,
                   jurisdiction, regulation_code, notes, relevance_score
            FROM kyc_attr_doc_links
            ORDER BY attribute_code, source_tier, document_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(attribute_code, document_code, tier, is_mandatory, jurisdiction, regulation_code, notes, relevance_score)| {
                    let source_tier = SourceTier::parse(&tier).ok_or_else(|| {
                        OntologyError::IntegrityViolation(format!(
                            "link {attribute_code}→{document_code} has unknown tier '{tier}'"
                        ))
                    })?;
                    Ok(AttributeDocumentLink {
                        attribute_code,
                        document_code,
                        source_tier,
                        is_mandatory,
                        jurisdiction,
                        regulation_code,
                        notes,
                        relevance_score,
                    })
                },
            )
            .collect()
    }

    async fn load_doc_reg_links(&self) -> Result<Vec<DocumentRegulationLink>, OntologyError> {
        let rows = sqlx::query_as::<_, (String, String, String, String)>(
            r#"
            SELECT document_code, regulation_code, applicability, jurisdiction
            FROM kyc_doc_reg_links
            ORDER BY document_code, regulation_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(document_code, regulation_code, applicability, jurisdiction)| {
                    DocumentRegulationLink {
                        document_code,
                        regulation_code,
                        applicability,
                        jurisdiction,
                    }
                },
            )
            .collect())
    }

    async fn load_derivations(&self) -> Result<Vec<AttributeDerivation>, OntologyError> {
        let rows = sqlx::query_as::<_, (String, String, String, String, String)>(
            r#"
            SELECT derived_code, source_code, rule_expression, rule_type, description
            FROM kyc_attribute_derivations
            ORDER BY derived_code, source_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(derived_code, source_code, rule_expression, rule_type, description)| {
                AttributeDerivation {
                    derived_code,
                    source_code,
                    rule_expression,
                    rule_type,
                    description,
                }
            })
            .collect())
    }
}
