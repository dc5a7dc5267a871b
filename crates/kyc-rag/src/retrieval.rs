//! pgvector-backed retrieval over attribute, document, regulation, section
//! and cluster embeddings.
//!
//! Ordering is always ascending cosine distance (`embedding <=> query`);
//! similarity is `1 - distance`. List operations clamp limits to the hard
//! ceiling and support offsets.

use pgvector::Vector;
use sqlx::PgPool;
use tracing::{instrument, warn};

use crate::error::RagError;
use crate::types::{
    AttributeMetadata, AttributeSearchResult, CatalogSearchHit, ClusterRecommendation,
    DocumentSectionHit, LinkedDocument, LinkedRegulation, MultiModalResult, RagStats, RiskBucket,
    RiskLevel,
};

pub const DEFAULT_LIMIT: i64 = 10;
pub const MAX_LIMIT: i64 = 100;

/// Clamp a requested limit to `[1, MAX_LIMIT]`, defaulting when absent or
/// non-positive.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(l) if l > 0 => l.min(MAX_LIMIT),
        _ => DEFAULT_LIMIT,
    }
}

type MetadataRow = (
    String,
    Vec<String>,
    String,
    Vec<String>,
    String,
    Vec<String>,
    Vec<String>,
    String,
    String,
    Option<i32>,
);

const METADATA_COLUMNS: &str = "attribute_code, synonyms, data_type, domain_values, risk_level, \
     example_values, regulatory_citations, business_context, data_sensitivity, retention_period_days";

#[derive(Clone)]
pub struct RagRepository {
    pool: PgPool,
}

impl RagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ------------------------------------------------------------------
    // Attribute search
    // ------------------------------------------------------------------

    /// Top-`limit` attributes by cosine distance to the query vector,
    /// closest first. Attributes without embeddings never appear.
    #[instrument(skip(self, query), fields(limit = limit))]
    pub async fn search_by_vector(
        &self,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<AttributeSearchResult>, RagError> {
        let query_vec = Vector::from(query.to_vec());
        let sql = format!(
            r#"
            SELECT {METADATA_COLUMNS}, (embedding <=> $1::vector)::real AS distance
            FROM kyc_attribute_metadata
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, (String, Vec<String>, String, Vec<String>, String, Vec<String>, Vec<String>, String, String, Option<i32>, f32)>(&sql)
            .bind(&query_vec)
            .bind(clamp_limit(Some(limit)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(search_result).collect())
    }

    /// Substring search over code and business context, plus exact synonym
    /// membership. Ordered by code.
    pub async fn search_by_text(&self, term: &str) -> Result<Vec<AttributeMetadata>, RagError> {
        let pattern = format!("%{term}%");
        let sql = format!(
            r#"
            SELECT {METADATA_COLUMNS}
            FROM kyc_attribute_metadata
            WHERE attribute_code ILIKE $1
               OR business_context ILIKE $1
               OR $2 = ANY(synonyms)
            ORDER BY attribute_code
            "#
        );
        let rows = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(&pattern)
            .bind(term)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(metadata).collect())
    }

    /// Attributes closest to the embedding of `code`, excluding `code`
    /// itself.
    pub async fn find_similar_attributes(
        &self,
        code: &str,
        limit: i64,
    ) -> Result<Vec<AttributeSearchResult>, RagError> {
        let embedding = sqlx::query_scalar::<_, Option<Vector>>(
            "SELECT embedding FROM kyc_attribute_metadata WHERE attribute_code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RagError::not_found("attribute", code))?
        .ok_or_else(|| RagError::NoEmbedding(code.to_string()))?;

        let sql = format!(
            r#"
            SELECT {METADATA_COLUMNS}, (embedding <=> $1::vector)::real AS distance
            FROM kyc_attribute_metadata
            WHERE embedding IS NOT NULL AND attribute_code <> $2
            ORDER BY embedding <=> $1::vector
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, (String, Vec<String>, String, Vec<String>, String, Vec<String>, Vec<String>, String, String, Option<i32>, f32)>(&sql)
            .bind(&embedding)
            .bind(code)
            .bind(clamp_limit(Some(limit)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(search_result).collect())
    }

    pub async fn get_metadata(&self, code: &str) -> Result<AttributeMetadata, RagError> {
        let sql = format!(
            "SELECT {METADATA_COLUMNS} FROM kyc_attribute_metadata WHERE attribute_code = $1"
        );
        let row = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| RagError::not_found("attribute", code))?;
        Ok(metadata(row))
    }

    pub async fn list_all_metadata(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<AttributeMetadata>, RagError> {
        let sql = format!(
            r#"
            SELECT {METADATA_COLUMNS}
            FROM kyc_attribute_metadata
            ORDER BY attribute_code
            LIMIT $1 OFFSET $2
            "#
        );
        let rows = sqlx::query_as::<_, MetadataRow>(&sql)
            .bind(clamp_limit(Some(limit)))
            .bind(offset.max(0))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(metadata).collect())
    }

    /// Codes awaiting an embedding backfill.
    pub async fn get_attributes_without_embeddings(&self) -> Result<Vec<String>, RagError> {
        Ok(sqlx::query_scalar::<_, String>(
            r#"
            SELECT attribute_code FROM kyc_attribute_metadata
            WHERE embedding IS NULL
            ORDER BY attribute_code
            "#,
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn count_metadata(&self) -> Result<i64, RagError> {
        Ok(
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM kyc_attribute_metadata")
                .fetch_one(&self.pool)
                .await?,
        )
    }

    pub async fn count_embeddings(&self) -> Result<i64, RagError> {
        Ok(sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM kyc_attribute_metadata WHERE embedding IS NOT NULL",
        )
        .fetch_one(&self.pool)
        .await?)
    }

    pub async fn stats(&self) -> Result<RagStats, RagError> {
        let total = self.count_metadata().await?;
        let with_embeddings = self.count_embeddings().await?;
        let coverage_percent = if total > 0 {
            with_embeddings as f64 * 100.0 / total as f64
        } else {
            0.0
        };

        let risk_distribution = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT risk_level, COUNT(*) AS count
            FROM kyc_attribute_metadata
            GROUP BY risk_level
            ORDER BY count DESC, risk_level
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(risk_level, count)| RiskBucket { risk_level, count })
        .collect();

        Ok(RagStats {
            total,
            with_embeddings,
            coverage_percent,
            risk_distribution,
        })
    }

    // ------------------------------------------------------------------
    // Multi-modal enrichment
    // ------------------------------------------------------------------

    /// Vector search over attributes, each hit enriched with its linked
    /// documents and regulations ranked by relevance. A failed secondary
    /// join degrades to an empty list rather than failing the request.
    #[instrument(skip(self, query), fields(limit = limit))]
    pub async fn search_attributes_and_docs(
        &self,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<MultiModalResult>, RagError> {
        let hits = self.search_by_vector(query, limit).await?;
        let mut results = Vec::with_capacity(hits.len());

        for hit in hits {
            let code = hit.attribute.attribute_code.clone();
            let documents = match self.linked_documents(&code).await {
                Ok(docs) => docs,
                Err(e) => {
                    warn!(attribute = %code, "document enrichment failed: {e}");
                    Vec::new()
                }
            };
            let regulations = match self.linked_regulations(&code).await {
                Ok(regs) => regs,
                Err(e) => {
                    warn!(attribute = %code, "regulation enrichment failed: {e}");
                    Vec::new()
                }
            };
            results.push(MultiModalResult {
                attribute: hit,
                documents,
                regulations,
            });
        }

        Ok(results)
    }

    async fn linked_documents(&self, attribute_code: &str) -> Result<Vec<LinkedDocument>, RagError> {
        let rows = sqlx::query_as::<_, (String, String, String, bool, String, f32)>(
            r#"
            SELECT d.code, d.name, l.source_tier, l.is_mandatory, l.jurisdiction, l.relevance_score
            FROM kyc_attr_doc_links l
            JOIN kyc_documents d ON d.code = l.document_code
            WHERE l.attribute_code = $1
            ORDER BY l.relevance_score DESC, d.code
            "#,
        )
        .bind(attribute_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(code, name, source_tier, is_mandatory, jurisdiction, relevance_score)| {
                    LinkedDocument {
                        code,
                        name,
                        source_tier,
                        is_mandatory,
                        jurisdiction,
                        relevance_score,
                    }
                },
            )
            .collect())
    }

    async fn linked_regulations(
        &self,
        attribute_code: &str,
    ) -> Result<Vec<LinkedRegulation>, RagError> {
        let rows = sqlx::query_as::<_, (String, String, String, f32)>(
            r#"
            SELECT r.code, r.name, r.jurisdiction, l.relevance_score
            FROM kyc_attr_doc_links l
            JOIN kyc_regulations r ON r.code = l.regulation_code
            WHERE l.attribute_code = $1 AND l.regulation_code <> ''
            ORDER BY l.relevance_score DESC, r.code
            "#,
        )
        .bind(attribute_code)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(code, name, jurisdiction, relevance_score)| LinkedRegulation {
                code,
                name,
                jurisdiction,
                relevance_score,
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Document, regulation and section search
    // ------------------------------------------------------------------

    pub async fn search_documents(
        &self,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<CatalogSearchHit>, RagError> {
        self.catalog_search("kyc_documents", query, limit).await
    }

    pub async fn search_regulations(
        &self,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<CatalogSearchHit>, RagError> {
        self.catalog_search("kyc_regulations", query, limit).await
    }

    async fn catalog_search(
        &self,
        table: &str,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<CatalogSearchHit>, RagError> {
        let query_vec = Vector::from(query.to_vec());
        let sql = format!(
            r#"
            SELECT code, name, jurisdiction, (embedding <=> $1::vector)::real AS distance
            FROM {table}
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#
        );
        let rows = sqlx::query_as::<_, (String, String, String, f32)>(&sql)
            .bind(&query_vec)
            .bind(clamp_limit(Some(limit)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(code, name, jurisdiction, distance)| CatalogSearchHit {
                code,
                name,
                jurisdiction,
                similarity_score: 1.0 - distance,
                distance,
            })
            .collect())
    }

    pub async fn search_document_sections(
        &self,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<DocumentSectionHit>, RagError> {
        let query_vec = Vector::from(query.to_vec());
        let rows = sqlx::query_as::<_, (String, String, String, String, Option<i32>, f32)>(
            r#"
            SELECT document_code, section_number, section_title, text_excerpt, page_number,
                   (embedding <=> $1::vector)::real AS distance
            FROM kyc_document_sections
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#,
        )
        .bind(&query_vec)
        .bind(clamp_limit(Some(limit)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(document_code, section_number, section_title, text_excerpt, page_number, distance)| {
                    DocumentSectionHit {
                        document_code,
                        section_number,
                        section_title,
                        text_excerpt,
                        page_number,
                        similarity_score: 1.0 - distance,
                    }
                },
            )
            .collect())
    }

    // ------------------------------------------------------------------
    // Clusters
    // ------------------------------------------------------------------

    /// Coarse retrieval against stored cluster centroids.
    pub async fn recommend_clusters(
        &self,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<ClusterRecommendation>, RagError> {
        let query_vec = Vector::from(query.to_vec());
        let rows = sqlx::query_as::<_, (String, String, i32, f32)>(
            r#"
            SELECT cluster_code, name, member_count,
                   (centroid <=> $1::vector)::real AS distance
            FROM rag_clusters
            WHERE centroid IS NOT NULL
            ORDER BY centroid <=> $1::vector
            LIMIT $2
            "#,
        )
        .bind(&query_vec)
        .bind(clamp_limit(Some(limit)))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(cluster_code, cluster_name, member_count, distance)| ClusterRecommendation {
                cluster_code,
                cluster_name,
                similarity: 1.0 - distance,
                member_count,
            })
            .collect())
    }

    /// Vector search restricted to the members of one cluster.
    pub async fn search_within_cluster(
        &self,
        cluster_code: &str,
        query: &[f32],
        limit: i64,
    ) -> Result<Vec<AttributeSearchResult>, RagError> {
        let query_vec = Vector::from(query.to_vec());
        let sql = format!(
            r#"
            SELECT m.attribute_code, m.synonyms, m.data_type, m.domain_values, m.risk_level,
                   m.example_values, m.regulatory_citations, m.business_context,
                   m.data_sensitivity, m.retention_period_days,
                   (m.embedding <=> $2::vector)::real AS distance
            FROM kyc_attribute_metadata m
            JOIN kyc_attribute_clusters c ON m.attribute_code = ANY(c.attribute_codes)
            WHERE c.cluster_code = $1 AND m.embedding IS NOT NULL
            ORDER BY m.embedding <=> $2::vector
            LIMIT $3
            "#
        );
        let rows = sqlx::query_as::<_, (String, Vec<String>, String, Vec<String>, String, Vec<String>, Vec<String>, String, String, Option<i32>, f32)>(&sql)
            .bind(cluster_code)
            .bind(&query_vec)
            .bind(clamp_limit(Some(limit)))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(search_result).collect())
    }
}

fn metadata(row: MetadataRow) -> AttributeMetadata {
    let (
        attribute_code,
        synonyms,
        data_type,
        domain_values,
        risk_level,
        example_values,
        regulatory_citations,
        business_context,
        data_sensitivity,
        retention_period_days,
    ) = row;
    let risk_level = RiskLevel::parse(&risk_level).unwrap_or_else(|| {
        warn!(attribute = %attribute_code, "unknown risk level '{risk_level}', defaulting to LOW");
        RiskLevel::Low
    });
    AttributeMetadata {
        attribute_code,
        synonyms,
        data_type,
        domain_values,
        risk_level,
        example_values,
        regulatory_citations,
        business_context,
        data_sensitivity,
        retention_period_days,
    }
}

#[allow(clippy::type_complexity)]
fn search_result(
    row: (String, Vec<String>, String, Vec<String>, String, Vec<String>, Vec<String>, String, String, Option<i32>, f32),
) -> AttributeSearchResult {
    let (a, b, c, d, e, f, g, h, i, j, distance) = row;
    AttributeSearchResult {
        attribute: metadata((a, b, c, d, e, f, g, h, i, j)),
        similarity_score: 1.0 - distance,
        distance,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_clamp_to_ceiling_and_default() {
        assert_eq!(clamp_limit(None), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(0)), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(-3)), DEFAULT_LIMIT);
        assert_eq!(clamp_limit(Some(25)), 25);
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIMIT);
    }
}
