//! Feedback capture and analytics.
//!
//! Inserts are append-only. A row trigger (see the `rag_feedback`
//! migration) adjusts `kyc_attr_doc_links.relevance_score` inside the
//! insert transaction: a failed adjustment rolls the feedback back. The
//! scoring rule lives in [`adjusted_relevance`] so the SQL and the tests
//! agree on the arithmetic.

use sqlx::PgPool;
use tracing::{info, instrument};

use crate::error::RagError;
use crate::types::{
    AttributeFeedbackRow, FeedbackAnalytics, FeedbackEntry, FeedbackSummaryRow, SentimentTrendPoint,
    Sentiment, AgentType,
};

/// Step size of one feedback adjustment at full confidence.
pub const FEEDBACK_STEP: f32 = 0.05;

/// The relevance adjustment rule mirrored by the database trigger:
/// `new = clamp(old + sign * 0.05 * confidence, 0.0, 1.0)`.
pub fn adjusted_relevance(old: f32, sentiment: Sentiment, confidence: f32) -> f32 {
    (old + sentiment.sign() * FEEDBACK_STEP * confidence).clamp(0.0, 1.0)
}

#[derive(Clone)]
pub struct FeedbackRepository {
    pool: PgPool,
}

impl FeedbackRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a feedback entry. The relevance trigger runs inside the same
    /// transaction as the insert.
    #[instrument(skip(self, entry), fields(sentiment = entry.sentiment.as_str()))]
    pub async fn insert_feedback(&self, entry: &FeedbackEntry) -> Result<i64, RagError> {
        if !entry.has_target() {
            return Err(RagError::MissingFeedbackTarget);
        }

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO rag_feedback
                (query_text, attribute_code, document_code, regulation_code,
                 sentiment, confidence, agent_name, agent_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(&entry.query_text)
        .bind(&entry.attribute_code)
        .bind(&entry.document_code)
        .bind(&entry.regulation_code)
        .bind(entry.sentiment.as_str())
        .bind(entry.confidence.clamp(0.0, 1.0))
        .bind(&entry.agent_name)
        .bind(entry.agent_type.as_str())
        .fetch_one(&self.pool)
        .await?;

        info!(id, "feedback recorded");
        Ok(id)
    }

    pub async fn get_recent_feedback(&self, limit: i64) -> Result<Vec<FeedbackEntry>, RagError> {
        self.fetch_feedback(
            r#"
            SELECT id, query_text, attribute_code, document_code, regulation_code,
                   sentiment, confidence, agent_name, agent_type, created_at
            FROM rag_feedback
            ORDER BY created_at DESC
            LIMIT $1
            "#,
            None,
            limit,
        )
        .await
    }

    pub async fn get_attribute_feedback(
        &self,
        attribute_code: &str,
        limit: i64,
    ) -> Result<Vec<FeedbackEntry>, RagError> {
        self.fetch_feedback(
            r#"
            SELECT id, query_text, attribute_code, document_code, regulation_code,
                   sentiment, confidence, agent_name, agent_type, created_at
            FROM rag_feedback
            WHERE attribute_code = $2
            ORDER BY created_at DESC
            LIMIT $1
            "#,
            Some(attribute_code),
            limit,
        )
        .await
    }

    async fn fetch_feedback(
        &self,
        sql: &str,
        code: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FeedbackEntry>, RagError> {
        let mut query = sqlx::query_as::<_, (i64, String, Option<String>, Option<String>, Option<String>, String, f32, Option<String>, String, chrono::DateTime<chrono::Utc>)>(sql)
            .bind(limit.max(1));
        if let Some(code) = code {
            query = query.bind(code);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, query_text, attribute_code, document_code, regulation_code, sentiment, confidence, agent_name, agent_type, created_at)| {
                    FeedbackEntry {
                        id: Some(id),
                        query_text,
                        attribute_code,
                        document_code,
                        regulation_code,
                        sentiment: Sentiment::parse(&sentiment).unwrap_or(Sentiment::Neutral),
                        confidence,
                        agent_name,
                        agent_type: AgentType::parse(&agent_type).unwrap_or(AgentType::Automated),
                        created_at: Some(created_at),
                    }
                },
            )
            .collect())
    }

    /// Counts and average confidence grouped by (sentiment, agent type).
    pub async fn get_feedback_summary(
        &self,
        limit: i64,
    ) -> Result<Vec<FeedbackSummaryRow>, RagError> {
        let rows = sqlx::query_as::<_, (String, String, i64, f64)>(
            r#"
            SELECT sentiment, agent_type, COUNT(*) AS count, AVG(confidence)::float8 AS avg_confidence
            FROM rag_feedback
            GROUP BY sentiment, agent_type
            ORDER BY count DESC, sentiment, agent_type
            LIMIT $1
            "#,
        )
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(sentiment, agent_type, count, avg_confidence)| FeedbackSummaryRow {
                sentiment,
                agent_type,
                count,
                avg_confidence,
            })
            .collect())
    }

    /// Counts grouped by (attribute, sentiment) for the busiest attributes.
    pub async fn get_attribute_feedback_summary(
        &self,
        limit: i64,
    ) -> Result<Vec<AttributeFeedbackRow>, RagError> {
        let rows = sqlx::query_as::<_, (String, String, i64)>(
            r#"
            SELECT attribute_code, sentiment, COUNT(*) AS count
            FROM rag_feedback
            WHERE attribute_code IS NOT NULL
            GROUP BY attribute_code, sentiment
            ORDER BY count DESC, attribute_code
            LIMIT $1
            "#,
        )
        .bind(limit.max(1))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(attribute_code, sentiment, count)| AttributeFeedbackRow {
                attribute_code,
                sentiment,
                count,
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_feedback_analytics(&self, top_n: i64) -> Result<FeedbackAnalytics, RagError> {
        let (total, positive, negative, neutral, avg_confidence) =
            sqlx::query_as::<_, (i64, i64, i64, i64, Option<f64>)>(
                r#"
                SELECT COUNT(*),
                       COUNT(*) FILTER (WHERE sentiment = 'positive'),
                       COUNT(*) FILTER (WHERE sentiment = 'negative'),
                       COUNT(*) FILTER (WHERE sentiment = 'neutral'),
                       AVG(confidence)::float8
                FROM rag_feedback
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let by_agent_type = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT agent_type, COUNT(*) FROM rag_feedback
            GROUP BY agent_type
            ORDER BY COUNT(*) DESC, agent_type
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let top_attributes = self.get_attribute_feedback_summary(top_n.max(1)).await?;
        let recent = self.get_recent_feedback(top_n.max(1)).await?;

        let sentiment_trend = sqlx::query_as::<_, (chrono::NaiveDate, i64, i64, i64)>(
            r#"
            SELECT created_at::date AS day,
                   COUNT(*) FILTER (WHERE sentiment = 'positive'),
                   COUNT(*) FILTER (WHERE sentiment = 'negative'),
                   COUNT(*) FILTER (WHERE sentiment = 'neutral')
            FROM rag_feedback
            WHERE created_at >= NOW() - INTERVAL '30 days'
            GROUP BY day
            ORDER BY day
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(day, positive, negative, neutral)| SentimentTrendPoint {
            day,
            positive,
            negative,
            neutral,
        })
        .collect();

        Ok(FeedbackAnalytics {
            total,
            positive,
            negative,
            neutral,
            avg_confidence: avg_confidence.unwrap_or(0.0),
            by_agent_type,
            top_attributes,
            recent,
            sentiment_trend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_feedback_steps_down_by_confidence() {
        let score = adjusted_relevance(0.5, Sentiment::Negative, 1.0);
        assert!((score - 0.45).abs() < 1e-6);
    }

    #[test]
    fn repeated_negative_feedback_clamps_at_zero() {
        let mut score = 0.5_f32;
        for _ in 0..10 {
            score = adjusted_relevance(score, Sentiment::Negative, 1.0);
        }
        assert_eq!(score, 0.0);

        // One positive at half confidence lifts it off the floor.
        score = adjusted_relevance(score, Sentiment::Positive, 0.5);
        assert!((score - 0.025).abs() < 1e-6);
    }

    #[test]
    fn positive_feedback_clamps_at_one() {
        let score = adjusted_relevance(0.99, Sentiment::Positive, 1.0);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn neutral_feedback_is_inert() {
        assert_eq!(adjusted_relevance(0.42, Sentiment::Neutral, 1.0), 0.42);
    }
}
