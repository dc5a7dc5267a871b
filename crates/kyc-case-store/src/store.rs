//! Postgres-backed case store.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use kyc_dsl_core::validator::ValidationReport;

use crate::model::{
    AmendmentRecord, CaseVersionRecord, GrammarRecord, SavedVersion, StoreError,
};

/// Saves race against each other per case name; a loser retries and lands
/// on the winner's version + 1.
const SAVE_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct CaseStore {
    pool: PgPool,
}

impl CaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Sha-256 of a snapshot, hex-encoded. The idempotence key for saves.
    pub fn hash_snapshot(dsl_snapshot: &str) -> String {
        hex::encode(Sha256::digest(dsl_snapshot.as_bytes()))
    }

    // ------------------------------------------------------------------
    // Versioned snapshots
    // ------------------------------------------------------------------

    /// Append a new version for a case, starting at 1. If the latest
    /// version carries an identical hash the save collapses onto it and no
    /// row is inserted.
    pub async fn save_case_version(
        &self,
        name: &str,
        dsl_snapshot: &str,
        status: &str,
    ) -> Result<SavedVersion, StoreError> {
        let hash = Self::hash_snapshot(dsl_snapshot);

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_save(name, dsl_snapshot, &hash, status).await {
                Ok(saved) => return Ok(saved),
                Err(StoreError::Conflict(msg)) if attempt < SAVE_RETRIES => {
                    warn!(case = name, attempt, "version conflict, retrying: {msg}");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_save(
        &self,
        name: &str,
        dsl_snapshot: &str,
        hash: &str,
        status: &str,
    ) -> Result<SavedVersion, StoreError> {
        let mut tx = self.pool.begin().await?;

        let latest = sqlx::query_as::<_, (i32, String)>(
            r#"
            SELECT version, sha256_hash
            FROM kyc_cases
            WHERE name = $1
            ORDER BY version DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(name)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some((version, latest_hash)) = &latest {
            if latest_hash == hash {
                tx.rollback().await?;
                debug!(case = name, version, "identical snapshot, collapsing save");
                return Ok(SavedVersion {
                    version: *version,
                    sha256_hash: hash.to_string(),
                    created: false,
                });
            }
        }

        let version = latest.map(|(v, _)| v + 1).unwrap_or(1);

        let inserted = sqlx::query(
            r#"
            INSERT INTO kyc_cases (name, version, dsl_snapshot, sha256_hash, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(name)
        .bind(version)
        .bind(dsl_snapshot)
        .bind(hash)
        .bind(status)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(StoreError::Conflict(format!(
                    "case '{name}' version {version} already exists"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit().await?;
        info!(case = name, version, "saved case version");

        Ok(SavedVersion {
            version,
            sha256_hash: hash.to_string(),
            created: true,
        })
    }

    pub async fn get_latest_dsl(&self, name: &str) -> Result<String, StoreError> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT dsl_snapshot FROM kyc_cases
            WHERE name = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("case", name))
    }

    pub async fn get_latest_version(&self, name: &str) -> Result<CaseVersionRecord, StoreError> {
        self.fetch_versions(name, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found("case", name))
    }

    /// All versions of a case, newest first.
    pub async fn list_case_versions(
        &self,
        name: &str,
    ) -> Result<Vec<CaseVersionRecord>, StoreError> {
        let versions = self.fetch_versions(name, None).await?;
        if versions.is_empty() {
            return Err(StoreError::not_found("case", name));
        }
        Ok(versions)
    }

    async fn fetch_versions(
        &self,
        name: &str,
        limit: Option<i64>,
    ) -> Result<Vec<CaseVersionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i32, String, String, String, Option<String>, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT c.name, c.version, c.dsl_snapshot, c.sha256_hash, c.status,
                   a.amendment_type, c.created_at
            FROM kyc_cases c
            LEFT JOIN case_amendments a
              ON a.case_name = c.name AND a.new_version = c.version
            WHERE c.name = $1
            ORDER BY c.version DESC
            LIMIT $2
            "#,
        )
        .bind(name)
        .bind(limit.unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(version_record).collect())
    }

    /// Latest snapshot of every case, ordered by name, with offset/limit
    /// paging. Content filters are applied by the caller on the bound case.
    pub async fn list_latest_cases(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CaseVersionRecord>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i32, String, String, String, Option<String>, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT DISTINCT ON (c.name)
                   c.name, c.version, c.dsl_snapshot, c.sha256_hash, c.status,
                   a.amendment_type, c.created_at
            FROM kyc_cases c
            LEFT JOIN case_amendments a
              ON a.case_name = c.name AND a.new_version = c.version
            ORDER BY c.name, c.version DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(version_record).collect())
    }

    /// Remove every version of a case. Destructive; there is no soft
    /// delete.
    pub async fn delete_case(&self, name: &str) -> Result<u64, StoreError> {
        sqlx::query("DELETE FROM case_amendments WHERE case_name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let result = sqlx::query("DELETE FROM kyc_cases WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("case", name));
        }
        info!(case = name, versions = result.rows_affected(), "deleted case");
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------
    // Amendment log
    // ------------------------------------------------------------------

    pub async fn insert_amendment(
        &self,
        case_name: &str,
        new_version: i32,
        amendment_type: &str,
        actor: &str,
        note: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO case_amendments (case_name, new_version, amendment_type, actor, note)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(case_name)
        .bind(new_version)
        .bind(amendment_type)
        .bind(actor)
        .bind(note)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_amendments(
        &self,
        case_name: &str,
    ) -> Result<Vec<AmendmentRecord>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i32, String, String, String, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT case_name, new_version, amendment_type, actor, note, created_at
            FROM case_amendments
            WHERE case_name = $1
            ORDER BY new_version DESC
            "#,
        )
        .bind(case_name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(case_name, new_version, amendment_type, actor, note, created_at)| {
                    AmendmentRecord {
                        case_name,
                        new_version,
                        amendment_type,
                        actor,
                        note,
                        created_at,
                    }
                },
            )
            .collect())
    }

    // ------------------------------------------------------------------
    // Grammar versioning
    // ------------------------------------------------------------------

    /// Append-only; inserting an existing (name, version) is a no-op.
    pub async fn insert_grammar(
        &self,
        name: &str,
        version: &str,
        ebnf: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO kyc_grammars (name, version, ebnf)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, version) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(version)
        .bind(ebnf)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// The most recent grammar for a name.
    pub async fn get_grammar(&self, name: &str) -> Result<GrammarRecord, StoreError> {
        let row = sqlx::query_as::<_, (String, String, String, chrono::DateTime<chrono::Utc>)>(
            r#"
            SELECT name, version, ebnf, created_at
            FROM kyc_grammars
            WHERE name = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::not_found("grammar", name))?;

        Ok(GrammarRecord {
            name: row.0,
            version: row.1,
            ebnf: row.2,
            created_at: row.3,
        })
    }

    // ------------------------------------------------------------------
    // Validation audit
    // ------------------------------------------------------------------

    /// Persist a validation report and its findings. Callers treat failures
    /// here as non-fatal; the validation result stands either way.
    pub async fn record_validation(
        &self,
        report: &ValidationReport,
        actor: &str,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let validation_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO kyc_case_validations
                (case_name, version, grammar_version, ontology_version,
                 validator_actor, status, error_message,
                 total_checks, passed_checks, failed_checks)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&report.case_name)
        .bind(report.version)
        .bind(&report.grammar_version)
        .bind(&report.ontology_version)
        .bind(actor)
        .bind(report.status())
        .bind(&report.error_message)
        .bind(report.total_checks as i32)
        .bind(report.passed_checks as i32)
        .bind(report.failed_checks as i32)
        .fetch_one(&mut *tx)
        .await?;

        for finding in &report.findings {
            sqlx::query(
                r#"
                INSERT INTO kyc_validation_findings
                    (validation_id, check_type, check_name, status, message, entity_ref, severity)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(validation_id)
            .bind(finding.check_type.as_str())
            .bind(&finding.check_name)
            .bind(finding.status.as_str())
            .bind(&finding.message)
            .bind(&finding.entity_ref)
            .bind(finding.severity.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

fn version_record(
    row: (String, i32, String, String, String, Option<String>, chrono::DateTime<chrono::Utc>),
) -> CaseVersionRecord {
    let (case_name, version, dsl_snapshot, sha256_hash, status, amendment_type, created_at) = row;
    CaseVersionRecord {
        case_name,
        version,
        dsl_snapshot,
        sha256_hash,
        status,
        amendment_type,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_hash_is_stable_sha256() {
        let a = CaseStore::hash_snapshot("(kyc-case TEST)");
        let b = CaseStore::hash_snapshot("(kyc-case TEST)");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, CaseStore::hash_snapshot("(kyc-case OTHER)"));
    }

    #[test]
    fn known_hash_vector() {
        // sha256 of the empty string.
        assert_eq!(
            CaseStore::hash_snapshot(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
