//! Persistence seam for the engine.

use async_trait::async_trait;

use kyc_case_store::{CaseStore, SavedVersion, StoreError};
use kyc_dsl_core::validator::ValidationReport;

#[async_trait]
pub trait CaseVersionPort: Send + Sync {
    async fn latest_dsl(&self, name: &str) -> Result<String, StoreError>;

    async fn save_version(
        &self,
        name: &str,
        dsl_snapshot: &str,
        status: &str,
    ) -> Result<SavedVersion, StoreError>;

    async fn record_amendment(
        &self,
        name: &str,
        new_version: i32,
        amendment_type: &str,
        actor: &str,
        note: &str,
    ) -> Result<(), StoreError>;

    async fn record_validation(
        &self,
        report: &ValidationReport,
        actor: &str,
    ) -> Result<(), StoreError>;
}

#[async_trait]
impl CaseVersionPort for CaseStore {
    async fn latest_dsl(&self, name: &str) -> Result<String, StoreError> {
        self.get_latest_dsl(name).await
    }

    async fn save_version(
        &self,
        name: &str,
        dsl_snapshot: &str,
        status: &str,
    ) -> Result<SavedVersion, StoreError> {
        self.save_case_version(name, dsl_snapshot, status).await
    }

    async fn record_amendment(
        &self,
        name: &str,
        new_version: i32,
        amendment_type: &str,
        actor: &str,
        note: &str,
    ) -> Result<(), StoreError> {
        self.insert_amendment(name, new_version, amendment_type, actor, note)
            .await
    }

    async fn record_validation(
        &self,
        report: &ValidationReport,
        actor: &str,
    ) -> Result<(), StoreError> {
        CaseStore::record_validation(self, report, actor).await
    }
}
