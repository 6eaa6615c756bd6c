use super::{Actor, BulkSyncResult, SyncService, ADMIN_REQUIRED};
use crate::error::Result;

impl SyncService {
    /// Syncs up to `limit` unsynced submissions, least-attempted and oldest first.
    ///
    /// Store faults abort the batch with an error; per-record vendor failures do not. Records
    /// already processed keep their outcome either way.
    pub async fn bulk_sync(&self, actor: &Actor, limit: u32) -> Result<BulkSyncResult> {
        if !self.authorize(actor, "bulk_sync") {
            return Ok(BulkSyncResult::rejected(ADMIN_REQUIRED));
        }

        let candidates = self.store.unsynced_candidates(limit)?;
        log::info!("Bulk sync: {} candidate(s), limit {}", candidates.len(), limit);
        self.run_batch(&candidates).await
    }

    /// Re-attempts failed submissions whose attempt count is still below `max_retries`.
    /// Records at or past the ceiling are left for an operator.
    pub async fn retry_failed_syncs(
        &self,
        actor: &Actor,
        max_retries: u32,
    ) -> Result<BulkSyncResult> {
        if !self.authorize(actor, "retry_failed_syncs") {
            return Ok(BulkSyncResult::rejected(ADMIN_REQUIRED));
        }

        let candidates = self
            .store
            .retry_candidates(max_retries, self.settings.retry_batch_size)?;
        log::info!(
            "Retry: {} failed submission(s) under {} attempts",
            candidates.len(),
            max_retries
        );
        self.run_batch(&candidates).await
    }

    async fn run_batch(&self, ids: &[String]) -> Result<BulkSyncResult> {
        if ids.is_empty() {
            return Ok(BulkSyncResult::default());
        }

        if let Some(failed) = self.preflight().await {
            log::warn!(
                "Batch of {} skipped, {} failed: {}",
                ids.len(),
                failed.test_name,
                failed.details
            );
            return Ok(BulkSyncResult::rejected(format!(
                "{}: {}",
                failed.test_name, failed.details
            )));
        }

        let mut result = BulkSyncResult::default();
        for (i, id) in ids.iter().enumerate() {
            if i > 0 && !self.settings.inter_call_delay.is_zero() {
                tokio::time::sleep(self.settings.inter_call_delay).await;
            }
            result.record(self.execute(id).await?);
        }

        log::info!(
            "Batch finished: {} processed, {} synced, {} failed",
            result.total_processed,
            result.successful_syncs,
            result.errors
        );
        Ok(result)
    }
}
