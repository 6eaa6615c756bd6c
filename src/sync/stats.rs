use super::{SyncService, SyncStats};
use crate::error::Result;
use crate::store::SyncCounts;

impl From<SyncCounts> for SyncStats {
    fn from(counts: SyncCounts) -> Self {
        let sync_rate = if counts.total > 0 {
            counts.synced as f64 / counts.total as f64 * 100.0
        } else {
            0.0
        };

        Self {
            total_submissions: counts.total,
            synced_count: counts.synced,
            pending_count: counts.total - counts.synced,
            error_count: counts.with_error,
            sync_rate,
        }
    }
}

impl SyncService {
    /// `error_count` counts submissions still carrying a `last_sync_error`, regardless of
    /// whether the matching ledger rows were resolved.
    pub fn get_sync_stats(&self) -> Result<SyncStats> {
        Ok(self.store.sync_counts()?.into())
    }

    pub fn get_unsynced_count(&self) -> Result<u64> {
        self.store.count_unsynced()
    }
}
