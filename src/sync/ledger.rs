use chrono::{Duration, Utc};

use super::{Actor, SyncService};
use crate::error::{Error, Result};
use crate::store::SyncError;

impl SyncService {
    pub fn get_sync_errors(&self, limit: u32) -> Result<Vec<SyncError>> {
        self.store.list_unresolved(limit)
    }

    /// Marks a ledger entry resolved. Returns false instead of failing when nothing was updated,
    /// including for non-admin callers. Resolving twice is harmless.
    pub fn resolve_error(&self, actor: &Actor, error_id: &str, notes: Option<&str>) -> bool {
        if !self.authorize(actor, "resolve_error") {
            return false;
        }

        match self.store.resolve_error(error_id, Some(&actor.id), notes) {
            Ok(true) => {
                log::info!("Sync error {} resolved by {}", error_id, actor.id);
                true
            }
            Ok(false) => {
                log::warn!("Sync error {} not found", error_id);
                false
            }
            Err(e) => {
                log::error!("Error resolving sync error {}: {}", error_id, e);
                false
            }
        }
    }

    /// Deletes resolved ledger entries older than the retention window. Unresolved entries are
    /// never purged.
    pub fn purge_resolved_errors(&self, actor: &Actor, older_than_days: u32) -> Result<usize> {
        if !self.authorize(actor, "purge_resolved_errors") {
            return Ok(0);
        }

        let cutoff = Utc::now()
            .checked_sub_signed(Duration::days(i64::from(older_than_days)))
            .ok_or_else(|| {
                Error::Config(format!("retention window of {older_than_days} days is out of range"))
            })?;
        let purged = self.store.purge_resolved_before(cutoff)?;
        log::info!("Purged {} resolved sync error(s) older than {} days", purged, older_than_days);
        Ok(purged)
    }
}
