use super::{Actor, SyncResult, SyncService, ADMIN_REQUIRED};
use crate::error::Result;
use crate::integrations::ContactProperties;
use crate::store::SUBMISSIONS_TABLE;

pub const NOT_FOUND: &str = "Submission not found";
pub const IN_PROGRESS: &str = "Sync already in progress";

struct Upserted {
    contact_id: String,
    created: bool,
}

impl SyncService {
    /// Syncs one submission. Every outcome, including local faults, comes back as a result.
    pub async fn sync_submission(&self, actor: &Actor, submission_id: &str) -> SyncResult {
        if !self.authorize(actor, "sync_submission") {
            return SyncResult::failed(submission_id, ADMIN_REQUIRED);
        }

        match self.execute(submission_id).await {
            Ok(result) => result,
            Err(e) => {
                log::error!("Sync of submission {} failed: {}", submission_id, e);
                SyncResult::failed(submission_id, e.to_string())
            }
        }
    }

    /// Vendor failures are captured in the result and the ledger; only store faults escape.
    pub(crate) async fn execute(&self, submission_id: &str) -> Result<SyncResult> {
        let Some(submission) = self.store.get_submission(submission_id)? else {
            log::warn!("Submission {} does not exist", submission_id);
            return Ok(SyncResult::failed(submission_id, NOT_FOUND));
        };

        if !self.store.claim_for_sync(submission_id, self.settings.lease)? {
            log::warn!("Submission {} is already being synced", submission_id);
            return Ok(SyncResult {
                contact_email: Some(submission.email),
                ..SyncResult::failed(submission_id, IN_PROGRESS)
            });
        }

        let properties = self.crm.map_submission(&submission);

        match self.upsert(&properties).await {
            Ok(upserted) => {
                self.store.mark_synced(submission_id, &upserted.contact_id)?;
                let action = if upserted.created { "created" } else { "updated" };
                log::info!(
                    "Submission {} synced, {} contact {} {}",
                    submission_id,
                    self.crm.provider(),
                    upserted.contact_id,
                    action
                );
                Ok(SyncResult {
                    success: true,
                    message: Some(format!("Contact {} in {}", action, self.crm.provider())),
                    error: None,
                    submission_id: submission_id.to_string(),
                    contact_email: Some(submission.email),
                })
            }
            Err(e) => {
                let message = e.to_string();
                let attempts = self.store.record_failure(submission_id, &message)?;
                self.store.insert_sync_error(
                    SUBMISSIONS_TABLE,
                    submission_id,
                    &message,
                    &e.details(),
                    attempts,
                )?;
                log::warn!(
                    "Submission {} failed to sync (attempt {}): {}",
                    submission_id,
                    attempts,
                    message
                );
                Ok(SyncResult {
                    contact_email: Some(submission.email),
                    ..SyncResult::failed(submission_id, message)
                })
            }
        }
    }

    /// Search by the mapped email first so repeated syncs update the same vendor contact.
    async fn upsert(&self, properties: &ContactProperties) -> Result<Upserted> {
        let email = properties.get("email").map(String::as_str).unwrap_or_default();
        match self.crm.find_contact_by_email(email).await? {
            Some(existing) => {
                let contact_id = self.crm.update_contact(&existing, properties).await?;
                Ok(Upserted {
                    contact_id,
                    created: false,
                })
            }
            None => {
                let contact_id = self.crm.create_contact(properties).await?;
                Ok(Upserted {
                    contact_id,
                    created: true,
                })
            }
        }
    }
}
