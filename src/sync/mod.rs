//! Submission synchronization engine.
//!
//! Pushes locally stored submissions to the CRM one at a time, keeps per-record sync state on
//! the submission row and records every failed attempt in the error ledger.

pub mod executor;
pub mod ledger;
pub mod orchestrator;
pub mod stats;
pub mod validator;

#[cfg(test)]
pub(crate) mod testing;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::integrations::CrmClient;
use crate::store::Storage;

pub const ADMIN_REQUIRED: &str = "Admin access required";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(id: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id: id.into(),
            is_admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    /// Pause between consecutive records of a batch. Batches never run records concurrently.
    pub inter_call_delay: Duration,
    pub retry_batch_size: u32,
    /// How long a record stays claimed by one run before another run may take it over.
    pub lease: chrono::Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            inter_call_delay: Duration::from_millis(500),
            retry_batch_size: 10,
            lease: chrono::Duration::seconds(120),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submission_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
}

impl SyncResult {
    pub fn failed(submission_id: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
            submission_id: submission_id.to_string(),
            contact_email: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BulkSyncResult {
    pub total_processed: usize,
    pub successful_syncs: usize,
    pub errors: usize,
    pub details: Vec<SyncResult>,
}

impl BulkSyncResult {
    /// A batch that never started. Counts as one error so callers surface it.
    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            total_processed: 0,
            successful_syncs: 0,
            errors: 1,
            details: vec![SyncResult::failed("bulk", error)],
        }
    }

    fn record(&mut self, result: SyncResult) {
        self.total_processed += 1;
        if result.success {
            self.successful_syncs += 1;
        } else {
            self.errors += 1;
        }
        self.details.push(result);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionTest {
    pub test_name: String,
    pub status: TestStatus,
    pub details: String,
}

impl ConnectionTest {
    fn new(test_name: &str, status: TestStatus, details: impl Into<String>) -> Self {
        Self {
            test_name: test_name.to_string(),
            status,
            details: details.into(),
        }
    }

    pub fn pass(test_name: &str, details: impl Into<String>) -> Self {
        Self::new(test_name, TestStatus::Pass, details)
    }

    pub fn fail(test_name: &str, details: impl Into<String>) -> Self {
        Self::new(test_name, TestStatus::Fail, details)
    }

    pub fn info(test_name: &str, details: impl Into<String>) -> Self {
        Self::new(test_name, TestStatus::Info, details)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncStats {
    pub total_submissions: u64,
    pub synced_count: u64,
    pub pending_count: u64,
    pub error_count: u64,
    pub sync_rate: f64,
}

/// Entry point for every inbound operation. Holds the store and vendor client it was built
/// with; nothing is shared through globals.
pub struct SyncService {
    store: Arc<Storage>,
    crm: Arc<dyn CrmClient>,
    settings: SyncSettings,
}

impl SyncService {
    pub fn new(store: Arc<Storage>, crm: Arc<dyn CrmClient>, settings: SyncSettings) -> Self {
        Self {
            store,
            crm,
            settings,
        }
    }

    fn authorize(&self, actor: &Actor, operation: &str) -> bool {
        if !actor.is_admin {
            log::warn!("Rejected {} for non-admin actor {}", operation, actor.id);
        }
        actor.is_admin
    }
}
