pub mod storage;

pub use storage::Storage;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Table name recorded on ledger rows produced by submission syncs.
pub const SUBMISSIONS_TABLE: &str = "submissions";

/// A lead captured by the intake form. Only the sync-state fields are written by this crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub created_at: String,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub property_address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub urgency_level: Option<String>,
    #[serde(default)]
    pub missed_payments: Option<i64>,
    #[serde(default)]
    pub received_nod: Option<bool>,
    #[serde(default)]
    pub property_value: Option<f64>,
    #[serde(default)]
    pub mortgage_balance: Option<f64>,
    #[serde(default)]
    pub challenges: Option<String>,
    #[serde(default)]
    pub difficulties: Option<String>,
    #[serde(default)]
    pub family_impact: Option<String>,
    #[serde(default)]
    pub financial_impact: Option<String>,
    #[serde(default)]
    pub preferred_solution: Option<String>,
    #[serde(default)]
    pub openness_to_options: Option<String>,

    #[serde(default)]
    pub synced_to_hubspot: bool,
    #[serde(default)]
    pub last_sync_error: Option<String>,
    #[serde(default)]
    pub sync_attempts: u32,
    #[serde(default)]
    pub hubspot_contact_id: Option<String>,
    #[serde(default)]
    pub synced_at: Option<String>,
}

impl Submission {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A row in the error ledger. Resolution only ever moves `resolved` from false to true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncError {
    pub id: String,
    pub table_name: String,
    pub record_id: String,
    pub error_message: String,
    pub error_details: serde_json::Value,
    pub created_at: String,
    pub resolved: bool,
    pub resolved_at: Option<String>,
    pub resolved_by: Option<String>,
    pub retry_count: u32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncCounts {
    pub total: u64,
    pub synced: u64,
    pub with_error: u64,
}

pub(crate) fn timestamp(at: chrono::DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    timestamp(Utc::now())
}
