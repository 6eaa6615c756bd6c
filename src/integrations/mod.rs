pub mod hubspot;
pub mod mapping;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::store::Submission;

/// Vendor contact properties, keyed by the vendor's internal property names.
pub type ContactProperties = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccountSummary {
    pub portal_id: Option<String>,
    pub account_type: Option<String>,
}

/// Outbound surface of the sync engine. Everything vendor-specific lives behind this trait,
/// including how a submission is mapped onto the vendor's contact schema.
#[async_trait]
pub trait CrmClient: Send + Sync {
    fn provider(&self) -> &'static str;

    /// Configured credential, if any. Never sent anywhere by callers.
    fn credential(&self) -> Option<&str>;

    /// Whether the configured credential has the vendor's expected shape.
    fn credential_is_well_formed(&self) -> bool;

    fn map_submission(&self, submission: &Submission) -> ContactProperties;

    /// Cheapest authenticated read the vendor offers.
    async fn probe(&self) -> Result<()>;

    async fn account_summary(&self) -> Result<AccountSummary>;

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>>;

    async fn create_contact(&self, properties: &ContactProperties) -> Result<String>;

    async fn update_contact(&self, contact_id: &str, properties: &ContactProperties)
        -> Result<String>;
}
