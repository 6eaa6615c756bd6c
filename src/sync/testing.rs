use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::{Actor, SyncService, SyncSettings};
use crate::error::{Error, Result};
use crate::integrations::{mapping, AccountSummary, ContactProperties, CrmClient};
use crate::store::{Storage, Submission};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeMode {
    Ok,
    Vendor(u16),
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Failure {
    Vendor(u16),
    Transport,
    Malformed,
}

/// In-memory CRM that records every vendor call it receives.
pub struct FakeCrm {
    pub credential: Option<String>,
    pub well_formed: bool,
    pub probe: Mutex<ProbeMode>,
    pub account: Mutex<ProbeMode>,
    contacts: Mutex<HashMap<String, String>>,
    failing: Mutex<HashMap<String, Failure>>,
    calls: Mutex<Vec<String>>,
}

impl FakeCrm {
    pub fn new() -> Self {
        Self {
            credential: Some("pat-na1-0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d".into()),
            well_formed: true,
            probe: Mutex::new(ProbeMode::Ok),
            account: Mutex::new(ProbeMode::Ok),
            contacts: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn without_credential() -> Self {
        Self {
            credential: None,
            well_formed: false,
            ..Self::new()
        }
    }

    pub fn malformed_credential() -> Self {
        Self {
            well_formed: false,
            ..Self::new()
        }
    }

    /// Every call touching `email` fails with the given HTTP status.
    pub fn fail_for(&self, email: &str, status: u16) {
        self.fail_with(email, Failure::Vendor(status));
    }

    pub fn fail_with(&self, email: &str, failure: Failure) {
        self.failing.lock().insert(email.to_string(), failure);
    }

    pub fn recover(&self, email: &str) {
        self.failing.lock().remove(email);
    }

    pub fn set_probe(&self, mode: ProbeMode) {
        *self.probe.lock() = mode;
    }

    pub fn set_account(&self, mode: ProbeMode) {
        *self.account.lock() = mode;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn contact_count(&self) -> usize {
        self.contacts.lock().len()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check(&self, email: &str) -> Result<()> {
        let failure = self.failing.lock().get(email).copied();
        match failure {
            Some(Failure::Vendor(status)) => Err(Error::Vendor {
                status,
                body: format!(r#"{{"message":"HubSpot unavailable ({status})"}}"#),
            }),
            Some(Failure::Transport) => Err(transport_error()),
            Some(Failure::Malformed) => {
                Err(Error::MalformedResponse("expected value at line 1 column 1".into()))
            }
            None => Ok(()),
        }
    }
}

pub fn transport_error() -> Error {
    let err = reqwest::Client::new()
        .get("not a url")
        .build()
        .expect_err("invalid url must not build");
    Error::Http(err)
}

#[async_trait]
impl CrmClient for FakeCrm {
    fn provider(&self) -> &'static str {
        "HubSpot"
    }

    fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    fn credential_is_well_formed(&self) -> bool {
        self.well_formed
    }

    fn map_submission(&self, submission: &Submission) -> ContactProperties {
        mapping::hubspot_properties(submission)
    }

    async fn probe(&self) -> Result<()> {
        self.record("probe".into());
        let mode = *self.probe.lock();
        match mode {
            ProbeMode::Ok => Ok(()),
            ProbeMode::Vendor(status) => Err(Error::Vendor {
                status,
                body: "Authentication credentials not found".into(),
            }),
            ProbeMode::Transport => Err(transport_error()),
        }
    }

    async fn account_summary(&self) -> Result<AccountSummary> {
        self.record("account".into());
        let mode = *self.account.lock();
        match mode {
            ProbeMode::Ok => Ok(AccountSummary {
                portal_id: Some("4242".into()),
                account_type: Some("STANDARD".into()),
            }),
            ProbeMode::Vendor(status) => Err(Error::Vendor {
                status,
                body: "This app hasn't been granted all required scopes".into(),
            }),
            ProbeMode::Transport => Err(transport_error()),
        }
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>> {
        self.record(format!("search:{email}"));
        self.check(email)?;
        Ok(self.contacts.lock().get(email).cloned())
    }

    async fn create_contact(&self, properties: &ContactProperties) -> Result<String> {
        let email = properties.get("email").cloned().unwrap_or_default();
        self.record(format!("create:{email}"));
        self.check(&email)?;
        let mut contacts = self.contacts.lock();
        let id = format!("c{}", contacts.len() + 1);
        contacts.insert(email, id.clone());
        Ok(id)
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        properties: &ContactProperties,
    ) -> Result<String> {
        let email = properties.get("email").cloned().unwrap_or_default();
        self.record(format!("update:{contact_id}"));
        self.check(&email)?;
        Ok(contact_id.to_string())
    }
}

pub fn admin() -> Actor {
    Actor::new("admin-1", true)
}

pub fn guest() -> Actor {
    Actor::new("visitor", false)
}

pub fn settings() -> SyncSettings {
    SyncSettings {
        inter_call_delay: Duration::ZERO,
        ..SyncSettings::default()
    }
}

pub fn service(crm: Arc<FakeCrm>) -> (SyncService, Arc<Storage>) {
    let store = Arc::new(Storage::in_memory().unwrap());
    let service = SyncService::new(store.clone(), crm, settings());
    (service, store)
}

/// Inserts one submission per email, oldest first.
pub fn seed(store: &Storage, emails: &[&str]) -> Vec<String> {
    emails
        .iter()
        .enumerate()
        .map(|(i, email)| {
            let submission = Submission {
                created_at: format!("2026-01-01T00:00:{i:02}.000000Z"),
                ..Submission::new(*email, format!("Lead {i}"))
            };
            store.insert_submission(&submission).unwrap().id
        })
        .collect()
}
