use super::{Actor, ConnectionTest, SyncService, TestStatus};
use crate::error::{Error, Result};

pub const PERMISSION_CHECK: &str = "Permission Check";
pub const CONNECTION_TEST: &str = "Connection Test";
pub const CREDENTIAL_CHECK: &str = "Credential Configured";
pub const FORMAT_CHECK: &str = "Credential Format";
pub const ACCESS_CHECK: &str = "Contacts API Access";
pub const ACCOUNT_CHECK: &str = "Account Details";

impl SyncService {
    /// Runs the fixed preflight checklist. Never fails: unexpected faults collapse into a single
    /// failing entry.
    pub async fn validate_connection(&self, actor: &Actor) -> Vec<ConnectionTest> {
        if !self.authorize(actor, "validate_connection") {
            return vec![ConnectionTest::fail(
                PERMISSION_CHECK,
                "Admin access required for HubSpot operations",
            )];
        }
        self.run_checks().await
    }

    pub async fn is_configured(&self, actor: &Actor) -> bool {
        self.validate_connection(actor)
            .await
            .iter()
            .any(|t| t.test_name == CREDENTIAL_CHECK && t.status == TestStatus::Pass)
    }

    pub(crate) async fn run_checks(&self) -> Vec<ConnectionTest> {
        match self.checklist().await {
            Ok(tests) => tests,
            Err(e) => {
                log::error!("Connection validation failed: {}", e);
                vec![ConnectionTest::fail(CONNECTION_TEST, e.to_string())]
            }
        }
    }

    async fn checklist(&self) -> Result<Vec<ConnectionTest>> {
        let provider = self.crm.provider();
        let mut tests = Vec::with_capacity(4);

        let configured = self.crm.credential().is_some();
        if !configured {
            tests.push(ConnectionTest::fail(
                CREDENTIAL_CHECK,
                format!("No {provider} credential configured"),
            ));
            tests.push(ConnectionTest::fail(FORMAT_CHECK, "Skipped: no credential"));
            tests.push(ConnectionTest::fail(ACCESS_CHECK, "Skipped: no credential"));
            tests.push(ConnectionTest::info(ACCOUNT_CHECK, "Skipped: no credential"));
            return Ok(tests);
        }

        tests.push(ConnectionTest::pass(
            CREDENTIAL_CHECK,
            format!("{provider} credential is configured"),
        ));
        tests.push(if self.crm.credential_is_well_formed() {
            ConnectionTest::pass(FORMAT_CHECK, "Credential matches the expected token format")
        } else {
            ConnectionTest::fail(
                FORMAT_CHECK,
                format!("Credential does not look like a {provider} private app token"),
            )
        });

        let reachable = match self.crm.probe().await {
            Ok(()) => {
                tests.push(ConnectionTest::pass(
                    ACCESS_CHECK,
                    format!("{provider} contacts API responded"),
                ));
                true
            }
            Err(e @ (Error::Vendor { .. } | Error::MalformedResponse(_))) => {
                tests.push(ConnectionTest::fail(ACCESS_CHECK, e.to_string()));
                false
            }
            Err(e) => return Err(e),
        };

        if !reachable {
            tests.push(ConnectionTest::info(
                ACCOUNT_CHECK,
                "Skipped: contacts API not reachable",
            ));
            return Ok(tests);
        }

        match self.crm.account_summary().await {
            Ok(account) => tests.push(ConnectionTest::info(
                ACCOUNT_CHECK,
                format!(
                    "Portal {}, account type {}",
                    account.portal_id.as_deref().unwrap_or("unknown"),
                    account.account_type.as_deref().unwrap_or("unknown"),
                ),
            )),
            // Advisory only: a failure here never blocks a batch.
            Err(e) => {
                log::warn!("Account details unavailable: {}", e);
                tests.push(ConnectionTest::info(ACCOUNT_CHECK, format!("Unavailable: {e}")))
            }
        }

        Ok(tests)
    }

    /// First failing check that would make every sync in a batch fail. The token format check
    /// is advisory and does not block batches.
    pub(crate) async fn preflight(&self) -> Option<ConnectionTest> {
        self.run_checks()
            .await
            .into_iter()
            .find(|t| t.status == TestStatus::Fail && t.test_name != FORMAT_CHECK)
    }
}
