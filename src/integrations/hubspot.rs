use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use super::{mapping, AccountSummary, ContactProperties, CrmClient};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::store::Submission;

const CONTACTS_PATH: &str = "/crm/v3/objects/contacts";
const ACCOUNT_PATH: &str = "/account-info/v3/details";

static EXISTING_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Existing ID: ?(\d+)").expect("valid existing id regex"));

#[derive(Debug, Deserialize)]
struct HubSpotObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct HubSpotSearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    results: Vec<HubSpotObject>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HubSpotAccountResponse {
    portal_id: Option<serde_json::Value>,
    account_type: Option<String>,
}

pub struct HubSpotClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HubSpotClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.hubspot_base_url,
            &config.hubspot_api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::debug!("HubSpot responded {}: {}", status, body);
            return Err(Error::Vendor {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| Error::MalformedResponse(e.to_string()))
    }
}

/// HubSpot rejects duplicate creates with a 409 naming the contact that already owns the email.
fn existing_contact_id(body: &str) -> Option<String> {
    EXISTING_ID
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[async_trait]
impl CrmClient for HubSpotClient {
    fn provider(&self) -> &'static str {
        "HubSpot"
    }

    fn credential(&self) -> Option<&str> {
        Some(self.api_key.as_str()).filter(|k| !k.is_empty())
    }

    fn credential_is_well_formed(&self) -> bool {
        mapping::is_hubspot_token(&self.api_key)
    }

    fn map_submission(&self, submission: &Submission) -> ContactProperties {
        mapping::hubspot_properties(submission)
    }

    async fn probe(&self) -> Result<()> {
        let url = format!("{}?limit=1", self.url(CONTACTS_PATH));
        let _: serde_json::Value = self.send(self.http.get(&url)).await?;
        Ok(())
    }

    async fn account_summary(&self) -> Result<AccountSummary> {
        let account: HubSpotAccountResponse =
            self.send(self.http.get(self.url(ACCOUNT_PATH))).await?;

        let portal_id = account.portal_id.map(|v| match v {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        Ok(AccountSummary {
            portal_id,
            account_type: account.account_type,
        })
    }

    async fn find_contact_by_email(&self, email: &str) -> Result<Option<String>> {
        let body = serde_json::json!({
            "filterGroups": [{
                "filters": [{
                    "propertyName": "email",
                    "operator": "EQ",
                    "value": email,
                }]
            }],
            "limit": 1,
        });

        let url = format!("{}/search", self.url(CONTACTS_PATH));
        let result: HubSpotSearchResponse = self.send(self.http.post(&url).json(&body)).await?;

        if result.total == 0 {
            return Ok(None);
        }
        Ok(result.results.into_iter().next().map(|c| c.id))
    }

    async fn create_contact(&self, properties: &ContactProperties) -> Result<String> {
        let body = serde_json::json!({ "properties": properties });

        let created: Result<HubSpotObject> = self
            .send(self.http.post(self.url(CONTACTS_PATH)).json(&body))
            .await;

        match created {
            Ok(contact) => Ok(contact.id),
            Err(Error::Vendor { status: 409, body }) => match existing_contact_id(&body) {
                Some(id) => {
                    log::info!("HubSpot contact {} already exists, updating instead", id);
                    self.update_contact(&id, properties).await
                }
                None => Err(Error::Vendor { status: 409, body }),
            },
            Err(e) => Err(e),
        }
    }

    async fn update_contact(
        &self,
        contact_id: &str,
        properties: &ContactProperties,
    ) -> Result<String> {
        let body = serde_json::json!({ "properties": properties });
        let url = format!("{}/{}", self.url(CONTACTS_PATH), contact_id);

        let updated: HubSpotObject = self.send(self.http.patch(&url).json(&body)).await?;
        Ok(updated.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    const TOKEN: &str = "pat-na1-0a1b2c3d-4e5f-6a7b-8c9d-0e1f2a3b4c5d";

    async fn canned_server(
        responses: Vec<(u16, &'static str)>,
    ) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                log.lock()
                    .await
                    .push(request.lines().next().unwrap_or_default().to_string());

                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.ok();
            }
        });

        (format!("http://{}", addr), seen)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(head_end) = text.find("\r\n\r\n") {
                let length = text[..head_end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                    })
                    .unwrap_or(0);
                if buf.len() >= head_end + 4 + length {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_string()
    }

    fn client(base_url: &str) -> HubSpotClient {
        HubSpotClient::new(base_url, TOKEN, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_existing_contact_id() {
        assert_eq!(
            existing_contact_id(r#"{"message":"Contact already exists. Existing ID: 5151"}"#),
            Some("5151".to_string())
        );
        assert_eq!(existing_contact_id("conflict"), None);
    }

    #[test]
    fn reports_credential_state() {
        let c = client("http://localhost");
        assert_eq!(c.credential(), Some(TOKEN));
        assert!(c.credential_is_well_formed());

        let empty = HubSpotClient::new("http://localhost/", "  ", Duration::from_secs(1)).unwrap();
        assert!(empty.credential().is_none());
        assert!(!empty.credential_is_well_formed());
        assert_eq!(empty.url("/x"), "http://localhost/x");
    }

    #[tokio::test]
    async fn search_returns_first_match() {
        let (url, seen) =
            canned_server(vec![(200, r#"{"total":1,"results":[{"id":"901"}]}"#)]).await;

        let found = client(&url).find_contact_by_email("a@example.com").await.unwrap();
        assert_eq!(found.as_deref(), Some("901"));
        assert_eq!(
            seen.lock().await[0],
            "POST /crm/v3/objects/contacts/search HTTP/1.1"
        );
    }

    #[tokio::test]
    async fn search_with_no_results_is_none() {
        let (url, _) = canned_server(vec![(200, r#"{"total":0,"results":[]}"#)]).await;
        assert_eq!(client(&url).find_contact_by_email("a@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn server_error_maps_to_vendor_error() {
        let (url, _) = canned_server(vec![(500, r#"{"message":"internal error"}"#)]).await;

        let err = client(&url)
            .create_contact(&ContactProperties::new())
            .await
            .unwrap_err();
        match err {
            Error::Vendor { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("internal error"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn conflicting_create_updates_existing_contact() {
        let (url, seen) = canned_server(vec![
            (409, r#"{"message":"Contact already exists. Existing ID: 77"}"#),
            (200, r#"{"id":"77"}"#),
        ])
        .await;

        let id = client(&url).create_contact(&ContactProperties::new()).await.unwrap();
        assert_eq!(id, "77");
        assert_eq!(seen.lock().await[1], "PATCH /crm/v3/objects/contacts/77 HTTP/1.1");
    }

    #[tokio::test]
    async fn malformed_body_is_reported() {
        let (url, _) = canned_server(vec![(200, "not json")]).await;
        let err = client(&url).update_contact("1", &ContactProperties::new()).await.unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn account_summary_reads_numeric_portal_id() {
        let (url, _) =
            canned_server(vec![(200, r#"{"portalId":123456,"accountType":"STANDARD"}"#)]).await;
        let summary = client(&url).account_summary().await.unwrap();
        assert_eq!(summary.portal_id.as_deref(), Some("123456"));
        assert_eq!(summary.account_type.as_deref(), Some("STANDARD"));
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{}", addr)).probe().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert_eq!(err.details()["kind"], "transport");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });

        let base_url = format!("http://{}", addr);
        let slow = HubSpotClient::new(&base_url, TOKEN, Duration::from_millis(200)).unwrap();
        let err = slow.find_contact_by_email("a@example.com").await.unwrap_err();
        match &err {
            Error::Http(e) => assert!(e.is_timeout(), "{e:?}"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.details()["kind"], "timeout");
    }
}
