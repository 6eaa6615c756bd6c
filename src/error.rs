use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("HubSpot request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HubSpot error ({status}): {body}")]
    Vendor { status: u16, body: String },

    #[error("Parse error: {0}")]
    MalformedResponse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Structured payload written to the error ledger alongside the message.
    pub fn details(&self) -> serde_json::Value {
        match self {
            Error::Vendor { status, body } => {
                let body = serde_json::from_str::<serde_json::Value>(body)
                    .unwrap_or_else(|_| serde_json::Value::String(body.clone()));
                json!({ "kind": "vendor", "status": status, "body": body })
            }
            Error::Http(e) => json!({
                "kind": if e.is_timeout() { "timeout" } else { "transport" },
                "status": e.status().map(|s| s.as_u16()),
            }),
            Error::MalformedResponse(_) => json!({ "kind": "malformed_response" }),
            Error::Store(_) => json!({ "kind": "store" }),
            Error::Json(_) => json!({ "kind": "json" }),
            Error::Io(_) => json!({ "kind": "io" }),
            Error::Config(_) => json!({ "kind": "config" }),
        }
    }
}
