use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::{Actor, SyncSettings};

pub const DEFAULT_HUBSPOT_URL: &str = "https://api.hubapi.com";
pub const MAX_LEASE_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub hubspot_api_key: String,
    pub hubspot_base_url: String,
    pub database_path: PathBuf,
    pub request_timeout_secs: u64,
    pub inter_call_delay_ms: u64,
    pub retry_batch_size: u32,
    pub default_bulk_limit: u32,
    pub default_max_retries: u32,
    pub default_error_list_limit: u32,
    pub sync_lease_secs: u64,
    pub error_retention_days: u32,
    pub admin_ids: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hubspot_api_key: String::new(),
            hubspot_base_url: DEFAULT_HUBSPOT_URL.to_string(),
            database_path: default_data_dir().join("lead-sync.db"),
            request_timeout_secs: 10,
            inter_call_delay_ms: 500,
            retry_batch_size: 10,
            default_bulk_limit: 10,
            default_max_retries: 3,
            default_error_list_limit: 50,
            sync_lease_secs: 120,
            error_retention_days: 90,
            admin_ids: Vec::new(),
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lead-sync")
}

impl AppConfig {
    /// Reads `config.json` from `dir`, writing defaults when it does not exist yet.
    /// Environment variables take precedence over the file.
    pub fn load(dir: &Path) -> Self {
        let config_path = dir.join("config.json");
        let mut config = if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                    log::warn!("Ignoring malformed {}: {}", config_path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Could not read {}: {}", config_path.display(), e);
                    Self::default()
                }
            }
        } else {
            let c = Self::default();
            c.save(dir);
            c
        };

        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let set = |name: &str| var(name).filter(|v| !v.is_empty());

        if let Some(key) = set("HUBSPOT_API_KEY") {
            self.hubspot_api_key = key;
        }
        if let Some(url) = set("HUBSPOT_BASE_URL") {
            self.hubspot_base_url = url;
        }
        if let Some(path) = set("LEAD_SYNC_DB") {
            self.database_path = PathBuf::from(path);
        }
    }

    pub fn save(&self, dir: &Path) {
        let config_path = dir.join("config.json");
        let written = std::fs::create_dir_all(dir).and_then(|_| {
            let content = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, content)
        });
        if let Err(e) = written {
            log::warn!("Could not write {}: {}", config_path.display(), e);
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            inter_call_delay: Duration::from_millis(self.inter_call_delay_ms),
            retry_batch_size: self.retry_batch_size,
            lease: chrono::Duration::seconds(
                i64::try_from(self.sync_lease_secs)
                    .unwrap_or(i64::MAX)
                    .min(MAX_LEASE_SECS),
            ),
        }
    }

    /// Resolves a caller id into an actor; admin capability comes from `admin_ids`.
    pub fn actor(&self, id: &str) -> Actor {
        let is_admin = self.admin_ids.iter().any(|a| a == id);
        Actor::new(id, is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path());

        assert!(dir.path().join("config.json").exists());
        assert_eq!(config.inter_call_delay_ms, 500);
        assert_eq!(config.retry_batch_size, 10);
    }

    #[test]
    fn reads_partial_file_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"admin_ids":["ops"],"inter_call_delay_ms":0}"#,
        )
        .unwrap();

        let config = AppConfig::load(dir.path());
        assert_eq!(config.admin_ids, vec!["ops".to_string()]);
        assert_eq!(config.inter_call_delay_ms, 0);
        assert_eq!(config.default_max_retries, 3);
        assert!(config.actor("ops").is_admin);
        assert!(!config.actor("guest").is_admin);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{not json").unwrap();

        let config = AppConfig::load(dir.path());
        assert_eq!(config.default_bulk_limit, 10);
    }

    #[test]
    fn environment_overrides_file() {
        let mut config = AppConfig::default();
        config.apply_env(|name| match name {
            "HUBSPOT_API_KEY" => Some("pat-na1-x".to_string()),
            "LEAD_SYNC_DB" => Some("/tmp/leads.db".to_string()),
            "HUBSPOT_BASE_URL" => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.hubspot_api_key, "pat-na1-x");
        assert_eq!(config.database_path, PathBuf::from("/tmp/leads.db"));
        assert_eq!(config.hubspot_base_url, DEFAULT_HUBSPOT_URL);
    }

    #[test]
    fn projects_sync_settings() {
        let config = AppConfig {
            inter_call_delay_ms: 250,
            sync_lease_secs: 30,
            ..AppConfig::default()
        };
        let settings = config.sync_settings();
        assert_eq!(settings.inter_call_delay, Duration::from_millis(250));
        assert_eq!(settings.lease, chrono::Duration::seconds(30));

        let huge = AppConfig {
            sync_lease_secs: u64::MAX,
            ..AppConfig::default()
        };
        assert_eq!(huge.sync_settings().lease, chrono::Duration::seconds(MAX_LEASE_SECS));
    }
}
