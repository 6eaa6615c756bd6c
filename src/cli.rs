use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{default_data_dir, AppConfig};
use crate::integrations::hubspot::HubSpotClient;
use crate::store::{Storage, Submission};
use crate::sync::SyncService;

#[derive(Debug, Parser)]
#[command(name = "lead-sync", version, about = "Sync lead submissions to HubSpot")]
pub struct Cli {
    /// Directory holding config.json
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Caller id, checked against `admin_ids` in the config
    #[arg(long, global = true, env = "LEAD_SYNC_ACTOR", default_value = "cli")]
    pub actor: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the connection checklist
    Validate,
    /// Sync one submission
    Sync { submission_id: String },
    /// Sync a batch of unsynced submissions
    Bulk {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Retry failed submissions under the attempt ceiling
    Retry {
        #[arg(long)]
        max_retries: Option<u32>,
    },
    /// Show sync statistics
    Stats,
    /// List unresolved sync errors
    Errors {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Mark a sync error resolved
    Resolve {
        error_id: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Count submissions not yet synced
    Unsynced,
    /// Delete resolved sync errors older than the retention window
    PurgeErrors {
        #[arg(long)]
        days: Option<u32>,
    },
    /// Load submissions from a JSON array file
    Import { file: PathBuf },
}

fn print<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let config_dir = cli.config.unwrap_or_else(default_data_dir);
    let config = AppConfig::load(&config_dir);
    let actor = config.actor(&cli.actor);

    let store = Arc::new(
        Storage::new(&config.database_path)
            .with_context(|| format!("opening {}", config.database_path.display()))?,
    );
    let crm = Arc::new(HubSpotClient::from_config(&config)?);
    let service = SyncService::new(store.clone(), crm, config.sync_settings());

    match cli.command {
        Command::Validate => print(&service.validate_connection(&actor).await),
        Command::Sync { submission_id } => {
            print(&service.sync_submission(&actor, &submission_id).await)
        }
        Command::Bulk { limit } => {
            let limit = limit.unwrap_or(config.default_bulk_limit);
            print(&service.bulk_sync(&actor, limit).await?)
        }
        Command::Retry { max_retries } => {
            let max_retries = max_retries.unwrap_or(config.default_max_retries);
            print(&service.retry_failed_syncs(&actor, max_retries).await?)
        }
        Command::Stats => print(&service.get_sync_stats()?),
        Command::Errors { limit } => {
            let limit = limit.unwrap_or(config.default_error_list_limit);
            print(&service.get_sync_errors(limit)?)
        }
        Command::Resolve { error_id, notes } => print(&serde_json::json!({
            "resolved": service.resolve_error(&actor, &error_id, notes.as_deref()),
        })),
        Command::Unsynced => print(&serde_json::json!({
            "unsynced": service.get_unsynced_count()?,
        })),
        Command::PurgeErrors { days } => {
            let days = days.unwrap_or(config.error_retention_days);
            print(&serde_json::json!({
                "purged": service.purge_resolved_errors(&actor, days)?,
            }))
        }
        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let submissions: Vec<Submission> = serde_json::from_str(&content)
                .with_context(|| format!("parsing {}", file.display()))?;
            let ids = submissions
                .iter()
                .map(|s| store.insert_submission(s).map(|stored| stored.id))
                .collect::<crate::error::Result<Vec<_>>>()?;
            log::info!("Imported {} submission(s)", ids.len());
            print(&serde_json::json!({ "imported": ids }))
        }
    }
}
