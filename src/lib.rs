pub mod cli;
pub mod config;
pub mod error;
pub mod integrations;
pub mod store;
pub mod sync;

use clap::Parser;

pub use error::{Error, Result};
pub use sync::{
    Actor, BulkSyncResult, ConnectionTest, SyncResult, SyncService, SyncSettings, SyncStats,
    TestStatus,
};

pub fn run() -> anyhow::Result<()> {
    env_logger::init();

    let cli = cli::Cli::parse();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(cli::execute(cli))
}
