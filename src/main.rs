use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use repositories::{
    referrals::ReferralLedger,
    storage::{FileStore, KeyValueStore, MemoryStore},
};
use settings::{Settings, StorageBackend};

mod models;
mod repositories;
mod services;
mod settings;
mod tokens;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "referrals.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(&args.config)?;

    init_logging(&args.log4rs)?;
    log::info!("Starting referral ledger.");

    let store = open_store(&settings)?;
    let ledger =
        ReferralLedger::open(store, settings.storage.key.clone(), settings.tokens.max_attempts)
            .await?;

    services::start_services(ledger, settings).await
}

fn open_store(settings: &Settings) -> Result<Arc<dyn KeyValueStore>> {
    match settings.storage.backend {
        StorageBackend::File => {
            let data_dir = settings
                .storage
                .resolved_data_dir()
                .ok_or_else(|| anyhow::anyhow!("No data directory configured or found."))?;
            let store = FileStore::new(data_dir);

            log::info!("Storing referrals under {}", store.dir().display());
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; referrals will not survive a restart.");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
