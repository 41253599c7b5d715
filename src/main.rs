#![allow(dead_code)]

mod action;
mod aggregate;
mod app;
mod config;
mod database;
mod diff;
mod error;
mod export;
mod fallback;
mod forms;
mod ledger;
mod logging;
mod models;
mod remote;
mod scheduler;
mod state;
mod storage;
mod tui;

use clap::Parser;

use app::App;
use config::Config;
use database::DB;
use fallback::LocalStore;
use storage::Storage;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let config = Config::parse();
    config.validate()?;
    logging::setup_logging(&config.log_file)?;

    let local = LocalStore::new(&config.data_dir)?;
    let remote = match &config.database_url {
        Some(url) => match DB::connect(url, &config.auth_token).await {
            Ok(db) => Some(db),
            Err(e) => {
                tracing::error!(error = %e, "Remote database unavailable, running on local data");
                None
            }
        },
        None => {
            tracing::info!("No database URL configured, running on local data");
            None
        }
    };

    let storage = Storage::new(remote, local, config.remote_timeout());
    let mut app = App::new(storage, &config).await;
    app.run().await?;
    Ok(())
}
