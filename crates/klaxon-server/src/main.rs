mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use klaxon_adapters::SqliteDb;
use klaxon_app::{EnginePorts, EscalationEngine, EscalationWorker};

use crate::config::Config;

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    let db = SqliteDb::new(&config.database_url)
        .await
        .with_context(|| format!("failed to open database at {}", config.database_url))?;

    let engine = EscalationEngine::new(
        EnginePorts {
            alerts: db.clone(),
            policies: db.clone(),
            schedules: db.clone(),
            teams: db.clone(),
            preferences: db.clone(),
            organizations: db.clone(),
            dispatcher: db.clone(),
            log: db.clone(),
            events: db,
        },
        config.engine(),
    );

    let mut worker = EscalationWorker::new(Arc::new(engine), config.worker());
    worker.start();
    info!(
        max_concurrent_alerts = config.max_concurrent_alerts,
        snooze_resume = ?config.snooze_resume,
        "klaxon running"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    worker.stop().await;

    Ok(())
}
