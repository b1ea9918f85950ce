use std::time::Duration;

use clap::Parser;

use klaxon_app::{EngineConfig, WorkerConfig};
use klaxon_core::escalation::SnoozeResume;

/// Alert escalation engine.
#[derive(Parser, Debug)]
#[command(name = "klaxon", version, about, long_about = None)]
pub struct Config {
    /// SQLite connection string.
    #[arg(long, env = "KLAXON_DATABASE_URL", default_value = "sqlite://klaxon.db?mode=rwc")]
    pub database_url: String,

    /// Seconds between escalation ticks.
    #[arg(long, env = "KLAXON_TICK_INTERVAL_SECS", default_value_t = 30)]
    pub tick_interval_secs: u64,

    /// Seconds the worker waits for a running tick on shutdown.
    #[arg(long, env = "KLAXON_SHUTDOWN_GRACE_SECS", default_value_t = 15)]
    pub shutdown_grace_secs: u64,

    /// Upper bound on processing one alert within a tick.
    #[arg(long, env = "KLAXON_ALERT_TIMEOUT_SECS", default_value_t = 10)]
    pub alert_timeout_secs: u64,

    #[arg(long, env = "KLAXON_MAX_CONCURRENT_ALERTS", default_value_t = 16)]
    pub max_concurrent_alerts: usize,

    /// How a snooze affects the next due time: `keep` or `shift`.
    #[arg(long, env = "KLAXON_SNOOZE_RESUME", default_value = "keep")]
    pub snooze_resume: SnoozeResume,

    /// Emit logs as JSON lines.
    #[arg(long, env = "KLAXON_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            per_alert_timeout: Duration::from_secs(self.alert_timeout_secs),
            max_concurrent_alerts: self.max_concurrent_alerts,
            snooze_resume: self.snooze_resume,
        }
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            tick_interval: Duration::from_secs(self.tick_interval_secs),
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
        }
    }
}
