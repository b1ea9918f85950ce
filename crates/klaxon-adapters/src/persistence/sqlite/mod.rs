mod alert;
mod escalation;
mod event;
mod notification;
mod organization;
mod routing;
mod schedule;
mod user;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use klaxon_ports::error::PortError;

#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    pub async fn new(url: &str) -> Result<Self, PortError> {
        // Every connection to an in-memory database gets its own database.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| PortError::Connection(e.to_string()))?;

        let db = Self { pool };
        db.init_schema().await?;
        debug!(url, "sqlite schema ready");
        Ok(db)
    }

    async fn init_schema(&self) -> Result<(), PortError> {
        const SCHEMA: &[&str] = &[
            "CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                status TEXT NOT NULL,
                priority TEXT NOT NULL,
                escalation_policy_id TEXT,
                escalation_level INTEGER NOT NULL,
                escalation_cycle INTEGER NOT NULL,
                escalation_exhausted INTEGER NOT NULL,
                snoozed_until TEXT,
                suppressed INTEGER NOT NULL,
                revision INTEGER NOT NULL DEFAULT 0,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_alerts_escalation
             ON alerts(status, escalation_exhausted, created_at)",
            "CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS escalation_policies (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS routing_rules (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                priority INTEGER NOT NULL,
                data TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_routing_rules_org
             ON routing_rules(organization_id, priority)",
            "CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                data TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS user_preferences (
                user_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS organization_settings (
                organization_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                alert_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                channel TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_notifications_pending
             ON notifications(status, created_at)",
            "CREATE TABLE IF NOT EXISTS notification_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                channel TEXT,
                escalation_level INTEGER NOT NULL,
                rule_position INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                reason TEXT,
                external_id TEXT,
                recorded_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_notification_log_alert
             ON notification_log(alert_id, recorded_at)",
            "CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                event_type TEXT NOT NULL,
                data TEXT NOT NULL,
                occurred_at TEXT NOT NULL
            )",
        ];

        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Persistence(e.to_string()))?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Fixed-width UTC timestamps so stored values compare correctly as text.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, PortError> {
    serde_json::to_string(value).map_err(|e| PortError::Persistence(e.to_string()))
}

fn from_json<T: DeserializeOwned>(data: &str) -> Result<T, PortError> {
    serde_json::from_str(data).map_err(|e| PortError::Persistence(e.to_string()))
}

#[cfg(test)]
fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .unwrap()
        .with_timezone(&Utc)
}

#[cfg(test)]
async fn memory_db() -> SqliteDb {
    SqliteDb::new("sqlite::memory:").await.unwrap()
}
