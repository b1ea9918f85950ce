use async_trait::async_trait;

use klaxon_core::events::DomainEvent;
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::EventPublisher;

use super::{timestamp, to_json, SqliteDb};

#[async_trait]
impl EventPublisher for SqliteDb {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError> {
        for event in &events {
            let data = to_json(event)?;

            sqlx::query("INSERT INTO events (event_type, data, occurred_at) VALUES (?, ?, ?)")
                .bind(event.event_type())
                .bind(&data)
                .bind(timestamp(event.occurred_at()))
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Persistence(e.to_string()))?;
        }
        Ok(())
    }
}
