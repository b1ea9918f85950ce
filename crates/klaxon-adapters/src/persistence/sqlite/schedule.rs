use async_trait::async_trait;

use klaxon_core::ids::ScheduleId;
use klaxon_core::schedule::Schedule;
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::ScheduleRepository;

use super::{from_json, to_json, SqliteDb};

#[async_trait]
impl ScheduleRepository for SqliteDb {
    async fn save(&self, schedule: &Schedule) -> Result<(), PortError> {
        let data = to_json(schedule)?;

        sqlx::query(
            "INSERT INTO schedules (id, organization_id, data) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        )
        .bind(schedule.id().to_string())
        .bind(schedule.organization_id().to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &ScheduleId) -> Result<Option<Schedule>, PortError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM schedules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|(data,)| from_json(&data)).transpose()
    }
}
