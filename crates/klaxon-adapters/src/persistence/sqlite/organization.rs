use async_trait::async_trait;

use klaxon_core::ids::OrganizationId;
use klaxon_core::organization::OrganizationSettings;
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::OrganizationRepository;

use super::{from_json, to_json, SqliteDb};

#[async_trait]
impl OrganizationRepository for SqliteDb {
    async fn save_settings(&self, settings: &OrganizationSettings) -> Result<(), PortError> {
        let data = to_json(settings)?;

        sqlx::query(
            "INSERT INTO organization_settings (organization_id, data) VALUES (?, ?)
             ON CONFLICT(organization_id) DO UPDATE SET data = excluded.data",
        )
        .bind(settings.organization_id.to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn settings(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationSettings, PortError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT data FROM organization_settings WHERE organization_id = ?",
        )
        .bind(organization_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        match row {
            Some((data,)) => from_json(&data),
            None => Ok(OrganizationSettings::defaults_for(organization_id.clone())),
        }
    }
}
