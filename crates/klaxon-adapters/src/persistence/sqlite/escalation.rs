use async_trait::async_trait;

use klaxon_core::escalation::EscalationPolicy;
use klaxon_core::ids::PolicyId;
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::EscalationPolicyRepository;

use super::{from_json, to_json, SqliteDb};

#[async_trait]
impl EscalationPolicyRepository for SqliteDb {
    async fn save(&self, policy: &EscalationPolicy) -> Result<(), PortError> {
        let data = to_json(policy)?;

        sqlx::query(
            "INSERT INTO escalation_policies (id, organization_id, data) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        )
        .bind(policy.id().to_string())
        .bind(policy.organization_id().to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<EscalationPolicy>, PortError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM escalation_policies WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|(data,)| from_json(&data)).transpose()
    }
}
