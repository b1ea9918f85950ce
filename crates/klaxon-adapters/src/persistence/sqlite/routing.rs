use async_trait::async_trait;

use klaxon_core::ids::OrganizationId;
use klaxon_core::routing::AlertRoutingRule;
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::RoutingRuleRepository;

use super::{from_json, to_json, SqliteDb};

#[async_trait]
impl RoutingRuleRepository for SqliteDb {
    async fn save(&self, rule: &AlertRoutingRule) -> Result<(), PortError> {
        let data = to_json(rule)?;

        sqlx::query(
            "INSERT INTO routing_rules (id, organization_id, priority, data) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                priority = excluded.priority,
                data = excluded.data",
        )
        .bind(rule.id().to_string())
        .bind(rule.organization_id().to_string())
        .bind(rule.priority())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AlertRoutingRule>, PortError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT data FROM routing_rules WHERE organization_id = ? ORDER BY priority ASC",
        )
        .bind(organization_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        rows.iter().map(|(data,)| from_json(data)).collect()
    }
}
