use async_trait::async_trait;

use klaxon_core::ids::{TeamId, UserId};
use klaxon_core::user::{Team, UserPreferences};
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::{PreferenceRepository, TeamRepository};

use super::{from_json, to_json, SqliteDb};

#[async_trait]
impl TeamRepository for SqliteDb {
    async fn save(&self, team: &Team) -> Result<(), PortError> {
        let data = to_json(team)?;

        sqlx::query(
            "INSERT INTO teams (id, organization_id, data) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
        )
        .bind(team.id().to_string())
        .bind(team.organization_id().to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, PortError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM teams WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|(data,)| from_json(&data)).transpose()
    }
}

#[async_trait]
impl PreferenceRepository for SqliteDb {
    async fn save(&self, prefs: &UserPreferences) -> Result<(), PortError> {
        let data = to_json(prefs)?;

        sqlx::query(
            "INSERT INTO user_preferences (user_id, data) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET data = excluded.data",
        )
        .bind(prefs.user_id().to_string())
        .bind(&data)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserPreferences>, PortError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT data FROM user_preferences WHERE user_id = ?")
                .bind(user_id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|(data,)| from_json(&data)).transpose()
    }
}
