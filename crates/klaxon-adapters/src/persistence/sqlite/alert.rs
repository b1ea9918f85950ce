use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use klaxon_core::alert::Alert;
use klaxon_core::escalation::EscalationCursor;
use klaxon_core::ids::AlertId;
use klaxon_ports::error::PortError;
use klaxon_ports::outbound::AlertRepository;
use klaxon_ports::types::VersionedAlert;

use super::{from_json, timestamp, to_json, SqliteDb};

/// Index columns kept next to the JSON body so candidate selection and the
/// conditional update can run in SQL.
struct AlertColumns {
    id: String,
    organization_id: String,
    status: &'static str,
    priority: &'static str,
    escalation_policy_id: Option<String>,
    escalation_level: i64,
    escalation_cycle: i64,
    escalation_exhausted: bool,
    snoozed_until: Option<String>,
    suppressed: bool,
    data: String,
    created_at: String,
}

impl AlertColumns {
    fn from_alert(alert: &Alert) -> Result<Self, PortError> {
        Ok(Self {
            id: alert.id().to_string(),
            organization_id: alert.organization_id().to_string(),
            status: alert.status().as_str(),
            priority: alert.priority().as_str(),
            escalation_policy_id: alert.escalation_policy_id().map(|p| p.to_string()),
            escalation_level: i64::from(alert.escalation_level()),
            escalation_cycle: i64::from(alert.escalation_cursor().cycle),
            escalation_exhausted: alert.is_escalation_exhausted(),
            snoozed_until: alert.snooze_window().map(|w| timestamp(w.until)),
            suppressed: alert.is_suppressed(),
            data: to_json(alert)?,
            created_at: timestamp(alert.created_at()),
        })
    }
}

impl SqliteDb {
    /// Read the alert, let `apply` change it when it is still escalatable at
    /// `expected`, and write it back only if no other writer bumped the
    /// revision in between.
    ///
    /// No explicit transaction: the revision guard on the `UPDATE` is what
    /// makes the pair atomic, and two deferred transactions upgrading at once
    /// fail with `SQLITE_BUSY`.
    async fn update_if_current(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Alert) + Send,
    ) -> Result<bool, PortError> {
        let Some(VersionedAlert {
            mut alert,
            revision,
        }) = self.find_versioned(id).await?
        else {
            return Ok(false);
        };
        if !alert.is_escalatable(now) || alert.escalation_cursor() != expected {
            debug!(alert_id = %id, cursor = %alert.escalation_cursor(), "alert moved on, skipping update");
            return Ok(false);
        }
        apply(&mut alert);
        self.save_if_revision(&alert, revision).await
    }
}

#[async_trait]
impl AlertRepository for SqliteDb {
    async fn save(&self, alert: &Alert) -> Result<(), PortError> {
        let cols = AlertColumns::from_alert(alert)?;

        sqlx::query(
            "INSERT INTO alerts (id, organization_id, status, priority, escalation_policy_id,
                escalation_level, escalation_cycle, escalation_exhausted, snoozed_until,
                suppressed, data, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                priority = excluded.priority,
                escalation_policy_id = excluded.escalation_policy_id,
                escalation_level = excluded.escalation_level,
                escalation_cycle = excluded.escalation_cycle,
                escalation_exhausted = excluded.escalation_exhausted,
                snoozed_until = excluded.snoozed_until,
                suppressed = excluded.suppressed,
                data = excluded.data,
                revision = alerts.revision + 1",
        )
        .bind(&cols.id)
        .bind(&cols.organization_id)
        .bind(cols.status)
        .bind(cols.priority)
        .bind(&cols.escalation_policy_id)
        .bind(cols.escalation_level)
        .bind(cols.escalation_cycle)
        .bind(cols.escalation_exhausted)
        .bind(&cols.snoozed_until)
        .bind(cols.suppressed)
        .bind(&cols.data)
        .bind(&cols.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &AlertId) -> Result<Option<Alert>, PortError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT data FROM alerts WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|(data,)| from_json(&data)).transpose()
    }

    async fn find_versioned(&self, id: &AlertId) -> Result<Option<VersionedAlert>, PortError> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT data, revision FROM alerts WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| PortError::Persistence(e.to_string()))?;

        row.map(|(data, revision)| {
            Ok(VersionedAlert {
                alert: from_json(&data)?,
                revision,
            })
        })
        .transpose()
    }

    async fn save_if_revision(&self, alert: &Alert, expected: i64) -> Result<bool, PortError> {
        let cols = AlertColumns::from_alert(alert)?;

        let result = sqlx::query(
            "UPDATE alerts SET
                status = ?, priority = ?, escalation_policy_id = ?,
                escalation_level = ?, escalation_cycle = ?, escalation_exhausted = ?,
                snoozed_until = ?, suppressed = ?, data = ?, revision = revision + 1
             WHERE id = ? AND revision = ?",
        )
        .bind(cols.status)
        .bind(cols.priority)
        .bind(&cols.escalation_policy_id)
        .bind(cols.escalation_level)
        .bind(cols.escalation_cycle)
        .bind(cols.escalation_exhausted)
        .bind(&cols.snoozed_until)
        .bind(cols.suppressed)
        .bind(&cols.data)
        .bind(&cols.id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn open_alerts_due_for_escalation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PortError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT data FROM alerts
             WHERE escalation_policy_id IS NOT NULL
               AND escalation_exhausted = 0
               AND suppressed = 0
               AND (status = 'open'
                    OR (status = 'snoozed' AND (snoozed_until IS NULL OR snoozed_until <= ?)))
             ORDER BY created_at ASC",
        )
        .bind(timestamp(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        let mut alerts = Vec::with_capacity(rows.len());
        for (data,) in rows {
            let alert: Alert = from_json(&data)?;
            if alert.is_escalatable(now) {
                alerts.push(alert);
            }
        }
        Ok(alerts)
    }

    async fn advance_escalation(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        next: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        self.update_if_current(id, expected, now, |alert| {
            alert.record_escalation(next, now)
        })
        .await
    }

    async fn mark_escalation_exhausted(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        self.update_if_current(id, expected, now, |alert| alert.mark_escalation_exhausted())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::super::{memory_db, ts};
    use super::*;
    use klaxon_core::alert::{Priority, Source, Status};
    use klaxon_core::ids::{OrganizationId, PolicyId, UserId};

    fn now() -> DateTime<Utc> {
        ts("2025-01-15T10:00:00Z")
    }

    fn enrolled_alert() -> Alert {
        let (mut alert, _) = Alert::new(
            OrganizationId::new(),
            Source::new("prometheus"),
            "HighCPU".into(),
            "cpu at 97%".into(),
            Priority::P2,
            now(),
        );
        alert.enroll(PolicyId::new());
        alert
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let db = memory_db().await;
        let alert = enrolled_alert().with_tags(vec!["prod".into()]);

        db.save(&alert).await.unwrap();

        let found = db.find_by_id(alert.id()).await.unwrap().unwrap();
        assert_eq!(found.id(), alert.id());
        assert_eq!(found.status(), Status::Open);
        assert_eq!(found.tags(), ["prod"]);
        assert!(db.find_by_id(&AlertId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn candidates_exclude_acknowledged_and_unexpired_snoozes() {
        let db = memory_db().await;
        let open = enrolled_alert();
        let mut acked = enrolled_alert();
        acked.acknowledge(UserId::new(), now()).unwrap();
        let mut snoozed = enrolled_alert();
        snoozed
            .snooze(now() + chrono::Duration::minutes(30), now())
            .unwrap();
        let (unenrolled, _) = Alert::new(
            OrganizationId::new(),
            Source::new("datadog"),
            "disk".into(),
            "disk full".into(),
            Priority::P3,
            now(),
        );
        for alert in [&open, &acked, &snoozed, &unenrolled] {
            db.save(alert).await.unwrap();
        }

        let due = db.open_alerts_due_for_escalation(now()).await.unwrap();
        let ids: Vec<&AlertId> = due.iter().map(|a| a.id()).collect();
        assert_eq!(ids, [open.id()]);

        let later = db
            .open_alerts_due_for_escalation(now() + chrono::Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(later.len(), 2);
    }

    #[tokio::test]
    async fn advance_is_compare_and_swap() {
        let db = memory_db().await;
        let alert = enrolled_alert();
        db.save(&alert).await.unwrap();
        let start = alert.escalation_cursor();
        let first = EscalationCursor { level: 0, cycle: 0 };

        assert!(db.advance_escalation(alert.id(), start, first, now()).await.unwrap());
        assert!(!db.advance_escalation(alert.id(), start, first, now()).await.unwrap());

        let stored = db.find_by_id(alert.id()).await.unwrap().unwrap();
        assert_eq!(stored.escalation_cursor(), first);
        assert_eq!(stored.last_escalated_at(), Some(now()));
    }

    #[tokio::test]
    async fn acknowledgement_wins_over_pending_advance() {
        let db = memory_db().await;
        let alert = enrolled_alert();
        db.save(&alert).await.unwrap();
        let start = alert.escalation_cursor();

        let mut acked = alert.clone();
        acked.acknowledge(UserId::new(), now()).unwrap();
        db.save(&acked).await.unwrap();

        let advanced = db
            .advance_escalation(alert.id(), start, EscalationCursor { level: 0, cycle: 0 }, now())
            .await
            .unwrap();
        assert!(!advanced);
        let stored = db.find_by_id(alert.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), Status::Acknowledged);
        assert_eq!(stored.escalation_level(), -1);
    }

    #[tokio::test]
    async fn stale_write_cannot_roll_back_an_advance() {
        let db = memory_db().await;
        let alert = enrolled_alert();
        db.save(&alert).await.unwrap();

        let VersionedAlert {
            alert: mut snapshot,
            revision,
        } = db.find_versioned(alert.id()).await.unwrap().unwrap();
        let first = EscalationCursor { level: 0, cycle: 0 };
        assert!(db
            .advance_escalation(alert.id(), EscalationCursor::START, first, now())
            .await
            .unwrap());

        snapshot
            .snooze(now() + chrono::Duration::minutes(30), now())
            .unwrap();
        assert!(!db.save_if_revision(&snapshot, revision).await.unwrap());

        let stored = db.find_versioned(alert.id()).await.unwrap().unwrap();
        assert_eq!(stored.alert.escalation_cursor(), first);
        assert_eq!(stored.alert.status(), Status::Open);

        let mut fresh = stored.alert;
        fresh
            .snooze(now() + chrono::Duration::minutes(30), now())
            .unwrap();
        assert!(db.save_if_revision(&fresh, stored.revision).await.unwrap());
        let stored = db.find_by_id(alert.id()).await.unwrap().unwrap();
        assert_eq!(stored.escalation_cursor(), first);
        assert_eq!(stored.status(), Status::Snoozed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_advances_on_a_file_db_pick_one_winner() {
        let path = std::env::temp_dir().join(format!("klaxon-{}.db", AlertId::new()));
        let db = SqliteDb::new(&format!("sqlite://{}?mode=rwc", path.display()))
            .await
            .unwrap();
        let alert = enrolled_alert();
        db.save(&alert).await.unwrap();
        let first = EscalationCursor { level: 0, cycle: 0 };

        let (a, b) = tokio::join!(
            db.advance_escalation(alert.id(), EscalationCursor::START, first, now()),
            db.advance_escalation(alert.id(), EscalationCursor::START, first, now()),
        );
        let wins = [a.unwrap(), b.unwrap()];

        assert_eq!(wins.iter().filter(|won| **won).count(), 1);
        let stored = db.find_by_id(alert.id()).await.unwrap().unwrap();
        assert_eq!(stored.escalation_cursor(), first);

        db.pool().close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn exhausted_alert_leaves_candidates() {
        let db = memory_db().await;
        let alert = enrolled_alert();
        db.save(&alert).await.unwrap();

        assert!(db
            .mark_escalation_exhausted(alert.id(), alert.escalation_cursor(), now())
            .await
            .unwrap());

        let stored = db.find_by_id(alert.id()).await.unwrap().unwrap();
        assert!(stored.is_escalation_exhausted());
        assert_eq!(stored.status(), Status::Open);
        assert!(db.open_alerts_due_for_escalation(now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_alert_does_not_advance() {
        let db = memory_db().await;
        let advanced = db
            .advance_escalation(
                &AlertId::new(),
                EscalationCursor::START,
                EscalationCursor { level: 0, cycle: 0 },
                now(),
            )
            .await
            .unwrap();
        assert!(!advanced);
    }
}
