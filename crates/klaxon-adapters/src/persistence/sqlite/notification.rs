use async_trait::async_trait;
use chrono::Utc;

use klaxon_ports::error::{NotifyError, PortError};
use klaxon_ports::outbound::{NotificationDispatcher, NotificationLog};
use klaxon_ports::types::{DeliveryReceipt, Notification, NotificationLogEntry};

use super::{timestamp, to_json, SqliteDb};

/// Dispatch writes to the `notifications` outbox. Delivery workers pick rows
/// up from there, so a successful insert counts as handed off.
#[async_trait]
impl NotificationDispatcher for SqliteDb {
    async fn send(&self, notification: &Notification) -> Result<DeliveryReceipt, NotifyError> {
        let payload =
            to_json(&notification.payload).map_err(|e| NotifyError::DeliveryFailed(e.to_string()))?;
        let id = notification.id.to_string();

        sqlx::query(
            "INSERT INTO notifications (id, alert_id, user_id, channel, payload, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(notification.alert_id.to_string())
        .bind(notification.user_id.to_string())
        .bind(notification.channel.as_str())
        .bind(&payload)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => NotifyError::ChannelUnavailable,
            other => NotifyError::DeliveryFailed(other.to_string()),
        })?;

        Ok(DeliveryReceipt {
            external_id: Some(id),
            ..Default::default()
        })
    }
}

#[async_trait]
impl NotificationLog for SqliteDb {
    async fn record(&self, entry: &NotificationLogEntry) -> Result<(), PortError> {
        sqlx::query(
            "INSERT INTO notification_log (alert_id, user_id, channel, escalation_level,
                rule_position, outcome, reason, external_id, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.alert_id.to_string())
        .bind(entry.user_id.to_string())
        .bind(entry.channel.map(|c| c.as_str()))
        .bind(entry.escalation_level)
        .bind(i64::from(entry.rule_position))
        .bind(entry.outcome.as_str())
        .bind(&entry.reason)
        .bind(&entry.external_id)
        .bind(timestamp(entry.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Persistence(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::{memory_db, ts};
    use super::*;
    use klaxon_core::alert::Priority;
    use klaxon_core::channel::Channel;
    use klaxon_core::ids::{AlertId, NotificationId, UserId};
    use klaxon_ports::types::{DeliveryOutcome, NotificationPayload};

    fn notification(channel: Channel) -> Notification {
        Notification {
            id: NotificationId::new(),
            alert_id: AlertId::new(),
            user_id: UserId::new(),
            channel,
            payload: NotificationPayload {
                title: "HighCPU".into(),
                message: "cpu at 97%".into(),
                priority: Priority::P1,
                source: "prometheus".into(),
                escalation_level: 0,
            },
        }
    }

    #[tokio::test]
    async fn send_queues_pending_outbox_row() {
        let db = memory_db().await;
        let n = notification(Channel::Sms);

        let receipt = db.send(&n).await.unwrap();

        assert_eq!(receipt.external_id, Some(n.id.to_string()));
        let row: (String, String) =
            sqlx::query_as("SELECT channel, status FROM notifications WHERE id = ?")
                .bind(n.id.to_string())
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(row, ("sms".to_string(), "pending".to_string()));
    }

    #[tokio::test]
    async fn duplicate_notification_is_a_delivery_failure() {
        let db = memory_db().await;
        let n = notification(Channel::Email);
        db.send(&n).await.unwrap();

        let err = db.send(&n).await.unwrap_err();
        assert!(matches!(err, NotifyError::DeliveryFailed(_)));
    }

    #[tokio::test]
    async fn closed_outbox_is_unavailable() {
        let db = memory_db().await;
        db.pool().close().await;

        let err = db.send(&notification(Channel::Push)).await.unwrap_err();
        assert!(matches!(err, NotifyError::ChannelUnavailable));
    }

    #[tokio::test]
    async fn record_keeps_every_outcome() {
        let db = memory_db().await;
        let alert_id = AlertId::new();
        let user_id = UserId::new();
        let entry = |channel, outcome, reason: Option<&str>| NotificationLogEntry {
            alert_id: alert_id.clone(),
            user_id: user_id.clone(),
            channel,
            escalation_level: 1,
            rule_position: 1,
            outcome,
            reason: reason.map(String::from),
            external_id: None,
            recorded_at: ts("2025-01-15T10:00:00Z"),
        };

        db.record(&entry(Some(Channel::Sms), DeliveryOutcome::Suppressed, Some("dnd")))
            .await
            .unwrap();
        db.record(&entry(None, DeliveryOutcome::Skipped, Some("no_channels")))
            .await
            .unwrap();

        let rows: Vec<(Option<String>, String, Option<String>)> = sqlx::query_as(
            "SELECT channel, outcome, reason FROM notification_log
             WHERE alert_id = ? ORDER BY id",
        )
        .bind(alert_id.to_string())
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(
            rows,
            [
                (Some("sms".into()), "suppressed".into(), Some("dnd".into())),
                (None, "skipped".into(), Some("no_channels".into())),
            ]
        );
    }
}
