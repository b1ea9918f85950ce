use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use klaxon_core::alert::{Alert, Source};
use klaxon_core::error::DomainError;
use klaxon_core::events::DomainEvent;
use klaxon_core::ids::{AlertId, UserId};
use klaxon_core::routing;
use klaxon_ports::outbound::{AlertRepository, EventPublisher, RoutingRuleRepository};
use klaxon_ports::types::{NewAlert, VersionedAlert};

use crate::error::AppError;

const MAX_WRITE_ATTEMPTS: u32 = 3;

/// Alert intake and the human-driven transitions.
pub struct AlertService<A, R, E>
where
    A: AlertRepository,
    R: RoutingRuleRepository,
    E: EventPublisher,
{
    alerts: A,
    rules: R,
    events: E,
}

impl<A, R, E> AlertService<A, R, E>
where
    A: AlertRepository,
    R: RoutingRuleRepository,
    E: EventPublisher,
{
    pub fn new(alerts: A, rules: R, events: E) -> Self {
        Self {
            alerts,
            rules,
            events,
        }
    }

    /// Build the alert, run it through the organization's routing rules and
    /// persist the result. A policy named on the request is only used when no
    /// matching rule assigned one.
    pub async fn create_alert(&self, new: NewAlert, now: DateTime<Utc>) -> Result<Alert, AppError> {
        let (alert, mut events) = Alert::new(
            new.organization_id.clone(),
            Source::new(new.source),
            new.title,
            new.message,
            new.priority,
            now,
        );
        let mut alert = alert
            .with_tags(new.tags)
            .with_custom_fields(new.custom_fields);

        let rules = self.rules.list_for_organization(&new.organization_id).await?;
        let decision = routing::evaluate(&rules, &alert);
        for skipped in &decision.skipped {
            warn!(
                alert_id = %alert.id(),
                rule_id = %skipped.rule_id,
                error = %skipped.error,
                "skipping routing rule that failed to evaluate"
            );
        }
        if let Some(rule) = decision.matched {
            info!(alert_id = %alert.id(), rule_id = %rule.id(), rule = rule.name(), "alert routed");
            events.extend(rule.actions().apply(&mut alert, rule.id(), now));
        }

        if alert.escalation_policy_id().is_none() && !alert.is_suppressed() {
            if let Some(policy_id) = new.escalation_policy_id {
                alert.enroll(policy_id);
            }
        }

        self.alerts.save(&alert).await?;
        self.events.publish(events).await?;
        Ok(alert)
    }

    pub async fn acknowledge(
        &self,
        alert_id: &AlertId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Alert, AppError> {
        self.transition(alert_id, |alert| alert.acknowledge(user_id.clone(), now))
            .await
    }

    pub async fn close(
        &self,
        alert_id: &AlertId,
        closed_by: String,
        now: DateTime<Utc>,
    ) -> Result<Alert, AppError> {
        self.transition(alert_id, |alert| alert.close(closed_by.clone(), now))
            .await
    }

    pub async fn snooze(
        &self,
        alert_id: &AlertId,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Alert, AppError> {
        self.transition(alert_id, |alert| alert.snooze(until, now))
            .await
    }

    /// Apply `change` to the stored alert and write it back against the
    /// revision it was read at. When the engine (or anyone else) wrote in
    /// between, the change is re-applied to the fresh alert so their update
    /// is kept. No-op transitions return no events and skip the write.
    async fn transition<F>(&self, alert_id: &AlertId, change: F) -> Result<Alert, AppError>
    where
        F: Fn(&mut Alert) -> Result<Vec<DomainEvent>, DomainError> + Send + Sync,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let VersionedAlert {
                mut alert,
                revision,
            } = self
                .alerts
                .find_versioned(alert_id)
                .await?
                .ok_or_else(|| AppError::AlertNotFound(alert_id.clone()))?;

            let events = change(&mut alert)?;
            if events.is_empty() {
                return Ok(alert);
            }
            if self.alerts.save_if_revision(&alert, revision).await? {
                self.events.publish(events).await?;
                return Ok(alert);
            }
            debug!(alert_id = %alert_id, attempt, "alert changed while updating, retrying");
        }
        Err(AppError::ConcurrentUpdate(alert_id.clone()))
    }
}
