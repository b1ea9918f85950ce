use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use klaxon_core::alert::Alert;
use klaxon_core::channel::Channel;
use klaxon_core::escalation::{
    due_at, Due, EscalationCursor, EscalationRule, EscalationTarget, NextStep, SnoozeResume,
    TargetKind,
};
use klaxon_core::events::{
    AlertEscalated, DomainEvent, EscalationExhausted, NotificationFailed, NotificationSent,
    NotificationSuppressed,
};
use klaxon_core::ids::{AlertId, NotificationId, UserId};
use klaxon_core::organization::OrganizationSettings;
use klaxon_core::schedule::OnCall;
use klaxon_core::user::{AllowReason, DndDecision};
use klaxon_ports::inbound::EscalationProcessor;
use klaxon_ports::outbound::{
    AlertRepository, EscalationPolicyRepository, EventPublisher, NotificationDispatcher,
    NotificationLog, OrganizationRepository, PreferenceRepository, ScheduleRepository,
    TeamRepository,
};
use klaxon_ports::types::{
    AlertOutcome, DeliveryOutcome, Notification, NotificationLogEntry, NotificationPayload,
    TickReport,
};

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on one alert's resolve, gate, dispatch and persist pass.
    pub per_alert_timeout: Duration,
    pub max_concurrent_alerts: usize,
    pub snooze_resume: SnoozeResume,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            per_alert_timeout: Duration::from_secs(10),
            max_concurrent_alerts: 16,
            snooze_resume: SnoozeResume::KeepDueTime,
        }
    }
}

/// Everything the engine reads from or writes to.
pub struct EnginePorts<A, P, S, T, U, O, D, L, E> {
    pub alerts: A,
    pub policies: P,
    pub schedules: S,
    pub teams: T,
    pub preferences: U,
    pub organizations: O,
    pub dispatcher: D,
    pub log: L,
    pub events: E,
}

pub struct EscalationEngine<A, P, S, T, U, O, D, L, E> {
    ports: EnginePorts<A, P, S, T, U, O, D, L, E>,
    config: EngineConfig,
    in_flight: Mutex<HashSet<AlertId>>,
}

/// A user reached by a rule, with the target that reached them first.
struct Recipient<'a> {
    user_id: UserId,
    target: &'a EscalationTarget,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    notified: usize,
    suppressed: usize,
    failed: usize,
    skipped: usize,
}

/// Removes the alert from the in-flight set when the unit of work ends,
/// including when it is cancelled by a timeout.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<AlertId>>,
    id: AlertId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a Mutex<HashSet<AlertId>>, id: &AlertId) -> Option<Self> {
        let mut ids = set.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id.clone()) {
            return None;
        }
        Some(Self {
            set,
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

impl<A, P, S, T, U, O, D, L, E> EscalationEngine<A, P, S, T, U, O, D, L, E>
where
    A: AlertRepository,
    P: EscalationPolicyRepository,
    S: ScheduleRepository,
    T: TeamRepository,
    U: PreferenceRepository,
    O: OrganizationRepository,
    D: NotificationDispatcher,
    L: NotificationLog,
    E: EventPublisher,
{
    pub fn new(ports: EnginePorts<A, P, S, T, U, O, D, L, E>, config: EngineConfig) -> Self {
        Self {
            ports,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::new(now);
        let candidates = match self.ports.alerts.open_alerts_due_for_escalation(now).await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(error = %e, "failed to load alerts for escalation");
                return report;
            }
        };

        report.outcomes = stream::iter(candidates)
            .map(|alert| async move {
                let id = alert.id().clone();
                let outcome = self.process_guarded(alert, now).await;
                (id, outcome)
            })
            .buffer_unordered(self.config.max_concurrent_alerts.max(1))
            .collect()
            .await;

        if report.escalated() > 0 || report.exhausted() > 0 || report.errors() > 0 {
            info!(summary = %report, "escalation tick finished");
        } else {
            debug!(summary = %report, "escalation tick finished");
        }
        report
    }

    async fn process_guarded(&self, alert: Alert, now: DateTime<Utc>) -> AlertOutcome {
        let id = alert.id().clone();
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight, &id) else {
            debug!(alert_id = %id, "alert already being processed");
            return AlertOutcome::InFlight;
        };

        let result = tokio::time::timeout(self.config.per_alert_timeout, self.process_alert(alert, now))
            .await
            .unwrap_or(Err(AppError::Timeout));

        match result {
            Ok(outcome) => outcome,
            Err(AppError::Timeout) => {
                warn!(alert_id = %id, "escalation timed out, alert left for next tick");
                AlertOutcome::TimedOut
            }
            Err(e) => {
                warn!(alert_id = %id, error = %e, "escalation failed, alert left for next tick");
                AlertOutcome::Failed(e.to_string())
            }
        }
    }

    async fn process_alert(&self, alert: Alert, now: DateTime<Utc>) -> Result<AlertOutcome, AppError> {
        let Some(policy_id) = alert.escalation_policy_id() else {
            return Ok(AlertOutcome::Failed("alert has no escalation policy".into()));
        };
        let policy = self
            .ports
            .policies
            .find_by_id(policy_id)
            .await?
            .ok_or_else(|| AppError::PolicyNotFound(policy_id.clone()))?;

        let due = due_at(&policy, &alert, self.config.snooze_resume);
        if !due.has_passed(now) {
            if let Due::At(at) = due {
                debug!(alert_id = %alert.id(), due_at = %at, "not due yet");
                return Ok(AlertOutcome::NotDue { due_at: at });
            }
        }

        let expected = alert.escalation_cursor();
        let (rule, next) = match policy.next_step(expected) {
            NextStep::Notify { rule, cursor } => (rule, cursor),
            NextStep::Exhausted => return self.exhaust(&alert, expected, now).await,
        };

        let settings = self
            .ports
            .organizations
            .settings(alert.organization_id())
            .await?;
        let (recipients, dangling) = self.resolve_recipients(rule, now).await?;
        let mut events = Vec::new();
        let mut tally = self
            .notify_all(&alert, rule, next, &recipients, &settings, now, &mut events)
            .await?;
        tally.skipped += dangling;

        let attempted = tally.notified + tally.failed;
        if attempted > 0 && tally.notified == 0 {
            self.publish(events).await;
            return Err(AppError::DeliveryFailed { attempted });
        }

        if !self
            .ports
            .alerts
            .advance_escalation(alert.id(), expected, next, now)
            .await?
        {
            debug!(alert_id = %alert.id(), cursor = %expected, "lost race advancing escalation");
            self.publish(events).await;
            return Ok(AlertOutcome::LostRace);
        }

        info!(
            alert_id = %alert.id(),
            level = next.level,
            cycle = next.cycle,
            notified = tally.notified,
            suppressed = tally.suppressed,
            failed = tally.failed,
            skipped = tally.skipped,
            "escalated alert"
        );
        events.push(DomainEvent::AlertEscalated(AlertEscalated {
            alert_id: alert.id().clone(),
            level: next.level,
            cycle: next.cycle,
            recipients: recipients.iter().map(|r| r.user_id.clone()).collect(),
            occurred_at: now,
        }));
        self.publish(events).await;

        Ok(AlertOutcome::Escalated {
            level: next.level,
            cycle: next.cycle,
            notified: tally.notified,
            suppressed: tally.suppressed,
            failed: tally.failed,
            skipped: tally.skipped,
        })
    }

    async fn exhaust(
        &self,
        alert: &Alert,
        expected: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<AlertOutcome, AppError> {
        if !self
            .ports
            .alerts
            .mark_escalation_exhausted(alert.id(), expected, now)
            .await?
        {
            debug!(alert_id = %alert.id(), "lost race marking escalation exhausted");
            return Ok(AlertOutcome::LostRace);
        }
        info!(alert_id = %alert.id(), cursor = %expected, "escalation exhausted");
        if let Some(policy_id) = alert.escalation_policy_id() {
            self.publish(vec![DomainEvent::EscalationExhausted(EscalationExhausted {
                alert_id: alert.id().clone(),
                policy_id: policy_id.clone(),
                occurred_at: now,
            })])
            .await;
        }
        Ok(AlertOutcome::Exhausted)
    }

    /// Users reached by `rule` in target order, each listed once. Also
    /// returns how many targets pointed at a team or schedule that no longer
    /// exists.
    async fn resolve_recipients<'r>(
        &self,
        rule: &'r EscalationRule,
        now: DateTime<Utc>,
    ) -> Result<(Vec<Recipient<'r>>, usize), AppError> {
        let mut recipients: Vec<Recipient<'r>> = Vec::new();
        let mut dangling = 0;
        for target in rule.targets() {
            let users = match self.resolve_target(target, now).await {
                Ok(users) => users,
                Err(e @ (AppError::TeamNotFound(_) | AppError::ScheduleNotFound(_))) => {
                    warn!(error = %e, rule = rule.position(), "skipping dangling escalation target");
                    dangling += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            for user_id in users {
                if !recipients.iter().any(|r| r.user_id == user_id) {
                    recipients.push(Recipient { user_id, target });
                }
            }
        }
        Ok((recipients, dangling))
    }

    async fn resolve_target(
        &self,
        target: &EscalationTarget,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserId>, AppError> {
        match target.kind() {
            TargetKind::User(user_id) => Ok(vec![user_id.clone()]),
            TargetKind::Team(team_id) => {
                let team = self
                    .ports
                    .teams
                    .find_by_id(team_id)
                    .await?
                    .ok_or_else(|| AppError::TeamNotFound(team_id.clone()))?;
                Ok(team.members().to_vec())
            }
            TargetKind::Schedule(schedule_id) => {
                let schedule = self
                    .ports
                    .schedules
                    .find_by_id(schedule_id)
                    .await?
                    .ok_or_else(|| AppError::ScheduleNotFound(schedule_id.clone()))?;
                match schedule.on_call_at(now) {
                    OnCall::Assigned(shift) => Ok(vec![shift.user_id]),
                    OnCall::Nobody => {
                        info!(schedule_id = %schedule_id, "nobody on call");
                        Ok(vec![])
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn notify_all(
        &self,
        alert: &Alert,
        rule: &EscalationRule,
        cursor: EscalationCursor,
        recipients: &[Recipient<'_>],
        settings: &OrganizationSettings,
        now: DateTime<Utc>,
        events: &mut Vec<DomainEvent>,
    ) -> Result<Tally, AppError> {
        let mut tally = Tally::default();
        let entry = |user_id: &UserId, channel: Option<Channel>, outcome, reason: Option<String>| {
            NotificationLogEntry {
                alert_id: alert.id().clone(),
                user_id: user_id.clone(),
                channel,
                escalation_level: cursor.level,
                rule_position: rule.position(),
                outcome,
                reason,
                external_id: None,
                recorded_at: now,
            }
        };

        for recipient in recipients {
            let user_id = &recipient.user_id;
            let prefs = self.ports.preferences.find_by_user(user_id).await?;
            let channels: Vec<Channel> = match recipient.target.channel_override() {
                Some(channels) => channels.to_vec(),
                None => prefs
                    .as_ref()
                    .map(|p| p.channels().to_vec())
                    .unwrap_or_default(),
            };

            if channels.is_empty() {
                warn!(alert_id = %alert.id(), user_id = %user_id, "no notification channels");
                let skipped = entry(
                    user_id,
                    None,
                    DeliveryOutcome::Skipped,
                    Some("no_channels".into()),
                );
                self.ports.log.record(&skipped).await?;
                tally.skipped += 1;
                continue;
            }

            let urgent = recipient.target.is_urgent() && settings.allow_urgent_dnd_bypass;
            let decision = prefs
                .as_ref()
                .map(|p| p.dnd().check(now, alert.priority(), urgent))
                .unwrap_or(DndDecision::Allow(AllowReason::Disabled));

            if decision == DndDecision::Suppress {
                debug!(alert_id = %alert.id(), user_id = %user_id, "suppressed by do not disturb");
                for channel in &channels {
                    let suppressed = entry(
                        user_id,
                        Some(*channel),
                        DeliveryOutcome::Suppressed,
                        Some("dnd".into()),
                    );
                    self.ports.log.record(&suppressed).await?;
                    tally.suppressed += 1;
                }
                events.push(DomainEvent::NotificationSuppressed(NotificationSuppressed {
                    alert_id: alert.id().clone(),
                    user_id: user_id.clone(),
                    reason: "dnd".into(),
                    occurred_at: now,
                }));
                continue;
            }

            for channel in channels {
                let notification = Notification {
                    id: NotificationId::new(),
                    alert_id: alert.id().clone(),
                    user_id: user_id.clone(),
                    channel,
                    payload: NotificationPayload {
                        title: alert.title().to_string(),
                        message: alert.message().to_string(),
                        priority: alert.priority(),
                        source: alert.source().as_str().to_string(),
                        escalation_level: cursor.level,
                    },
                };
                match self.ports.dispatcher.send(&notification).await {
                    Ok(receipt) => {
                        let mut sent = entry(user_id, Some(channel), DeliveryOutcome::Sent, None);
                        sent.external_id = receipt.external_id.clone();
                        self.ports.log.record(&sent).await?;
                        tally.notified += 1;
                        events.push(DomainEvent::NotificationSent(NotificationSent {
                            alert_id: alert.id().clone(),
                            user_id: user_id.clone(),
                            channel,
                            external_id: receipt.external_id,
                            occurred_at: now,
                        }));
                    }
                    Err(e) => {
                        warn!(
                            alert_id = %alert.id(),
                            user_id = %user_id,
                            channel = %channel,
                            error = %e,
                            "notification dispatch failed"
                        );
                        let failed = entry(
                            user_id,
                            Some(channel),
                            DeliveryOutcome::Failed,
                            Some(e.to_string()),
                        );
                        self.ports.log.record(&failed).await?;
                        tally.failed += 1;
                        events.push(DomainEvent::NotificationFailed(NotificationFailed {
                            alert_id: alert.id().clone(),
                            user_id: user_id.clone(),
                            channel,
                            error: e.to_string(),
                            occurred_at: now,
                        }));
                    }
                }
            }
        }
        Ok(tally)
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        if let Err(e) = self.ports.events.publish(events).await {
            warn!(error = %e, "failed to publish escalation events");
        }
    }
}

#[async_trait]
impl<A, P, S, T, U, O, D, L, E> EscalationProcessor for EscalationEngine<A, P, S, T, U, O, D, L, E>
where
    A: AlertRepository,
    P: EscalationPolicyRepository,
    S: ScheduleRepository,
    T: TeamRepository,
    U: PreferenceRepository,
    O: OrganizationRepository,
    D: NotificationDispatcher,
    L: NotificationLog,
    E: EventPublisher,
{
    async fn process_pending_escalations(&self, now: DateTime<Utc>) -> TickReport {
        self.tick(now).await
    }
}
