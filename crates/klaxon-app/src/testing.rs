//! In-memory port implementations shared by the service tests. Clones share
//! state so a test can hand one copy to a service and inspect another.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use klaxon_core::alert::Alert;
use klaxon_core::channel::Channel;
use klaxon_core::escalation::{EscalationCursor, EscalationPolicy};
use klaxon_core::events::DomainEvent;
use klaxon_core::ids::{AlertId, OrganizationId, PolicyId, ScheduleId, TeamId, UserId};
use klaxon_core::organization::OrganizationSettings;
use klaxon_core::routing::AlertRoutingRule;
use klaxon_core::schedule::Schedule;
use klaxon_core::user::{Team, UserPreferences};
use klaxon_ports::error::{NotifyError, PortError};
use klaxon_ports::outbound::*;
use klaxon_ports::types::{
    DeliveryOutcome, DeliveryReceipt, Notification, NotificationLogEntry, VersionedAlert,
};

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

type ConcurrentWrite = Box<dyn FnOnce(&mut Alert) + Send>;

#[derive(Clone, Default)]
pub struct MemAlerts {
    pub alerts: Arc<Mutex<HashMap<AlertId, VersionedAlert>>>,
    /// When set, the next conditional update reports a lost race.
    pub lose_next_race: Arc<AtomicBool>,
    pub fail_reads: Arc<AtomicBool>,
    /// Applied to the stored alert just before the next `save_if_revision`,
    /// as if another writer had committed first.
    pub before_next_write: Arc<Mutex<Option<ConcurrentWrite>>>,
}

impl MemAlerts {
    pub fn get(&self, id: &AlertId) -> Alert {
        self.alerts.lock().unwrap().get(id).cloned().unwrap().alert
    }

    pub fn insert(&self, alert: Alert) {
        let mut alerts = self.alerts.lock().unwrap();
        let revision = alerts.get(alert.id()).map_or(0, |v| v.revision + 1);
        alerts.insert(alert.id().clone(), VersionedAlert { alert, revision });
    }

    pub fn interleave_write(&self, write: impl FnOnce(&mut Alert) + Send + 'static) {
        *self.before_next_write.lock().unwrap() = Some(Box::new(write));
    }

    fn take_race(&self) -> bool {
        self.lose_next_race.swap(false, Ordering::SeqCst)
    }

    fn update_if(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        now: DateTime<Utc>,
        apply: impl FnOnce(&mut Alert),
    ) -> bool {
        if self.take_race() {
            return false;
        }
        let mut alerts = self.alerts.lock().unwrap();
        let Some(stored) = alerts.get_mut(id) else {
            return false;
        };
        if !stored.alert.is_escalatable(now) || stored.alert.escalation_cursor() != expected {
            return false;
        }
        apply(&mut stored.alert);
        stored.revision += 1;
        true
    }
}

#[async_trait]
impl AlertRepository for MemAlerts {
    async fn save(&self, alert: &Alert) -> Result<(), PortError> {
        self.insert(alert.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &AlertId) -> Result<Option<Alert>, PortError> {
        Ok(self.alerts.lock().unwrap().get(id).map(|v| v.alert.clone()))
    }

    async fn find_versioned(&self, id: &AlertId) -> Result<Option<VersionedAlert>, PortError> {
        Ok(self.alerts.lock().unwrap().get(id).cloned())
    }

    async fn save_if_revision(&self, alert: &Alert, expected: i64) -> Result<bool, PortError> {
        let interleaved = self.before_next_write.lock().unwrap().take();
        let mut alerts = self.alerts.lock().unwrap();
        let Some(stored) = alerts.get_mut(alert.id()) else {
            return Ok(false);
        };
        if let Some(write) = interleaved {
            write(&mut stored.alert);
            stored.revision += 1;
        }
        if stored.revision != expected {
            return Ok(false);
        }
        stored.alert = alert.clone();
        stored.revision += 1;
        Ok(true)
    }

    async fn open_alerts_due_for_escalation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PortError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::Connection("store unavailable".into()));
        }
        let alerts = self.alerts.lock().unwrap();
        let mut due: Vec<Alert> = alerts
            .values()
            .map(|v| &v.alert)
            .filter(|a| a.is_escalatable(now))
            .cloned()
            .collect();
        due.sort_by_key(|a| a.created_at());
        Ok(due)
    }

    async fn advance_escalation(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        next: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        Ok(self.update_if(id, expected, now, |alert| alert.record_escalation(next, now)))
    }

    async fn mark_escalation_exhausted(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<bool, PortError> {
        Ok(self.update_if(id, expected, now, |alert| alert.mark_escalation_exhausted()))
    }
}

#[derive(Clone, Default)]
pub struct MemPolicies {
    pub policies: Arc<Mutex<Vec<EscalationPolicy>>>,
}

#[async_trait]
impl EscalationPolicyRepository for MemPolicies {
    async fn save(&self, policy: &EscalationPolicy) -> Result<(), PortError> {
        let mut policies = self.policies.lock().unwrap();
        policies.retain(|p| p.id() != policy.id());
        policies.push(policy.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<EscalationPolicy>, PortError> {
        Ok(self
            .policies
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id() == id)
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemSchedules {
    pub schedules: Arc<Mutex<Vec<Schedule>>>,
}

#[async_trait]
impl ScheduleRepository for MemSchedules {
    async fn save(&self, schedule: &Schedule) -> Result<(), PortError> {
        let mut schedules = self.schedules.lock().unwrap();
        if let Some(pos) = schedules.iter().position(|s| s.id() == schedule.id()) {
            schedules[pos] = schedule.clone();
        } else {
            schedules.push(schedule.clone());
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &ScheduleId) -> Result<Option<Schedule>, PortError> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id() == id)
            .cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemTeams {
    pub teams: Arc<Mutex<Vec<Team>>>,
}

#[async_trait]
impl TeamRepository for MemTeams {
    async fn save(&self, team: &Team) -> Result<(), PortError> {
        let mut teams = self.teams.lock().unwrap();
        teams.retain(|t| t.id() != team.id());
        teams.push(team.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, PortError> {
        Ok(self.teams.lock().unwrap().iter().find(|t| t.id() == id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemPreferences {
    pub prefs: Arc<Mutex<HashMap<UserId, UserPreferences>>>,
}

#[async_trait]
impl PreferenceRepository for MemPreferences {
    async fn save(&self, prefs: &UserPreferences) -> Result<(), PortError> {
        self.prefs
            .lock()
            .unwrap()
            .insert(prefs.user_id().clone(), prefs.clone());
        Ok(())
    }

    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserPreferences>, PortError> {
        Ok(self.prefs.lock().unwrap().get(user_id).cloned())
    }
}

#[derive(Clone, Default)]
pub struct MemOrganizations {
    pub settings: Arc<Mutex<HashMap<OrganizationId, OrganizationSettings>>>,
}

#[async_trait]
impl OrganizationRepository for MemOrganizations {
    async fn save_settings(&self, settings: &OrganizationSettings) -> Result<(), PortError> {
        self.settings
            .lock()
            .unwrap()
            .insert(settings.organization_id.clone(), settings.clone());
        Ok(())
    }

    async fn settings(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationSettings, PortError> {
        Ok(self
            .settings
            .lock()
            .unwrap()
            .get(organization_id)
            .cloned()
            .unwrap_or_else(|| OrganizationSettings::defaults_for(organization_id.clone())))
    }
}

#[derive(Clone, Default)]
pub struct MemRoutingRules {
    pub rules: Arc<Mutex<Vec<AlertRoutingRule>>>,
}

#[async_trait]
impl RoutingRuleRepository for MemRoutingRules {
    async fn save(&self, rule: &AlertRoutingRule) -> Result<(), PortError> {
        self.rules.lock().unwrap().push(rule.clone());
        Ok(())
    }

    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AlertRoutingRule>, PortError> {
        let mut rules: Vec<AlertRoutingRule> = self
            .rules
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.organization_id() == organization_id)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.priority());
        Ok(rules)
    }
}

#[derive(Clone, Default)]
pub struct RecordingDispatcher {
    pub sent: Arc<Mutex<Vec<Notification>>>,
    pub failing_channels: Arc<Mutex<Vec<Channel>>>,
    pub delay: Arc<Mutex<Option<Duration>>>,
}

impl RecordingDispatcher {
    pub fn sent_to(&self, user_id: &UserId) -> Vec<Channel> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| &n.user_id == user_id)
            .map(|n| n.channel)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(&self, notification: &Notification) -> Result<DeliveryReceipt, NotifyError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self
            .failing_channels
            .lock()
            .unwrap()
            .contains(&notification.channel)
        {
            return Err(NotifyError::ChannelUnavailable);
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(DeliveryReceipt {
            external_id: Some(notification.id.to_string()),
            ..Default::default()
        })
    }
}

#[derive(Clone, Default)]
pub struct MemLog {
    pub entries: Arc<Mutex<Vec<NotificationLogEntry>>>,
}

impl MemLog {
    pub fn with_outcome(&self, outcome: DeliveryOutcome) -> Vec<NotificationLogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.outcome == outcome)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationLog for MemLog {
    async fn record(&self, entry: &NotificationLogEntry) -> Result<(), PortError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MemEvents {
    pub events: Arc<Mutex<Vec<DomainEvent>>>,
}

impl MemEvents {
    pub fn types(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.event_type())
            .collect()
    }
}

#[async_trait]
impl EventPublisher for MemEvents {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError> {
        self.events.lock().unwrap().extend(events);
        Ok(())
    }
}
