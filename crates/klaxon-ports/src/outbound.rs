use async_trait::async_trait;
use chrono::{DateTime, Utc};

use klaxon_core::alert::Alert;
use klaxon_core::escalation::{EscalationCursor, EscalationPolicy};
use klaxon_core::events::DomainEvent;
use klaxon_core::ids::{AlertId, OrganizationId, PolicyId, ScheduleId, TeamId, UserId};
use klaxon_core::organization::OrganizationSettings;
use klaxon_core::routing::AlertRoutingRule;
use klaxon_core::schedule::Schedule;
use klaxon_core::user::{Team, UserPreferences};

use crate::error::{NotifyError, PortError};
use crate::types::{DeliveryReceipt, Notification, NotificationLogEntry, VersionedAlert};

#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// Unconditional write, for new alerts. Bumps the row revision so a
    /// concurrent `advance_escalation` against the old state fails.
    async fn save(&self, alert: &Alert) -> Result<(), PortError>;
    async fn find_by_id(&self, id: &AlertId) -> Result<Option<Alert>, PortError>;
    async fn find_versioned(&self, id: &AlertId) -> Result<Option<VersionedAlert>, PortError>;
    /// Overwrite the stored alert only if its revision is still `expected`.
    /// `Ok(false)` means another writer changed it since it was read.
    async fn save_if_revision(&self, alert: &Alert, expected: i64) -> Result<bool, PortError>;
    /// Open (or snooze-expired) enrolled alerts that are not exhausted. The
    /// caller decides which of them are due under their policy.
    async fn open_alerts_due_for_escalation(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Alert>, PortError>;
    /// Move the cursor from `expected` to `next` only if the alert is still
    /// escalatable and its cursor still equals `expected`. `Ok(false)` means
    /// another actor got there first.
    async fn advance_escalation(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        next: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<bool, PortError>;
    async fn mark_escalation_exhausted(
        &self,
        id: &AlertId,
        expected: EscalationCursor,
        now: DateTime<Utc>,
    ) -> Result<bool, PortError>;
}

#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn save(&self, schedule: &Schedule) -> Result<(), PortError>;
    async fn find_by_id(&self, id: &ScheduleId) -> Result<Option<Schedule>, PortError>;
}

#[async_trait]
pub trait EscalationPolicyRepository: Send + Sync {
    async fn save(&self, policy: &EscalationPolicy) -> Result<(), PortError>;
    async fn find_by_id(&self, id: &PolicyId) -> Result<Option<EscalationPolicy>, PortError>;
}

#[async_trait]
pub trait RoutingRuleRepository: Send + Sync {
    async fn save(&self, rule: &AlertRoutingRule) -> Result<(), PortError>;
    /// Rules of one organization in ascending priority order.
    async fn list_for_organization(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<AlertRoutingRule>, PortError>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn save(&self, team: &Team) -> Result<(), PortError>;
    async fn find_by_id(&self, id: &TeamId) -> Result<Option<Team>, PortError>;
}

#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn save(&self, prefs: &UserPreferences) -> Result<(), PortError>;
    async fn find_by_user(&self, user_id: &UserId) -> Result<Option<UserPreferences>, PortError>;
}

#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    async fn save_settings(&self, settings: &OrganizationSettings) -> Result<(), PortError>;
    /// Stored settings, or the defaults when none were saved.
    async fn settings(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<OrganizationSettings, PortError>;
}

/// Hands a notification to the delivery subsystem. Retries are the
/// dispatcher's own concern.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<DeliveryReceipt, NotifyError>;
}

#[async_trait]
pub trait NotificationLog: Send + Sync {
    async fn record(&self, entry: &NotificationLogEntry) -> Result<(), PortError>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError>;
}
