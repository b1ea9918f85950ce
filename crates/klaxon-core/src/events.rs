use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::alert::Priority;
use crate::channel::Channel;
use crate::ids::{AlertId, PolicyId, RoutingRuleId, ScheduleId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DomainEvent {
    AlertCreated(AlertCreated),
    AlertRouted(AlertRouted),
    AlertSuppressed(AlertSuppressed),
    AlertAcknowledged(AlertAcknowledged),
    AlertClosed(AlertClosed),
    AlertSnoozed(AlertSnoozed),
    AlertEscalated(AlertEscalated),
    EscalationExhausted(EscalationExhausted),
    NotificationSent(NotificationSent),
    NotificationFailed(NotificationFailed),
    NotificationSuppressed(NotificationSuppressed),
    OnCallChanged(OnCallChanged),
}

impl DomainEvent {
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            Self::AlertCreated(e) => e.occurred_at,
            Self::AlertRouted(e) => e.occurred_at,
            Self::AlertSuppressed(e) => e.occurred_at,
            Self::AlertAcknowledged(e) => e.occurred_at,
            Self::AlertClosed(e) => e.occurred_at,
            Self::AlertSnoozed(e) => e.occurred_at,
            Self::AlertEscalated(e) => e.occurred_at,
            Self::EscalationExhausted(e) => e.occurred_at,
            Self::NotificationSent(e) => e.occurred_at,
            Self::NotificationFailed(e) => e.occurred_at,
            Self::NotificationSuppressed(e) => e.occurred_at,
            Self::OnCallChanged(e) => e.occurred_at,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AlertCreated(_) => "alert.created",
            Self::AlertRouted(_) => "alert.routed",
            Self::AlertSuppressed(_) => "alert.suppressed",
            Self::AlertAcknowledged(_) => "alert.acknowledged",
            Self::AlertClosed(_) => "alert.closed",
            Self::AlertSnoozed(_) => "alert.snoozed",
            Self::AlertEscalated(_) => "alert.escalated",
            Self::EscalationExhausted(_) => "escalation.exhausted",
            Self::NotificationSent(_) => "notification.sent",
            Self::NotificationFailed(_) => "notification.failed",
            Self::NotificationSuppressed(_) => "notification.suppressed",
            Self::OnCallChanged(_) => "oncall.changed",
        }
    }

    /// The alert this event belongs to, if any.
    pub fn alert_id(&self) -> Option<&AlertId> {
        match self {
            Self::AlertCreated(e) => Some(&e.alert_id),
            Self::AlertRouted(e) => Some(&e.alert_id),
            Self::AlertSuppressed(e) => Some(&e.alert_id),
            Self::AlertAcknowledged(e) => Some(&e.alert_id),
            Self::AlertClosed(e) => Some(&e.alert_id),
            Self::AlertSnoozed(e) => Some(&e.alert_id),
            Self::AlertEscalated(e) => Some(&e.alert_id),
            Self::EscalationExhausted(e) => Some(&e.alert_id),
            Self::NotificationSent(e) => Some(&e.alert_id),
            Self::NotificationFailed(e) => Some(&e.alert_id),
            Self::NotificationSuppressed(e) => Some(&e.alert_id),
            Self::OnCallChanged(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertCreated {
    pub alert_id: AlertId,
    pub source: String,
    pub priority: Priority,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertRouted {
    pub alert_id: AlertId,
    pub rule_id: RoutingRuleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSuppressed {
    pub alert_id: AlertId,
    pub rule_id: RoutingRuleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertAcknowledged {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertClosed {
    pub alert_id: AlertId,
    pub closed_by: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSnoozed {
    pub alert_id: AlertId,
    pub until: DateTime<Utc>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEscalated {
    pub alert_id: AlertId,
    pub level: i32,
    pub cycle: u32,
    pub recipients: Vec<UserId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationExhausted {
    pub alert_id: AlertId,
    pub policy_id: PolicyId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationSent {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub channel: Channel,
    pub external_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationFailed {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub channel: Channel,
    pub error: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationSuppressed {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnCallChanged {
    pub schedule_id: ScheduleId,
    pub new_user: Option<UserId>,
    pub previous_user: Option<UserId>,
    pub occurred_at: DateTime<Utc>,
}
