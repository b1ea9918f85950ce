use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use klaxon_core::alert::{Alert, Priority};
use klaxon_core::channel::Channel;
use klaxon_core::ids::{AlertId, NotificationId, OrganizationId, PolicyId, UserId};

/// Alert data handed over by intake, before routing.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub organization_id: OrganizationId,
    pub source: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub custom_fields: BTreeMap<String, String>,
    /// Policy to enroll in when no routing rule assigns one.
    pub escalation_policy_id: Option<PolicyId>,
}

/// An alert as stored, with the revision its row had when it was read.
/// Every write bumps the revision.
#[derive(Debug, Clone)]
pub struct VersionedAlert {
    pub alert: Alert,
    pub revision: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub source: String,
    pub escalation_level: i32,
}

/// One message for one user over one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub channel: Channel,
    pub payload: NotificationPayload,
}

/// What the dispatcher reports back after accepting a notification.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReceipt {
    pub external_id: Option<String>,
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent,
    Failed,
    Suppressed,
    Skipped,
}

impl DeliveryOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Suppressed => "suppressed",
            Self::Skipped => "skipped",
        }
    }
}

/// Audit row for every notification the engine attempted or withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLogEntry {
    pub alert_id: AlertId,
    pub user_id: UserId,
    pub channel: Option<Channel>,
    pub escalation_level: i32,
    pub rule_position: u32,
    pub outcome: DeliveryOutcome,
    pub reason: Option<String>,
    pub external_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// What happened to one alert during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    Escalated {
        level: i32,
        cycle: u32,
        notified: usize,
        suppressed: usize,
        failed: usize,
        skipped: usize,
    },
    NotDue {
        due_at: DateTime<Utc>,
    },
    Exhausted,
    LostRace,
    InFlight,
    Failed(String),
    TimedOut,
}

impl AlertOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Escalated { .. } => "escalated",
            Self::NotDue { .. } => "not_due",
            Self::Exhausted => "exhausted",
            Self::LostRace => "lost_race",
            Self::InFlight => "in_flight",
            Self::Failed(_) => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<(AlertId, AlertOutcome)>,
}

impl TickReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            outcomes: vec![],
        }
    }

    pub fn outcome_for(&self, alert_id: &AlertId) -> Option<&AlertOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == alert_id)
            .map(|(_, outcome)| outcome)
    }

    pub fn escalated(&self) -> usize {
        self.count(|o| matches!(o, AlertOutcome::Escalated { .. }))
    }

    pub fn exhausted(&self) -> usize {
        self.count(|o| matches!(o, AlertOutcome::Exhausted))
    }

    pub fn errors(&self) -> usize {
        self.count(|o| matches!(o, AlertOutcome::Failed(_) | AlertOutcome::TimedOut))
    }

    fn count(&self, pred: impl Fn(&AlertOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} candidates, {} escalated, {} exhausted, {} errors",
            self.outcomes.len(),
            self.escalated(),
            self.exhausted(),
            self.errors()
        )
    }
}
