pub mod priority;
pub mod source;
pub mod status;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::escalation::EscalationCursor;
use crate::events::{
    AlertAcknowledged, AlertClosed, AlertCreated, AlertSnoozed, DomainEvent,
};
use crate::ids::{AlertId, OrganizationId, PolicyId, RoutingRuleId, TeamId, UserId};

pub use priority::Priority;
pub use source::Source;
pub use status::Status;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnoozeWindow {
    pub from: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    id: AlertId,
    organization_id: OrganizationId,
    source: Source,
    title: String,
    message: String,
    priority: Priority,
    status: Status,
    tags: Vec<String>,
    custom_fields: BTreeMap<String, String>,
    team_id: Option<TeamId>,
    assigned_user_id: Option<UserId>,
    escalation_policy_id: Option<PolicyId>,
    escalation_level: i32,
    escalation_cycle: u32,
    last_escalated_at: Option<DateTime<Utc>>,
    escalation_exhausted: bool,
    snooze: Option<SnoozeWindow>,
    suppressed: bool,
    routing_rule_id: Option<RoutingRuleId>,
    created_at: DateTime<Utc>,
    acknowledged_at: Option<DateTime<Utc>>,
    acknowledged_by: Option<UserId>,
    closed_at: Option<DateTime<Utc>>,
}

impl Alert {
    pub fn new(
        organization_id: OrganizationId,
        source: Source,
        title: String,
        message: String,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> (Self, Vec<DomainEvent>) {
        let id = AlertId::new();
        let alert = Self {
            id: id.clone(),
            organization_id,
            source: source.clone(),
            title,
            message,
            priority,
            status: Status::Open,
            tags: vec![],
            custom_fields: BTreeMap::new(),
            team_id: None,
            assigned_user_id: None,
            escalation_policy_id: None,
            escalation_level: -1,
            escalation_cycle: 0,
            last_escalated_at: None,
            escalation_exhausted: false,
            snooze: None,
            suppressed: false,
            routing_rule_id: None,
            created_at: now,
            acknowledged_at: None,
            acknowledged_by: None,
            closed_at: None,
        };
        let events = vec![DomainEvent::AlertCreated(AlertCreated {
            alert_id: id,
            source: source.as_str().to_string(),
            priority,
            occurred_at: now,
        })];
        (alert, events)
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.add_tags(&tags);
        self
    }

    pub fn with_custom_fields(mut self, fields: BTreeMap<String, String>) -> Self {
        self.custom_fields = fields;
        self
    }

    /// Enroll in an escalation policy, starting before its first rule.
    pub fn enroll(&mut self, policy_id: PolicyId) {
        self.escalation_policy_id = Some(policy_id);
        self.escalation_level = -1;
        self.escalation_cycle = 0;
        self.last_escalated_at = None;
        self.escalation_exhausted = false;
    }

    pub fn assign_team(&mut self, team_id: TeamId) {
        self.team_id = Some(team_id);
    }

    pub fn assign_user(&mut self, user_id: UserId) {
        self.assigned_user_id = Some(user_id);
    }

    pub fn set_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn add_tags(&mut self, tags: &[String]) {
        for tag in tags {
            if !self.tags.contains(tag) {
                self.tags.push(tag.clone());
            }
        }
    }

    pub fn mark_routed(&mut self, rule_id: RoutingRuleId) {
        self.routing_rule_id = Some(rule_id);
    }

    /// Terminal: a suppressed alert is closed and never escalates.
    pub fn suppress(&mut self, rule_id: RoutingRuleId, now: DateTime<Utc>) {
        self.routing_rule_id = Some(rule_id);
        self.suppressed = true;
        self.status = Status::Closed;
        self.closed_at = Some(now);
    }

    pub fn acknowledge(
        &mut self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        match self.status {
            Status::Closed => Err(DomainError::AlertAlreadyClosed),
            Status::Acknowledged => Ok(vec![]),
            Status::Open | Status::Snoozed => {
                self.status = Status::Acknowledged;
                self.snooze = None;
                self.acknowledged_at = Some(now);
                self.acknowledged_by = Some(user_id.clone());
                Ok(vec![DomainEvent::AlertAcknowledged(AlertAcknowledged {
                    alert_id: self.id.clone(),
                    user_id,
                    occurred_at: now,
                })])
            }
        }
    }

    pub fn close(
        &mut self,
        closed_by: String,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        match self.status {
            Status::Closed => Ok(vec![]),
            Status::Open | Status::Acknowledged | Status::Snoozed => {
                self.status = Status::Closed;
                self.snooze = None;
                self.closed_at = Some(now);
                Ok(vec![DomainEvent::AlertClosed(AlertClosed {
                    alert_id: self.id.clone(),
                    closed_by,
                    occurred_at: now,
                })])
            }
        }
    }

    /// Pause escalation until `until`. Level and timestamps are left alone.
    pub fn snooze(
        &mut self,
        until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<DomainEvent>, DomainError> {
        if until <= now {
            return Err(DomainError::InvalidSnoozePeriod);
        }
        match self.status {
            Status::Closed => Err(DomainError::AlertAlreadyClosed),
            Status::Acknowledged => Err(DomainError::AlertNotOpen),
            Status::Open | Status::Snoozed => {
                self.status = Status::Snoozed;
                self.snooze = Some(SnoozeWindow { from: now, until });
                Ok(vec![DomainEvent::AlertSnoozed(AlertSnoozed {
                    alert_id: self.id.clone(),
                    until,
                    occurred_at: now,
                })])
            }
        }
    }

    pub fn is_snoozed_at(&self, now: DateTime<Utc>) -> bool {
        self.status == Status::Snoozed && self.snooze.as_ref().is_some_and(|s| s.until > now)
    }

    /// Open (or past its snooze), enrolled, and not yet exhausted.
    pub fn is_escalatable(&self, now: DateTime<Utc>) -> bool {
        let open = match self.status {
            Status::Open => true,
            Status::Snoozed => !self.is_snoozed_at(now),
            Status::Acknowledged | Status::Closed => false,
        };
        open && self.escalation_policy_id.is_some()
            && !self.escalation_exhausted
            && !self.suppressed
    }

    pub fn escalation_cursor(&self) -> EscalationCursor {
        EscalationCursor {
            level: self.escalation_level,
            cycle: self.escalation_cycle,
        }
    }

    /// Record that the rule at `next.level` has been processed. An expired
    /// snooze is cleared and the alert is open again.
    pub fn record_escalation(&mut self, next: EscalationCursor, now: DateTime<Utc>) {
        self.escalation_level = next.level;
        self.escalation_cycle = next.cycle;
        self.last_escalated_at = Some(now);
        if self.status == Status::Snoozed {
            self.status = Status::Open;
        }
        self.snooze = None;
    }

    pub fn mark_escalation_exhausted(&mut self) {
        self.escalation_exhausted = true;
    }

    pub fn id(&self) -> &AlertId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn custom_fields(&self) -> &BTreeMap<String, String> {
        &self.custom_fields
    }

    pub fn team_id(&self) -> Option<&TeamId> {
        self.team_id.as_ref()
    }

    pub fn assigned_user_id(&self) -> Option<&UserId> {
        self.assigned_user_id.as_ref()
    }

    pub fn escalation_policy_id(&self) -> Option<&PolicyId> {
        self.escalation_policy_id.as_ref()
    }

    pub fn escalation_level(&self) -> i32 {
        self.escalation_level
    }

    pub fn last_escalated_at(&self) -> Option<DateTime<Utc>> {
        self.last_escalated_at
    }

    pub fn is_escalation_exhausted(&self) -> bool {
        self.escalation_exhausted
    }

    pub fn snooze_window(&self) -> Option<&SnoozeWindow> {
        self.snooze.as_ref()
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn routing_rule_id(&self) -> Option<&RoutingRuleId> {
        self.routing_rule_id.as_ref()
    }

    pub fn acknowledged_by(&self) -> Option<&UserId> {
        self.acknowledged_by.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.closed_at
    }
}
