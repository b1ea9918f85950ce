use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::{Alert, Priority};
use crate::events::{AlertRouted, AlertSuppressed, DomainEvent};
use crate::ids::{PolicyId, RoutingRuleId, TeamId, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingActions {
    pub assign_team_id: Option<TeamId>,
    pub assign_user_id: Option<UserId>,
    pub assign_escalation_policy_id: Option<PolicyId>,
    pub set_priority: Option<Priority>,
    #[serde(default)]
    pub add_tags: Vec<String>,
    #[serde(default)]
    pub suppress: bool,
}

impl RoutingActions {
    /// Apply every populated action in one step. Suppression wins over
    /// everything else and leaves the alert closed.
    pub fn apply(
        &self,
        alert: &mut Alert,
        rule_id: &RoutingRuleId,
        now: DateTime<Utc>,
    ) -> Vec<DomainEvent> {
        if self.suppress {
            alert.suppress(rule_id.clone(), now);
            return vec![DomainEvent::AlertSuppressed(AlertSuppressed {
                alert_id: alert.id().clone(),
                rule_id: rule_id.clone(),
                occurred_at: now,
            })];
        }

        if let Some(team_id) = &self.assign_team_id {
            alert.assign_team(team_id.clone());
        }
        if let Some(user_id) = &self.assign_user_id {
            alert.assign_user(user_id.clone());
        }
        if let Some(policy_id) = &self.assign_escalation_policy_id {
            alert.enroll(policy_id.clone());
        }
        if let Some(priority) = self.set_priority {
            alert.set_priority(priority);
        }
        alert.add_tags(&self.add_tags);
        alert.mark_routed(rule_id.clone());

        vec![DomainEvent::AlertRouted(AlertRouted {
            alert_id: alert.id().clone(),
            rule_id: rule_id.clone(),
            occurred_at: now,
        })]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{Source, Status};
    use crate::ids::OrganizationId;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-15T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn make_alert() -> Alert {
        let (alert, _) = Alert::new(
            OrganizationId::new(),
            Source::new("grafana"),
            "t".into(),
            "m".into(),
            Priority::P4,
            now(),
        );
        alert.with_tags(vec!["web".into()])
    }

    #[test]
    fn populated_fields_are_applied_together() {
        let team = TeamId::new();
        let policy = PolicyId::new();
        let actions = RoutingActions {
            assign_team_id: Some(team.clone()),
            assign_escalation_policy_id: Some(policy.clone()),
            set_priority: Some(Priority::P1),
            add_tags: vec!["web".into(), "routed".into()],
            ..Default::default()
        };
        let mut alert = make_alert();
        let rule_id = RoutingRuleId::new();
        let events = actions.apply(&mut alert, &rule_id, now());

        assert_eq!(alert.team_id(), Some(&team));
        assert_eq!(alert.escalation_policy_id(), Some(&policy));
        assert_eq!(alert.priority(), Priority::P1);
        assert_eq!(alert.tags(), ["web", "routed"]);
        assert_eq!(alert.routing_rule_id(), Some(&rule_id));
        assert_eq!(events[0].event_type(), "alert.routed");
    }

    #[test]
    fn suppress_skips_assignments() {
        let actions = RoutingActions {
            assign_team_id: Some(TeamId::new()),
            assign_escalation_policy_id: Some(PolicyId::new()),
            suppress: true,
            ..Default::default()
        };
        let mut alert = make_alert();
        let events = actions.apply(&mut alert, &RoutingRuleId::new(), now());

        assert!(alert.is_suppressed());
        assert_eq!(alert.status(), Status::Closed);
        assert!(alert.team_id().is_none());
        assert!(alert.escalation_policy_id().is_none());
        assert_eq!(events[0].event_type(), "alert.suppressed");
    }
}
