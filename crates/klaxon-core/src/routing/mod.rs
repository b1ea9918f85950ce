pub mod action;
pub mod condition;

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::error::DomainError;
use crate::ids::{OrganizationId, RoutingRuleId};

pub use action::RoutingActions;
pub use condition::{Condition, ConditionBlock, MatchMode, Operator};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRoutingRule {
    id: RoutingRuleId,
    organization_id: OrganizationId,
    name: String,
    priority: i32,
    conditions: ConditionBlock,
    actions: RoutingActions,
    enabled: bool,
}

impl AlertRoutingRule {
    /// Patterns are compiled here so a broken rule is refused on creation.
    pub fn new(
        organization_id: OrganizationId,
        name: String,
        priority: i32,
        conditions: ConditionBlock,
        actions: RoutingActions,
    ) -> Result<Self, DomainError> {
        conditions.validate()?;
        Ok(Self {
            id: RoutingRuleId::new(),
            organization_id,
            name,
            priority,
            conditions,
            actions,
            enabled: true,
        })
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn matches(&self, alert: &Alert) -> Result<bool, DomainError> {
        self.conditions.evaluate(alert)
    }

    pub fn id(&self) -> &RoutingRuleId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn conditions(&self) -> &ConditionBlock {
        &self.conditions
    }

    pub fn actions(&self) -> &RoutingActions {
        &self.actions
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRule {
    pub rule_id: RoutingRuleId,
    pub error: DomainError,
}

#[derive(Debug)]
pub struct RoutingDecision<'a> {
    pub matched: Option<&'a AlertRoutingRule>,
    pub skipped: Vec<SkippedRule>,
}

/// First enabled rule, in ascending priority order, whose conditions hold.
/// Rules that fail to evaluate are skipped and reported.
pub fn evaluate<'a>(rules: &'a [AlertRoutingRule], alert: &Alert) -> RoutingDecision<'a> {
    let mut ordered: Vec<&AlertRoutingRule> = rules.iter().filter(|r| r.is_enabled()).collect();
    ordered.sort_by_key(|r| r.priority());

    let mut skipped = Vec::new();
    for rule in ordered {
        match rule.matches(alert) {
            Ok(true) => {
                return RoutingDecision {
                    matched: Some(rule),
                    skipped,
                }
            }
            Ok(false) => {}
            Err(error) => skipped.push(SkippedRule {
                rule_id: rule.id().clone(),
                error,
            }),
        }
    }
    RoutingDecision {
        matched: None,
        skipped,
    }
}
