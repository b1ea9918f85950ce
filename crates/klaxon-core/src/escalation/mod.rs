pub mod progress;
pub mod rule;
pub mod target;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::ids::{OrganizationId, PolicyId};

pub use progress::{due_at, Due, EscalationCursor, NextStep, SnoozeResume};
pub use rule::EscalationRule;
pub use target::{EscalationTarget, NotificationOverride, TargetKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationPolicy {
    id: PolicyId,
    organization_id: OrganizationId,
    name: String,
    repeat_enabled: bool,
    repeat_count: Option<u32>,
    rules: Vec<EscalationRule>,
}

impl EscalationPolicy {
    /// Rules are kept sorted by position; positions must be unique.
    pub fn new(
        organization_id: OrganizationId,
        name: String,
        mut rules: Vec<EscalationRule>,
    ) -> Result<Self, DomainError> {
        if rules.is_empty() {
            return Err(DomainError::PolicyRequiresRule);
        }
        rules.sort_by_key(|r| r.position());
        if let Some(dup) = rules.windows(2).find(|w| w[0].position() == w[1].position()) {
            return Err(DomainError::DuplicateRulePosition(dup[0].position()));
        }
        Ok(Self {
            id: PolicyId::new(),
            organization_id,
            name,
            repeat_enabled: false,
            repeat_count: None,
            rules,
        })
    }

    /// Enable repeating. `None` repeats until a human acts.
    pub fn with_repeat(mut self, repeat_count: Option<u32>) -> Self {
        self.repeat_enabled = true;
        self.repeat_count = repeat_count;
        self
    }

    pub fn disable_repeat(&mut self) {
        self.repeat_enabled = false;
    }

    pub fn add_rule(&mut self, rule: EscalationRule) -> Result<(), DomainError> {
        if self.rules.iter().any(|r| r.position() == rule.position()) {
            return Err(DomainError::DuplicateRulePosition(rule.position()));
        }
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.position());
        Ok(())
    }

    pub fn next_step(&self, cursor: EscalationCursor) -> NextStep<'_> {
        let next = cursor.level + 1;
        if let Some(rule) = usize::try_from(next).ok().and_then(|i| self.rules.get(i)) {
            return NextStep::Notify {
                rule,
                cursor: EscalationCursor {
                    level: next,
                    cycle: cursor.cycle,
                },
            };
        }
        match self.rules.first() {
            Some(rule) if self.can_repeat(cursor.cycle) => NextStep::Notify {
                rule,
                cursor: EscalationCursor {
                    level: 0,
                    cycle: cursor.cycle + 1,
                },
            },
            _ => NextStep::Exhausted,
        }
    }

    fn can_repeat(&self, completed_cycles: u32) -> bool {
        self.repeat_enabled && self.repeat_count.map_or(true, |max| completed_cycles < max)
    }

    pub fn rule(&self, index: usize) -> Option<&EscalationRule> {
        self.rules.get(index)
    }

    pub fn id(&self) -> &PolicyId {
        &self.id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[EscalationRule] {
        &self.rules
    }

    pub fn repeat_enabled(&self) -> bool {
        self.repeat_enabled
    }

    pub fn repeat_count(&self) -> Option<u32> {
        self.repeat_count
    }
}
