use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::target::EscalationTarget;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRule {
    position: u32,
    delay_minutes: u32,
    targets: Vec<EscalationTarget>,
}

impl EscalationRule {
    pub fn new(
        position: u32,
        delay_minutes: u32,
        targets: Vec<EscalationTarget>,
    ) -> Result<Self, DomainError> {
        if targets.is_empty() {
            return Err(DomainError::RuleRequiresTarget);
        }
        Ok(Self {
            position,
            delay_minutes,
            targets,
        })
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn delay_minutes(&self) -> u32 {
        self.delay_minutes
    }

    /// Time to wait after the previous level before this rule fires.
    pub fn delay(&self) -> Duration {
        Duration::minutes(i64::from(self.delay_minutes))
    }

    pub fn targets(&self) -> &[EscalationTarget] {
        &self.targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::UserId;

    #[test]
    fn rule_requires_target() {
        let result = EscalationRule::new(0, 5, vec![]);
        assert_eq!(result, Err(DomainError::RuleRequiresTarget));
    }

    #[test]
    fn delay_is_in_minutes() {
        let rule = EscalationRule::new(1, 15, vec![EscalationTarget::user(UserId::new())]).unwrap();
        assert_eq!(rule.position(), 1);
        assert_eq!(rule.delay(), Duration::minutes(15));
    }
}
