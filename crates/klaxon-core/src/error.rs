use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("alert is already closed")]
    AlertAlreadyClosed,
    #[error("alert is not open")]
    AlertNotOpen,
    #[error("snooze must end in the future")]
    InvalidSnoozePeriod,
    #[error("invalid override period")]
    InvalidOverridePeriod,
    #[error("invalid dnd override period")]
    InvalidDndPeriod,
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("rotation length must be between one day and ten years")]
    InvalidRotationLength,
    #[error("handoff day is only meaningful for weekly rotations")]
    HandoffDayRequiresWeekly,
    #[error("rotation not found: {0}")]
    RotationNotFound(String),
    #[error("participant list must contain each rotation member exactly once")]
    ParticipantMismatch,
    #[error("policy requires at least one rule")]
    PolicyRequiresRule,
    #[error("rule requires at least one target")]
    RuleRequiresTarget,
    #[error("duplicate rule position: {0}")]
    DuplicateRulePosition(u32),
    #[error("team requires at least one member")]
    TeamRequiresMember,
    #[error("invalid priority: {0}")]
    InvalidPriority(String),
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
