use klaxon_core::error::DomainError;
use klaxon_core::ids::{AlertId, PolicyId, ScheduleId, TeamId};
use klaxon_ports::error::PortError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("port error: {0}")]
    Port(#[from] PortError),
    #[error("alert not found: {0}")]
    AlertNotFound(AlertId),
    #[error("schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),
    #[error("escalation policy not found: {0}")]
    PolicyNotFound(PolicyId),
    #[error("team not found: {0}")]
    TeamNotFound(TeamId),
    #[error("alert {0} kept changing underneath the update")]
    ConcurrentUpdate(AlertId),
    #[error("all {attempted} deliveries failed")]
    DeliveryFailed { attempted: usize },
    #[error("timed out")]
    Timeout,
}
