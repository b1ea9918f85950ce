//! Application services: alert intake, schedule management, and the
//! escalation engine with the worker that drives it.

pub mod alert_service;
pub mod error;
pub mod escalation_engine;
pub mod schedule_service;
pub mod worker;

#[cfg(test)]
mod testing;

pub use alert_service::AlertService;
pub use error::AppError;
pub use escalation_engine::{EngineConfig, EnginePorts, EscalationEngine};
pub use schedule_service::ScheduleService;
pub use worker::{EscalationWorker, WorkerConfig};
