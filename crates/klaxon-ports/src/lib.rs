//! Contracts between the escalation engine and the world around it.

pub mod error;
pub mod inbound;
pub mod outbound;
pub mod types;

pub use error::{NotifyError, PortError};
