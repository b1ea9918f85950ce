//! Domain model for the klaxon escalation engine.
//!
//! Everything here is pure: on-call resolution, routing, quiet hours and the
//! escalation state machine take their inputs by reference and return
//! decisions. Storage, dispatch and time sources live behind `klaxon-ports`.

pub mod alert;
pub mod channel;
pub mod error;
pub mod escalation;
pub mod events;
pub mod ids;
pub mod organization;
pub mod routing;
pub mod schedule;
pub mod tz;
pub mod user;

pub use error::DomainError;
