use thiserror::Error;

/// Store failures. Missing records are `Ok(None)`, not errors.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("connection error: {0}")]
    Connection(String),
}

/// Why a dispatcher refused a notification. The engine logs every variant
/// as a failed delivery and moves on to the next channel.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel unavailable")]
    ChannelUnavailable,
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}
