use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::TickReport;

/// One pass over every alert that may be due. Per-alert failures are part
/// of the report, never an error of the pass itself.
#[async_trait]
pub trait EscalationProcessor: Send + Sync {
    async fn process_pending_escalations(&self, now: DateTime<Utc>) -> TickReport;
}
