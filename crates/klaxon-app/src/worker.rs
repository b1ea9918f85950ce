use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use klaxon_ports::inbound::EscalationProcessor;
use klaxon_ports::types::TickReport;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub tick_interval: Duration,
    /// How long `stop` waits for an in-progress tick before aborting it.
    pub shutdown_grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(15),
        }
    }
}

/// Drives an [`EscalationProcessor`] on a fixed interval until stopped.
pub struct EscalationWorker<P> {
    processor: Arc<P>,
    config: WorkerConfig,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl<P> EscalationWorker<P>
where
    P: EscalationProcessor + 'static,
{
    pub fn new(processor: Arc<P>, config: WorkerConfig) -> Self {
        Self {
            processor,
            config,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Spawn the tick loop. Calling `start` on a running worker does nothing.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }

        let processor = Arc::clone(&self.processor);
        let cancel = self.cancel.clone();
        let period = self.config.tick_interval;

        info!(interval_secs = period.as_secs(), "escalation worker started");
        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("escalation worker received stop signal");
                        break;
                    }
                    _ = interval.tick() => {
                        processor.process_pending_escalations(Utc::now()).await;
                    }
                }
            }
        }));
    }

    /// Signal the loop to stop and wait for the current tick to finish, up
    /// to the configured grace period.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        let Some(mut handle) = self.handle.take() else {
            return;
        };
        match tokio::time::timeout(self.config.shutdown_grace, &mut handle).await {
            Ok(Ok(())) => info!("escalation worker stopped"),
            Ok(Err(e)) => warn!(error = %e, "escalation worker task failed"),
            Err(_) => {
                warn!(
                    grace_secs = self.config.shutdown_grace.as_secs(),
                    "escalation tick did not finish in time, aborting"
                );
                handle.abort();
            }
        }
    }

    /// Run a single pass outside the loop.
    pub async fn run_once(&self, now: DateTime<Utc>) -> TickReport {
        self.processor.process_pending_escalations(now).await
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<P> Drop for EscalationWorker<P> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
