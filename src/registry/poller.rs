//! Relay poller
//!
//! Background task that asks the relay for its device set on a fixed
//! interval and reconciles the registry against it. A failed poll is logged
//! and retried on the next tick without touching the registry.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::{ConnectionRegistry, ReconcileReport};
use crate::relay::RelayClient;
use crate::types::Result;

pub struct RelayPoller {
    relay: RelayClient,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
}

impl RelayPoller {
    pub fn new(relay: RelayClient, registry: Arc<ConnectionRegistry>, interval: Duration) -> Self {
        Self {
            relay,
            registry,
            interval,
        }
    }

    /// Poll once and reconcile
    pub async fn tick(&self) -> Result<ReconcileReport> {
        let devices = self.relay.list_devices().await?;
        Ok(self.registry.reconcile(&devices).await)
    }

    /// Run the poll loop on its own task
    pub fn spawn(self) -> PollerHandle {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let registry = Arc::clone(&self.registry);
        info!(
            "Starting relay poller for {} (interval: {:?})",
            self.relay.base_url(),
            self.interval
        );
        let task = tokio::spawn(self.run(shutdown_rx));
        PollerHandle {
            shutdown,
            task,
            registry,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }
            if *shutdown.borrow() {
                break;
            }

            match self.tick().await {
                Ok(report) if !report.is_empty() => debug!(
                    reaped = ?report.reaped,
                    created = ?report.created,
                    skipped = ?report.skipped,
                    "Reconciled relay devices"
                ),
                Ok(_) => {}
                Err(e) => error!("Polling for connected relay devices failed: {}", e),
            }
        }
        debug!("Relay poller exited");
    }
}

/// Owner of the running poll loop
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
    registry: Arc<ConnectionRegistry>,
}

impl PollerHandle {
    /// Stop polling, then stop and join every device worker
    pub async fn shutdown(self) {
        info!("Stopping relay poller");
        self.shutdown.send_replace(true);
        if let Err(e) = self.task.await {
            error!("Relay poller task failed: {}", e);
        }
        self.registry.stop_all().await;
        info!("Connection registry stopped");
    }
}
