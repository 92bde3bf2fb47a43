//! Probe worker
//!
//! Minimal worker shipped with the coordinator: it sends a fixed command to
//! its device on every tick and, in normal mode, rotates the device's
//! account once the encounter budget is spent. Exits when the relay reports
//! the device gone.
//!
//! A probe is not an encounter, so this worker never charges the budget.
//! Workers that drive game actions call
//! [`AccountAllocator::add_encounters`] for each encounter they make; until
//! one does, the rotation check here finds every account under the limit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{Worker, WorkerFactory, WorkerMode};
use crate::accounts::AccountAllocator;
use crate::db::DeviceSettings;
use crate::relay::RelayChannel;
use crate::types::Result;

/// Probe command and cadence
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub command: String,
    pub interval: Duration,
}

pub struct ProbeWorker {
    origin: String,
    mode: WorkerMode,
    channel: Arc<RelayChannel>,
    allocator: Arc<AccountAllocator>,
    settings: ProbeSettings,
    stop: watch::Sender<bool>,
}

impl ProbeWorker {
    pub fn new(
        mode: WorkerMode,
        channel: Arc<RelayChannel>,
        allocator: Arc<AccountAllocator>,
        settings: ProbeSettings,
    ) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            origin: channel.origin().to_string(),
            mode,
            channel,
            allocator,
            settings,
            stop,
        }
    }

    /// One probe round. Returns false once the device is gone.
    async fn probe(&self) -> bool {
        match self.channel.send_text(&self.settings.command).await {
            Ok(response) => {
                debug!(origin = %self.origin, "Probe answered: {:?}", response.as_text());
            }
            Err(e) if e.is_terminal() => {
                warn!(origin = %self.origin, "Device disconnected, stopping worker: {}", e);
                return false;
            }
            Err(e) if e.is_retryable() => {
                warn!(origin = %self.origin, "Probe timed out: {}", e);
            }
            Err(e) => {
                error!(origin = %self.origin, "Probe failed: {}", e);
            }
        }
        true
    }

    async fn rotate_if_exhausted(&self) -> Result<()> {
        if let Some(count) = self.allocator.account_at_encounter_limit(&self.origin).await? {
            info!(
                origin = %self.origin,
                "Account reached {} encounters, requesting a new one", count
            );
            self.allocator.get_new_account_for_device(&self.origin).await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Worker for ProbeWorker {
    fn origin(&self) -> &str {
        &self.origin
    }

    async fn run(&self) {
        let mut stop = self.stop.subscribe();
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(origin = %self.origin, "Worker started in {} mode", self.mode);
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => continue,
            }

            if !self.probe().await {
                break;
            }
            if self.mode == WorkerMode::Normal && self.allocator.is_enabled() {
                if let Err(e) = self.rotate_if_exhausted().await {
                    warn!(origin = %self.origin, "Account rotation failed: {}", e);
                }
            }
        }
        info!(origin = %self.origin, "Worker stopped");
    }

    fn request_stop(&self) {
        self.stop.send_replace(true);
    }
}

/// Builds [`ProbeWorker`]s for devices that still have a configuration
pub struct ProbeWorkerFactory {
    devices: Arc<dyn DeviceSettings>,
    allocator: Arc<AccountAllocator>,
    settings: ProbeSettings,
}

impl ProbeWorkerFactory {
    pub fn new(
        devices: Arc<dyn DeviceSettings>,
        allocator: Arc<AccountAllocator>,
        settings: ProbeSettings,
    ) -> Self {
        Self {
            devices,
            allocator,
            settings,
        }
    }
}

#[async_trait::async_trait]
impl WorkerFactory for ProbeWorkerFactory {
    async fn create_worker(
        &self,
        origin: &str,
        mode: WorkerMode,
        channel: Arc<RelayChannel>,
    ) -> Result<Option<Arc<dyn Worker>>> {
        if self.devices.find_device(origin).await?.is_none() {
            warn!(origin = %origin, "Device configuration vanished, not creating worker");
            return Ok(None);
        }
        Ok(Some(Arc::new(ProbeWorker::new(
            mode,
            channel,
            Arc::clone(&self.allocator),
            self.settings.clone(),
        ))))
    }
}
