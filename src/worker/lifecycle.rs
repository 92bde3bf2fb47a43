//! Worker lifecycle
//!
//! Pairs a fresh relay channel with a worker and runs the worker on its own
//! tokio task. Liveness is whether that task is still executing.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::{Worker, WorkerFactory, WorkerMode};
use crate::relay::{RelayChannel, RelayClient};
use crate::types::Result;

/// Handle to one worker and the task running it
pub struct WorkerHandle {
    worker: Arc<dyn Worker>,
    task: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn new(worker: Arc<dyn Worker>) -> Self {
        Self { worker, task: None }
    }

    pub fn origin(&self) -> &str {
        self.worker.origin()
    }

    /// Spawn the worker's task; a second call is ignored
    pub fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let worker = Arc::clone(&self.worker);
        self.task = Some(tokio::spawn(async move {
            worker.run().await;
            debug!(origin = %worker.origin(), "Worker loop exited");
        }));
    }

    pub fn is_started(&self) -> bool {
        self.task.is_some()
    }

    /// Whether the worker's task is still executing
    pub fn is_alive(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Request cooperative termination without waiting
    pub fn request_stop(&self) {
        self.worker.request_stop();
    }

    /// Request termination and wait until the task has fully exited
    pub async fn stop(mut self) {
        self.worker.request_stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(origin = %self.worker.origin(), "Worker task failed: {}", e);
            }
        }
    }
}

/// Creates channel and worker pairs for newly connected devices
pub struct WorkerLauncher {
    relay: RelayClient,
    factory: Arc<dyn WorkerFactory>,
    command_timeout: Duration,
}

impl WorkerLauncher {
    pub fn new(relay: RelayClient, factory: Arc<dyn WorkerFactory>, command_timeout: Duration) -> Self {
        Self {
            relay,
            factory,
            command_timeout,
        }
    }

    /// Build a channel and an unstarted worker for `origin`.
    ///
    /// Returns None when the factory declines to build a worker.
    pub async fn create_worker_session(
        &self,
        origin: &str,
        mode: WorkerMode,
    ) -> Result<Option<(Arc<RelayChannel>, WorkerHandle)>> {
        let channel = self.relay.channel_for(origin, self.command_timeout);
        let Some(worker) = self
            .factory
            .create_worker(origin, mode, Arc::clone(&channel))
            .await?
        else {
            return Ok(None);
        };
        info!(origin = %origin, "Created {} worker", mode);
        Ok(Some((channel, WorkerHandle::new(worker))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Notify;

    /// Worker that idles until stopped
    struct IdleWorker {
        origin: String,
        stop: Notify,
    }

    #[async_trait::async_trait]
    impl Worker for IdleWorker {
        fn origin(&self) -> &str {
            &self.origin
        }

        async fn run(&self) {
            self.stop.notified().await;
        }

        fn request_stop(&self) {
            self.stop.notify_one();
        }
    }

    /// Worker whose loop ends immediately
    struct OneShotWorker;

    #[async_trait::async_trait]
    impl Worker for OneShotWorker {
        fn origin(&self) -> &str {
            "oneshot"
        }

        async fn run(&self) {}

        fn request_stop(&self) {}
    }

    struct Factory;

    #[async_trait::async_trait]
    impl WorkerFactory for Factory {
        async fn create_worker(
            &self,
            origin: &str,
            _mode: WorkerMode,
            _channel: Arc<RelayChannel>,
        ) -> Result<Option<Arc<dyn Worker>>> {
            if origin == "unknown" {
                return Ok(None);
            }
            Ok(Some(Arc::new(IdleWorker {
                origin: origin.to_string(),
                stop: Notify::new(),
            })))
        }
    }

    fn launcher() -> WorkerLauncher {
        let relay = RelayClient::new("http://relay:8090", Duration::from_secs(1)).unwrap();
        WorkerLauncher::new(relay, Arc::new(Factory), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_session_runs_until_stopped() {
        let (channel, mut handle) = launcher()
            .create_worker_session("atv01", WorkerMode::Normal)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(channel.endpoint(), "http://relay:8090/devices/atv01/rgc");
        assert!(!handle.is_alive());

        handle.start();
        tokio::task::yield_now().await;
        assert!(handle.is_alive());

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_factory_may_decline() {
        let session = launcher()
            .create_worker_session("unknown", WorkerMode::Paused)
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_finished_worker_is_not_alive() {
        let mut handle = WorkerHandle::new(Arc::new(OneShotWorker));
        handle.start();
        tokio::time::timeout(Duration::from_secs(1), async {
            while handle.is_alive() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(handle.is_started());
    }
}
