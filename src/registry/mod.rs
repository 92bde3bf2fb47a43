//! Connection registry
//!
//! Tracks one [`DeviceSession`] per connected origin. The poller feeds it
//! the relay's current device set; [`ConnectionRegistry::reconcile`] reaps
//! sessions whose worker has exited and starts sessions for new origins.
//!
//! Origins that disappear from the relay are left alone. Their channel
//! eventually reports `ConnectionClosed`, the worker exits, and the next
//! reconcile reaps the session.
//!
//! All access goes through a single mutex.

pub mod poller;
pub mod session;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bson::Bson;
use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::db::DeviceSettings;
use crate::worker::{WorkerLauncher, WorkerMode};
use crate::types::Result;

pub use poller::{PollerHandle, RelayPoller};
pub use session::{DeviceSession, SessionInfo, SessionState};

/// Device setting toggled by the job helpers
const JOB_SETTING: &str = "job";

/// Outcome of one reconcile pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sessions dropped because their worker had exited
    pub reaped: Vec<String>,
    /// Sessions created and started
    pub created: Vec<String>,
    /// New origins that could not be started
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.reaped.is_empty() && self.created.is_empty() && self.skipped.is_empty()
    }
}

pub struct ConnectionRegistry {
    sessions: Mutex<HashMap<String, DeviceSession>>,
    launcher: WorkerLauncher,
    devices: Arc<dyn DeviceSettings>,
    enable_configmode: bool,
}

impl ConnectionRegistry {
    /// `enable_configmode` starts every worker in paused mode
    pub fn new(
        launcher: WorkerLauncher,
        devices: Arc<dyn DeviceSettings>,
        enable_configmode: bool,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            launcher,
            devices,
            enable_configmode,
        }
    }

    /// Bring the registry in line with the relay's device set
    pub async fn reconcile(&self, polled: &HashSet<String>) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let mut sessions = self.sessions.lock().await;

        let dead: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| !session.is_alive())
            .map(|(origin, _)| origin.clone())
            .collect();
        for origin in dead {
            if let Some(mut session) = sessions.remove(&origin) {
                session.state = SessionState::Removed;
                info!(origin = %origin, "Forgetting relay connection because of dead worker");
            }
            report.reaped.push(origin);
        }

        let mut new_origins: Vec<&String> = polled
            .iter()
            .filter(|origin| !sessions.contains_key(*origin))
            .collect();
        new_origins.sort();

        for origin in new_origins {
            match self.open_session(origin).await {
                Ok(Some(mut session)) => {
                    info!(origin = %origin, "Found new relay connection, starting worker");
                    session.start();
                    sessions.insert(origin.clone(), session);
                    report.created.push(origin.clone());
                }
                Ok(None) => report.skipped.push(origin.clone()),
                Err(e) => {
                    warn!(origin = %origin, "Failed to set up device session: {}", e);
                    report.skipped.push(origin.clone());
                }
            }
        }

        report.reaped.sort();
        report
    }

    async fn open_session(&self, origin: &str) -> Result<Option<DeviceSession>> {
        let Some(device) = self.devices.find_device(origin).await? else {
            warn!(origin = %origin, "Ignoring connection from unknown device");
            return Ok(None);
        };

        let mode = if self.enable_configmode {
            WorkerMode::Paused
        } else if !device.active {
            warn!(origin = %origin, "Device is paused. Unpause it to begin working");
            WorkerMode::Paused
        } else {
            WorkerMode::Normal
        };

        match self.launcher.create_worker_session(origin, mode).await? {
            Some((channel, worker)) => Ok(Some(DeviceSession::new(origin, channel, worker))),
            None => {
                warn!(origin = %origin, "No worker created, invalid worker configuration?");
                Ok(None)
            }
        }
    }

    /// Drop the session for `origin`, asking its worker to stop.
    ///
    /// Returns false when no session existed.
    pub async fn remove(&self, origin: &str) -> bool {
        let removed = self.sessions.lock().await.remove(origin);
        match removed {
            Some(mut session) => {
                session.state = SessionState::Removed;
                session.worker.request_stop();
                info!(origin = %origin, "Removed device session");
                true
            }
            None => false,
        }
    }

    pub async fn list_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        origins.sort();
        origins
    }

    pub async fn get_session(&self, origin: &str) -> Option<SessionInfo> {
        self.sessions.lock().await.get(origin).map(|s| s.info())
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Mark the device's job as active
    pub async fn set_job_activated(&self, origin: &str) -> Result<bool> {
        self.devices
            .set_device_setting(origin, JOB_SETTING, Bson::Boolean(true))
            .await
    }

    /// Mark the device's job as inactive
    pub async fn set_job_deactivated(&self, origin: &str) -> Result<bool> {
        self.devices
            .set_device_setting(origin, JOB_SETTING, Bson::Boolean(false))
            .await
    }

    /// Stop and join every remaining worker
    pub async fn stop_all(&self) {
        let drained: Vec<DeviceSession> = {
            let mut sessions = self.sessions.lock().await;
            sessions.drain().map(|(_, session)| session).collect()
        };
        if drained.is_empty() {
            return;
        }

        info!("Stopping {} device workers", drained.len());
        join_all(drained.into_iter().map(|mut session| async move {
            session.state = SessionState::Stopping;
            debug!(origin = %session.origin, "Stopping worker");
            session.worker.stop().await;
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DeviceConfig;
    use crate::relay::{RelayChannel, RelayClient};
    use crate::worker::{Worker, WorkerFactory};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::Notify;

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

    #[derive(Default)]
    struct RecordingFactory {
        modes: StdMutex<Vec<(String, WorkerMode)>>,
    }

    #[async_trait::async_trait]
    impl WorkerFactory for RecordingFactory {
        async fn create_worker(
            &self,
            origin: &str,
            mode: WorkerMode,
            _channel: Arc<RelayChannel>,
        ) -> Result<Option<Arc<dyn Worker>>> {
            self.modes.lock().unwrap().push((origin.to_string(), mode));
            Ok(Some(Arc::new(IdleWorker {
                origin: origin.to_string(),
                stop: Notify::new(),
            })))
        }
    }

    #[derive(Default)]
    struct Devices {
        paused: Vec<String>,
        settings: StdMutex<Vec<(String, String, Bson)>>,
    }

    #[async_trait::async_trait]
    impl DeviceSettings for Devices {
        async fn find_device(&self, origin: &str) -> Result<Option<DeviceConfig>> {
            if origin.starts_with("unknown") {
                return Ok(None);
            }
            Ok(Some(DeviceConfig {
                origin: origin.to_string(),
                active: !self.paused.iter().any(|p| p == origin),
            }))
        }

        async fn set_device_setting(&self, origin: &str, key: &str, value: Bson) -> Result<bool> {
            self.settings
                .lock()
                .unwrap()
                .push((origin.to_string(), key.to_string(), value));
            Ok(true)
        }
    }

    fn registry(
        factory: Arc<RecordingFactory>,
        devices: Arc<Devices>,
        configmode: bool,
    ) -> ConnectionRegistry {
        let relay = RelayClient::new("http://relay:8090", Duration::from_secs(1)).unwrap();
        let launcher = WorkerLauncher::new(relay, factory, Duration::from_secs(1));
        ConnectionRegistry::new(launcher, devices, configmode)
    }

    fn set(origins: &[&str]) -> HashSet<String> {
        origins.iter().map(|o| o.to_string()).collect()
    }

    #[tokio::test]
    async fn test_unknown_device_is_skipped() {
        let reg = registry(Default::default(), Default::default(), false);
        let report = reg.reconcile(&set(&["atv01", "unknown1"])).await;
        assert_eq!(report.created, vec!["atv01"]);
        assert_eq!(report.skipped, vec!["unknown1"]);
        assert_eq!(reg.list_origins().await, vec!["atv01"]);
        reg.stop_all().await;
    }

    #[tokio::test]
    async fn test_paused_device_starts_in_paused_mode() {
        let factory = Arc::new(RecordingFactory::default());
        let devices = Arc::new(Devices {
            paused: vec!["atv02".into()],
            ..Default::default()
        });
        let reg = registry(factory.clone(), devices, false);

        reg.reconcile(&set(&["atv01", "atv02"])).await;
        let modes = factory.modes.lock().unwrap().clone();
        assert_eq!(
            modes,
            vec![
                ("atv01".to_string(), WorkerMode::Normal),
                ("atv02".to_string(), WorkerMode::Paused),
            ]
        );
        reg.stop_all().await;
    }

    #[tokio::test]
    async fn test_configmode_pauses_everything() {
        let factory = Arc::new(RecordingFactory::default());
        let reg = registry(factory.clone(), Default::default(), true);

        reg.reconcile(&set(&["atv01"])).await;
        assert_eq!(factory.modes.lock().unwrap()[0].1, WorkerMode::Paused);
        reg.stop_all().await;
    }

    #[tokio::test]
    async fn test_tracked_origin_is_not_recreated() {
        let factory = Arc::new(RecordingFactory::default());
        let reg = registry(factory.clone(), Default::default(), false);

        reg.reconcile(&set(&["atv01"])).await;
        let report = reg.reconcile(&set(&["atv01"])).await;
        assert!(report.is_empty());
        // Gone from the relay, still tracked while its worker lives
        let report = reg.reconcile(&set(&[])).await;
        assert!(report.is_empty());
        assert_eq!(reg.len().await, 1);
        assert_eq!(factory.modes.lock().unwrap().len(), 1);
        reg.stop_all().await;
    }

    #[tokio::test]
    async fn test_session_info_and_remove() {
        let reg = registry(Default::default(), Default::default(), false);
        reg.reconcile(&set(&["atv01"])).await;

        let info = reg.get_session("atv01").await.unwrap();
        assert_eq!(info.endpoint, "http://relay:8090/devices/atv01/rgc");
        assert_eq!(info.state, SessionState::Running);
        assert_eq!(info.channel.origin(), "atv01");

        assert!(reg.remove("atv01").await);
        assert!(!reg.remove("atv01").await);
        assert!(reg.get_session("atv01").await.is_none());
        assert!(reg.is_empty().await);
    }

    #[tokio::test]
    async fn test_job_toggles_write_setting() {
        let devices = Arc::new(Devices::default());
        let reg = registry(Default::default(), devices.clone(), false);

        assert!(reg.set_job_activated("atv01").await.unwrap());
        assert!(reg.set_job_deactivated("atv01").await.unwrap());
        assert_eq!(
            devices.settings.lock().unwrap().clone(),
            vec![
                ("atv01".to_string(), "job".to_string(), Bson::Boolean(true)),
                ("atv01".to_string(), "job".to_string(), Bson::Boolean(false)),
            ]
        );
    }

    #[tokio::test]
    async fn test_stop_all_joins_workers() {
        let reg = registry(Default::default(), Default::default(), false);
        reg.reconcile(&set(&["atv01", "atv02", "atv03"])).await;
        assert_eq!(reg.len().await, 3);

        tokio::time::timeout(Duration::from_secs(1), reg.stop_all())
            .await
            .unwrap();
        assert!(reg.is_empty().await);
    }
}
