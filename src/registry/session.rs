//! Device sessions tracked by the registry

use std::fmt;
use std::sync::Arc;

use crate::relay::RelayChannel;
use crate::worker::WorkerHandle;

/// Lifecycle state of a device session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Registering,
    Running,
    Stopping,
    Removed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Registering => "registering",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Removed => "removed",
        };
        f.write_str(name)
    }
}

/// One connected device: its channel and the worker driving it
pub struct DeviceSession {
    pub origin: String,
    pub endpoint: String,
    pub channel: Arc<RelayChannel>,
    pub worker: WorkerHandle,
    pub state: SessionState,
}

impl DeviceSession {
    pub fn new(origin: &str, channel: Arc<RelayChannel>, worker: WorkerHandle) -> Self {
        Self {
            origin: origin.to_string(),
            endpoint: channel.endpoint().to_string(),
            channel,
            worker,
            state: SessionState::Registering,
        }
    }

    /// Start the worker and mark the session running
    pub fn start(&mut self) {
        self.worker.start();
        self.state = SessionState::Running;
    }

    pub fn is_alive(&self) -> bool {
        self.worker.is_alive()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            origin: self.origin.clone(),
            endpoint: self.endpoint.clone(),
            state: self.state,
            alive: self.is_alive(),
            channel: Arc::clone(&self.channel),
        }
    }
}

/// Snapshot of a session handed out by the registry
#[derive(Clone)]
pub struct SessionInfo {
    pub origin: String,
    pub endpoint: String,
    pub state: SessionState,
    pub alive: bool,
    pub channel: Arc<RelayChannel>,
}

impl fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInfo")
            .field("origin", &self.origin)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .field("alive", &self.alive)
            .finish()
    }
}
