//! Device workers
//!
//! A worker is the control loop driving one device. The coordinator treats
//! it as opaque: it only constructs it through a [`WorkerFactory`], runs it
//! on its own task, and asks it to stop.

pub mod lifecycle;
pub mod probe;

use std::fmt;
use std::sync::Arc;

use crate::relay::RelayChannel;
use crate::types::Result;

pub use lifecycle::{WorkerHandle, WorkerLauncher};
pub use probe::{ProbeSettings, ProbeWorker, ProbeWorkerFactory};

/// Operating mode requested for a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMode {
    /// Full automation
    Normal,
    /// Reduced automation for paused or unconfigured devices
    Paused,
}

impl fmt::Display for WorkerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Paused => f.write_str("paused"),
        }
    }
}

/// Control loop of one device
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    fn origin(&self) -> &str;

    /// Drive the device until the loop ends on its own or a stop is requested
    async fn run(&self);

    /// Ask the loop to exit at its next opportunity
    fn request_stop(&self);
}

/// Builds workers bound to a device channel
#[async_trait::async_trait]
pub trait WorkerFactory: Send + Sync {
    /// Returns None when no valid worker can be built for `origin`
    async fn create_worker(
        &self,
        origin: &str,
        mode: WorkerMode,
        channel: Arc<RelayChannel>,
    ) -> Result<Option<Arc<dyn Worker>>>;
}
