//! Cache bootstrap
//!
//! A [`CacheContext`] is bound once per process at startup and passed down
//! to every component that needs the cache. It memoizes the live handle
//! produced by its [`CacheConnector`] (Redis in production) together with the id of the process that created it, so a handle
//! is never reused across a process boundary, and probes the memoized
//! handle before each reuse.
//!
//! Connection failures degrade to [`NoopCache`] unless the caller asks for
//! a required cache, in which case they surface as
//! [`GateError::CacheUnavailable`].

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use super::{CacheHandle, NoopCache, RedisCache};
use crate::config::CacheArgs;
use crate::types::{GateError, Result};

/// Establishes connections to a live cache backend.
///
/// Connection-establishment failures must be reported as
/// [`GateError::CacheUnavailable`]; any other error is passed to the caller.
#[async_trait::async_trait]
pub trait CacheConnector: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn CacheHandle>>;
}

/// Connects [`RedisCache`] handles from the configured endpoint
pub struct RedisConnector {
    args: CacheArgs,
}

impl RedisConnector {
    pub fn new(args: &CacheArgs) -> Self {
        Self { args: args.clone() }
    }
}

#[async_trait::async_trait]
impl CacheConnector for RedisConnector {
    async fn connect(&self) -> Result<Arc<dyn CacheHandle>> {
        let cache: Arc<dyn CacheHandle> = Arc::new(RedisCache::connect(&self.args).await?);
        Ok(cache)
    }
}

/// Memoized handle and the process that created it
struct BoundHandle {
    pid: u32,
    handle: Arc<dyn CacheHandle>,
}

enum CacheSource {
    /// Caching turned off by configuration
    Disabled,
    /// Live backend, connected lazily
    Live {
        connector: Box<dyn CacheConnector>,
        memo: Mutex<Option<BoundHandle>>,
    },
    /// Caller-supplied handle (in-process caches, tests)
    Fixed(Arc<dyn CacheHandle>),
}

/// Per-process cache context
pub struct CacheContext {
    source: CacheSource,
    noop: Arc<NoopCache>,
}

impl CacheContext {
    /// Bind a cache context to the current process
    pub fn bind(args: &CacheArgs) -> Self {
        if args.enable_cache {
            Self::with_connector(RedisConnector::new(args))
        } else {
            Self::disabled()
        }
    }

    /// Context backed by a live cache reached through `connector`
    pub fn with_connector(connector: impl CacheConnector + 'static) -> Self {
        Self {
            source: CacheSource::Live {
                connector: Box::new(connector),
                memo: Mutex::new(None),
            },
            noop: Arc::new(NoopCache),
        }
    }

    /// Context with caching disabled
    pub fn disabled() -> Self {
        Self {
            source: CacheSource::Disabled,
            noop: Arc::new(NoopCache),
        }
    }

    /// Context that always hands out the given handle
    pub fn fixed(handle: Arc<dyn CacheHandle>) -> Self {
        Self {
            source: CacheSource::Fixed(handle),
            noop: Arc::new(NoopCache),
        }
    }

    /// Whether caching is enabled at all
    pub fn is_enabled(&self) -> bool {
        !matches!(self.source, CacheSource::Disabled)
    }

    /// Get a cache handle.
    ///
    /// With `required = false` this never fails on connection problems; the
    /// no-op handle is returned instead.
    pub async fn get_cache(&self, required: bool) -> Result<Arc<dyn CacheHandle>> {
        match &self.source {
            CacheSource::Disabled => self.fallback(required, "cache is disabled"),
            CacheSource::Fixed(handle) => Ok(Arc::clone(handle)),
            CacheSource::Live { connector, memo } => {
                let pid = std::process::id();
                let mut memo = memo.lock().await;

                if let Some(bound) = memo.as_ref() {
                    if bound.pid == pid {
                        match bound.handle.ping().await {
                            Ok(()) => return Ok(Arc::clone(&bound.handle)),
                            Err(e) => warn!("Cache liveness probe failed, reconnecting: {}", e),
                        }
                    } else {
                        debug!(
                            "Cache handle was created by process {}, reconnecting for {}",
                            bound.pid, pid
                        );
                    }
                    *memo = None;
                }

                match connector.connect().await {
                    Ok(handle) => {
                        *memo = Some(BoundHandle {
                            pid,
                            handle: Arc::clone(&handle),
                        });
                        Ok(handle)
                    }
                    Err(GateError::CacheUnavailable(reason)) => {
                        error!("Unable to connect to cache ({}). Continuing without cache", reason);
                        self.fallback(required, &reason)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn fallback(&self, required: bool, reason: &str) -> Result<Arc<dyn CacheHandle>> {
        if required {
            return Err(GateError::CacheUnavailable(format!(
                "cache is required but unavailable: {}",
                reason
            )));
        }
        let noop: Arc<dyn CacheHandle> = self.noop.clone();
        Ok(noop)
    }
}
