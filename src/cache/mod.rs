//! Shared-state cache for Relaygate
//!
//! Account pointers, encounter counters and player stats are shadowed in a
//! key/value + hash cache shared by every coordinator process.
//!
//! ## Implementations
//!
//! - [`RedisCache`]: the real backing service
//! - [`NoopCache`]: reads report absent, writes are accepted and discarded
//! - [`MemoryCache`]: in-process map, for tests and single-process setups
//!
//! [`CacheContext`] binds a handle to the running process and decides which
//! implementation a caller gets.

pub mod context;
pub mod keys;
pub mod memory;
pub mod noop;
pub mod redis;

pub use context::{CacheConnector, CacheContext, RedisConnector};
pub use keys::{AccountPointer, CacheKey};
pub use memory::MemoryCache;
pub use noop::NoopCache;
pub use self::redis::RedisCache;

use crate::types::Result;

/// Capability set every cache handle provides
#[async_trait::async_trait]
pub trait CacheHandle: Send + Sync {
    /// Read a scalar value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a scalar value
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically add `by` to an integer value (absent counts as 0).
    ///
    /// Returns the new value, or None when the handle discards writes.
    async fn incr(&self, key: &str, by: i64) -> Result<Option<i64>>;

    /// Write several scalar values in one batched round trip
    async fn set_many(&self, entries: &[(String, String)]) -> Result<()>;

    /// Read one field of a hash
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Write several fields of a hash
    async fn hset_many(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// Liveness probe
    async fn ping(&self) -> Result<()>;

    /// Whether writes to this handle are retained
    fn retains_writes(&self) -> bool {
        true
    }
}
