//! In-process cache handle
//!
//! Same semantics as the Redis handle for the commands Relaygate uses,
//! without crossing a process boundary.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::CacheHandle;
use crate::types::{GateError, Result};

#[derive(Default)]
struct MemoryState {
    scalars: HashMap<String, String>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// In-memory cache for tests and single-process deployments
#[derive(Clone, Default)]
pub struct MemoryCache {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held, scalars and hashes alike
    pub async fn len(&self) -> usize {
        let state = self.state.read().await;
        state.scalars.len() + state.hashes.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait::async_trait]
impl CacheHandle for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.state.read().await.scalars.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.state
            .write()
            .await
            .scalars
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn incr(&self, key: &str, by: i64) -> Result<Option<i64>> {
        let mut state = self.state.write().await;
        let current = match state.scalars.get(key) {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                GateError::Cache(format!("value at {} is not an integer", key))
            })?,
            None => 0,
        };
        let next = current + by;
        state.scalars.insert(key.to_string(), next.to_string());
        Ok(Some(next))
    }

    async fn set_many(&self, entries: &[(String, String)]) -> Result<()> {
        let mut state = self.state.write().await;
        for (key, value) in entries {
            state.scalars.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .read()
            .await
            .hashes
            .get(key)
            .and_then(|fields| fields.get(field))
            .cloned())
    }

    async fn hset_many(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut state = self.state.write().await;
        let hash = state.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
