//! No-op cache handle
//!
//! Stands in for the real cache when caching is disabled or unreachable.

use super::CacheHandle;
use crate::types::Result;

/// Cache handle that remembers nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

#[async_trait::async_trait]
impl CacheHandle for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }

    async fn incr(&self, _key: &str, _by: i64) -> Result<Option<i64>> {
        Ok(None)
    }

    async fn set_many(&self, _entries: &[(String, String)]) -> Result<()> {
        Ok(())
    }

    async fn hget(&self, _key: &str, _field: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn hset_many(&self, _key: &str, _fields: &[(String, String)]) -> Result<()> {
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn retains_writes(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_writes_are_discarded() {
        let cache = NoopCache;
        assert_ok!(cache.set("k", "v").await);
        assert_ok!(cache.set_many(&[("a".into(), "1".into())]).await);
        assert_ok!(cache.hset_many("h", &[("level".into(), "30".into())]).await);

        assert_eq!(cache.get("k").await.unwrap(), None);
        assert_eq!(cache.get("a").await.unwrap(), None);
        assert_eq!(cache.hget("h", "level").await.unwrap(), None);
        assert_eq!(cache.incr("counter", 5).await.unwrap(), None);
        assert!(!cache.retains_writes());
    }
}
