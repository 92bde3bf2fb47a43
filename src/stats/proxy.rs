//! Stats proxy
//!
//! Sits in front of the telemetry statistics collector. The six game-stats
//! operations go through a [`GameStatsSink`] picked once at construction:
//! [`ForwardingSink`] when game stats are enabled, [`SuppressedSink`]
//! otherwise. Player-stat reads can be served from the cache instead of the
//! collector.

use std::sync::Arc;

use tracing::debug;

use super::telemetry::{fields, Telemetry};
use crate::cache::{CacheContext, CacheKey};
use crate::types::{GateError, Result};

/// Outcome of one location scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationOutcome {
    Scanned,
    Failed,
}

/// Telemetry statistics collector capability
#[async_trait::async_trait]
pub trait StatsCollector: Send + Sync {
    async fn collect_location_stats(&self, origin: &str, outcome: LocationOutcome) -> Result<()>;

    /// Flush everything collected since the previous run
    async fn run_stats_collector(&self) -> Result<()>;

    async fn collect_raid_stats(&self, origin: &str, count: u32) -> Result<()>;

    async fn collect_mon_stats(&self, origin: &str, count: u32) -> Result<()>;

    async fn collect_mon_iv_stats(&self, origin: &str, count: u32, shinies: u32) -> Result<()>;

    async fn collect_quest_stats(&self, origin: &str, count: u32) -> Result<()>;

    /// Last known player level, -1 when unknown
    async fn get_player_level(&self, origin: &str) -> Result<i32>;

    /// Last known stop visit count, -1 when unknown
    async fn get_poke_stop_visits(&self, origin: &str) -> Result<i64>;

    async fn generate_player_stats(&self, origin: &str, telemetry: &Telemetry) -> Result<()>;
}

/// Destination of the game-stats operations
#[async_trait::async_trait]
pub trait GameStatsSink: Send + Sync {
    async fn collect_location_stats(&self, origin: &str, outcome: LocationOutcome) -> Result<()>;
    async fn run_stats_collector(&self) -> Result<()>;
    async fn collect_raid_stats(&self, origin: &str, count: u32) -> Result<()>;
    async fn collect_mon_stats(&self, origin: &str, count: u32) -> Result<()>;
    async fn collect_mon_iv_stats(&self, origin: &str, count: u32, shinies: u32) -> Result<()>;
    async fn collect_quest_stats(&self, origin: &str, count: u32) -> Result<()>;
}

/// Delegates every game-stats call to the wrapped collector
pub struct ForwardingSink {
    inner: Arc<dyn StatsCollector>,
}

#[async_trait::async_trait]
impl GameStatsSink for ForwardingSink {
    async fn collect_location_stats(&self, origin: &str, outcome: LocationOutcome) -> Result<()> {
        self.inner.collect_location_stats(origin, outcome).await
    }

    async fn run_stats_collector(&self) -> Result<()> {
        self.inner.run_stats_collector().await
    }

    async fn collect_raid_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.inner.collect_raid_stats(origin, count).await
    }

    async fn collect_mon_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.inner.collect_mon_stats(origin, count).await
    }

    async fn collect_mon_iv_stats(&self, origin: &str, count: u32, shinies: u32) -> Result<()> {
        self.inner.collect_mon_iv_stats(origin, count, shinies).await
    }

    async fn collect_quest_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.inner.collect_quest_stats(origin, count).await
    }
}

/// Accepts and drops every game-stats call
pub struct SuppressedSink;

#[async_trait::async_trait]
impl GameStatsSink for SuppressedSink {
    async fn collect_location_stats(&self, _origin: &str, _outcome: LocationOutcome) -> Result<()> {
        Ok(())
    }

    async fn run_stats_collector(&self) -> Result<()> {
        Ok(())
    }

    async fn collect_raid_stats(&self, _origin: &str, _count: u32) -> Result<()> {
        Ok(())
    }

    async fn collect_mon_stats(&self, _origin: &str, _count: u32) -> Result<()> {
        Ok(())
    }

    async fn collect_mon_iv_stats(&self, _origin: &str, _count: u32, _shinies: u32) -> Result<()> {
        Ok(())
    }

    async fn collect_quest_stats(&self, _origin: &str, _count: u32) -> Result<()> {
        Ok(())
    }
}

/// Proxy in front of a [`StatsCollector`]
pub struct StatsProxy {
    inner: Arc<dyn StatsCollector>,
    game_stats: Box<dyn GameStatsSink>,
    /// Set when player-stat reads are served from the cache
    cache: Option<Arc<CacheContext>>,
}

impl StatsProxy {
    /// Wrap `inner`. `cache` enables cache-backed player-stat reads.
    pub fn new(
        inner: Arc<dyn StatsCollector>,
        game_stats: bool,
        cache: Option<Arc<CacheContext>>,
    ) -> Self {
        let sink: Box<dyn GameStatsSink> = if game_stats {
            Box::new(ForwardingSink {
                inner: Arc::clone(&inner),
            })
        } else {
            Box::new(SuppressedSink)
        };
        Self {
            inner,
            game_stats: sink,
            cache,
        }
    }

    async fn cached_field(&self, cache: &CacheContext, origin: &str, field: &str) -> Result<i64> {
        let handle = cache.get_cache(false).await?;
        let key = CacheKey::player_stats(origin).to_storage_key();
        match handle.hget(&key, field).await? {
            Some(raw) => raw.parse::<i64>().map_err(|_| {
                GateError::Cache(format!("Player stat {} is not an integer: {}", field, raw))
            }),
            None => Ok(-1),
        }
    }
}

#[async_trait::async_trait]
impl StatsCollector for StatsProxy {
    async fn collect_location_stats(&self, origin: &str, outcome: LocationOutcome) -> Result<()> {
        self.game_stats.collect_location_stats(origin, outcome).await
    }

    async fn run_stats_collector(&self) -> Result<()> {
        self.game_stats.run_stats_collector().await
    }

    async fn collect_raid_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.game_stats.collect_raid_stats(origin, count).await
    }

    async fn collect_mon_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.game_stats.collect_mon_stats(origin, count).await
    }

    async fn collect_mon_iv_stats(&self, origin: &str, count: u32, shinies: u32) -> Result<()> {
        self.game_stats
            .collect_mon_iv_stats(origin, count, shinies)
            .await
    }

    async fn collect_quest_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.game_stats.collect_quest_stats(origin, count).await
    }

    async fn get_player_level(&self, origin: &str) -> Result<i32> {
        match &self.cache {
            Some(cache) => {
                let level = self.cached_field(cache, origin, fields::LEVEL).await?;
                i32::try_from(level)
                    .map_err(|_| GateError::Cache(format!("Player level out of range: {}", level)))
            }
            None => self.inner.get_player_level(origin).await,
        }
    }

    async fn get_poke_stop_visits(&self, origin: &str) -> Result<i64> {
        match &self.cache {
            Some(cache) => {
                self.cached_field(cache, origin, fields::POKE_STOP_VISITS)
                    .await
            }
            None => self.inner.get_poke_stop_visits(origin).await,
        }
    }

    async fn generate_player_stats(&self, origin: &str, telemetry: &Telemetry) -> Result<()> {
        let Some(item) = telemetry.latest_player_stats() else {
            return Ok(());
        };

        if let (Some(cache), Some(stats)) = (&self.cache, &item.player_stats) {
            let handle = cache.get_cache(false).await?;
            handle
                .hset_many(
                    &CacheKey::player_stats(origin).to_storage_key(),
                    &stats.cache_fields(),
                )
                .await?;
            debug!(origin = %origin, "Cached player stats (level {})", stats.level);
        }

        let reduced = Telemetry {
            items: vec![item.clone()],
        };
        self.inner.generate_player_stats(origin, &reduced).await
    }
}
