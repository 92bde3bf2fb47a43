//! Game stats collector
//!
//! Accumulates per-origin counters between collector runs. Each run drains
//! the current window and persists one [`StatsDoc`] per origin through a
//! [`StatsStore`]. Player stats are kept as the last snapshot seen.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, error, info};

use super::proxy::{LocationOutcome, StatsCollector};
use super::telemetry::{PlayerStats, Telemetry};
use crate::db::schemas::StatsDoc;
use crate::db::StatsStore;
use crate::types::Result;

/// Counters collected for one origin since the last run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StatsWindow {
    locations_ok: i64,
    locations_failed: i64,
    raids: i64,
    mons: i64,
    mon_ivs: i64,
    shinies: i64,
    quests: i64,
}

impl StatsWindow {
    fn merge(&mut self, other: &StatsWindow) {
        self.locations_ok += other.locations_ok;
        self.locations_failed += other.locations_failed;
        self.raids += other.raids;
        self.mons += other.mons;
        self.mon_ivs += other.mon_ivs;
        self.shinies += other.shinies;
        self.quests += other.quests;
    }
}

pub struct GameStatsCollector {
    store: Arc<dyn StatsStore>,
    instance_id: String,
    windows: DashMap<String, StatsWindow>,
    players: DashMap<String, PlayerStats>,
}

impl GameStatsCollector {
    pub fn new(store: Arc<dyn StatsStore>, instance_id: impl Into<String>) -> Self {
        Self {
            store,
            instance_id: instance_id.into(),
            windows: DashMap::new(),
            players: DashMap::new(),
        }
    }

    /// Origins with counters pending in the current window
    pub fn pending_origins(&self) -> Vec<String> {
        self.windows.iter().map(|entry| entry.key().clone()).collect()
    }

    fn bump(&self, origin: &str, apply: impl FnOnce(&mut StatsWindow)) {
        let mut window = self.windows.entry(origin.to_string()).or_default();
        apply(window.value_mut());
    }

    fn drain(&self) -> Vec<(String, StatsWindow)> {
        let origins = self.pending_origins();
        origins
            .into_iter()
            .filter_map(|origin| self.windows.remove(&origin))
            .collect()
    }
}

#[async_trait::async_trait]
impl StatsCollector for GameStatsCollector {
    async fn collect_location_stats(&self, origin: &str, outcome: LocationOutcome) -> Result<()> {
        self.bump(origin, |w| match outcome {
            LocationOutcome::Scanned => w.locations_ok += 1,
            LocationOutcome::Failed => w.locations_failed += 1,
        });
        Ok(())
    }

    async fn run_stats_collector(&self) -> Result<()> {
        let drained = self.drain();
        if drained.is_empty() {
            debug!("No stats collected since the last run");
            return Ok(());
        }

        let collected_at = bson::DateTime::from_chrono(Utc::now());
        let docs: Vec<StatsDoc> = drained
            .iter()
            .map(|(origin, w)| StatsDoc {
                origin: origin.clone(),
                instance_id: self.instance_id.clone(),
                collected_at: Some(collected_at),
                locations_ok: w.locations_ok,
                locations_failed: w.locations_failed,
                raids: w.raids,
                mons: w.mons,
                mon_ivs: w.mon_ivs,
                shinies: w.shinies,
                quests: w.quests,
                player_level: self.players.get(origin).map(|p| p.level),
                ..Default::default()
            })
            .collect();

        match self.store.save_stats(docs).await {
            Ok(written) => {
                info!("Flushed stats for {} origins", written);
                Ok(())
            }
            Err(e) => {
                error!("Stats flush failed, keeping window for the next run: {}", e);
                for (origin, window) in drained {
                    self.windows.entry(origin).or_default().merge(&window);
                }
                Err(e)
            }
        }
    }

    async fn collect_raid_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.bump(origin, |w| w.raids += i64::from(count));
        Ok(())
    }

    async fn collect_mon_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.bump(origin, |w| w.mons += i64::from(count));
        Ok(())
    }

    async fn collect_mon_iv_stats(&self, origin: &str, count: u32, shinies: u32) -> Result<()> {
        self.bump(origin, |w| {
            w.mon_ivs += i64::from(count);
            w.shinies += i64::from(shinies);
        });
        Ok(())
    }

    async fn collect_quest_stats(&self, origin: &str, count: u32) -> Result<()> {
        self.bump(origin, |w| w.quests += i64::from(count));
        Ok(())
    }

    async fn get_player_level(&self, origin: &str) -> Result<i32> {
        Ok(self.players.get(origin).map(|p| p.level).unwrap_or(-1))
    }

    async fn get_poke_stop_visits(&self, origin: &str) -> Result<i64> {
        Ok(self
            .players
            .get(origin)
            .map(|p| p.poke_stop_visits)
            .unwrap_or(-1))
    }

    async fn generate_player_stats(&self, origin: &str, telemetry: &Telemetry) -> Result<()> {
        if let Some(stats) = telemetry
            .latest_player_stats()
            .and_then(|item| item.player_stats.clone())
        {
            self.players.insert(origin.to_string(), stats);
        }
        Ok(())
    }
}
