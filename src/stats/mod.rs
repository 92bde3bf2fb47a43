//! Telemetry statistics
//!
//! - [`telemetry`]: structured view of decoded telemetry batches
//! - [`proxy`]: [`StatsProxy`], forwarding or suppressing game stats
//! - [`collector`]: [`GameStatsCollector`], the collector the binary wraps

pub mod collector;
pub mod proxy;
pub mod telemetry;

pub use collector::GameStatsCollector;
pub use proxy::{LocationOutcome, StatsCollector, StatsProxy};
pub use telemetry::{InventoryItem, PlayerStats, Telemetry};
