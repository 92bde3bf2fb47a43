//! Telemetry records consumed by the stats layer
//!
//! Only the inventory-delta portion of a decoded telemetry batch matters
//! here. Fields are mapped explicitly; unknown keys in the payload are
//! ignored by serde.

use serde::{Deserialize, Serialize};

/// Decoded telemetry batch for one origin
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Telemetry {
    #[serde(default)]
    pub items: Vec<InventoryItem>,
}

impl Telemetry {
    /// The last item carrying a positive player level
    pub fn latest_player_stats(&self) -> Option<&InventoryItem> {
        self.items.iter().rev().find(|item| {
            item.player_stats
                .as_ref()
                .is_some_and(|stats| stats.level > 0)
        })
    }
}

/// One inventory-delta item
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct InventoryItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_stats: Option<PlayerStats>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PlayerStats {
    pub level: i32,
    #[serde(default)]
    pub experience: i64,
    #[serde(default)]
    pub km_walked: f64,
    #[serde(default)]
    pub pokemons_encountered: i64,
    #[serde(default)]
    pub poke_stop_visits: i64,
}

/// Hash field names of the per-origin player stats snapshot
pub mod fields {
    pub const LEVEL: &str = "level";
    pub const EXPERIENCE: &str = "experience";
    pub const KM_WALKED: &str = "km_walked";
    pub const POKEMONS_ENCOUNTERED: &str = "pokemons_encountered";
    pub const POKE_STOP_VISITS: &str = "poke_stop_visits";
}

impl PlayerStats {
    /// Field-by-field mapping into cache hash entries
    pub fn cache_fields(&self) -> Vec<(String, String)> {
        vec![
            (fields::LEVEL.to_string(), self.level.to_string()),
            (fields::EXPERIENCE.to_string(), self.experience.to_string()),
            (fields::KM_WALKED.to_string(), self.km_walked.to_string()),
            (
                fields::POKEMONS_ENCOUNTERED.to_string(),
                self.pokemons_encountered.to_string(),
            ),
            (
                fields::POKE_STOP_VISITS.to_string(),
                self.poke_stop_visits.to_string(),
            ),
        ]
    }
}
