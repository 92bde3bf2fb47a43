//! Game stats document schema
//!
//! One document per origin per collector run.

use bson::{doc, oid::ObjectId, DateTime, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for collected stats
pub const STATS_COLLECTION: &str = "game_stats";

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct StatsDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    pub origin: String,

    /// Coordinator instance that collected the window
    pub instance_id: String,

    /// End of the collection window
    pub collected_at: Option<DateTime>,

    pub locations_ok: i64,
    pub locations_failed: i64,
    pub raids: i64,
    pub mons: i64,
    pub mon_ivs: i64,
    pub shinies: i64,
    pub quests: i64,

    /// Most recent player level seen, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_level: Option<i32>,
}

impl IntoIndexes for StatsDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "origin": 1, "collected_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("origin_time_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for StatsDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
