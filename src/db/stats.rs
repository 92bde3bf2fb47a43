//! Stats persistence

use tracing::debug;

use crate::db::schemas::{StatsDoc, STATS_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Destination for flushed stats windows
#[async_trait::async_trait]
pub trait StatsStore: Send + Sync {
    /// Persist one window; returns the number of documents written
    async fn save_stats(&self, docs: Vec<StatsDoc>) -> Result<usize>;
}

pub struct MongoStatsStore {
    collection: MongoCollection<StatsDoc>,
}

impl MongoStatsStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<StatsDoc>(STATS_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait::async_trait]
impl StatsStore for MongoStatsStore {
    async fn save_stats(&self, docs: Vec<StatsDoc>) -> Result<usize> {
        let mut written = 0;
        for doc in docs {
            debug!(origin = %doc.origin, "Saving stats window");
            self.collection.insert_one(doc).await?;
            written += 1;
        }
        Ok(written)
    }
}
