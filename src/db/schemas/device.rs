//! Device document schema
//!
//! Configuration for each device origin the coordinator may manage.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for devices
pub const DEVICE_COLLECTION: &str = "devices";

/// Device document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct DeviceDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    #[serde(default)]
    pub metadata: Metadata,

    /// Origin reported by the relay
    pub origin: String,

    /// Administratively paused; workers start in reduced mode
    #[serde(default)]
    pub paused: bool,

    /// Free-form runtime settings (e.g. `job`)
    #[serde(default)]
    pub settings: Document,
}

impl DeviceDoc {
    pub fn is_active(&self) -> bool {
        !self.paused
    }
}

impl IntoIndexes for DeviceDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "origin": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("origin_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for DeviceDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
