//! Device configuration lookup
//!
//! The registry resolves each newly seen origin through [`DeviceSettings`]
//! before starting a worker for it.

use bson::{doc, Bson};

use crate::db::schemas::{DeviceDoc, Metadata, DEVICE_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Resolved configuration of one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    pub origin: String,
    /// False when the device is administratively paused
    pub active: bool,
}

/// Device configuration collaborator
#[async_trait::async_trait]
pub trait DeviceSettings: Send + Sync {
    /// Configuration for `origin`, or None for unknown devices
    async fn find_device(&self, origin: &str) -> Result<Option<DeviceConfig>>;

    /// Set one runtime setting; returns false when the device is unknown
    async fn set_device_setting(&self, origin: &str, key: &str, value: Bson) -> Result<bool>;
}

/// MongoDB-backed device settings
pub struct MongoDeviceSettings {
    collection: MongoCollection<DeviceDoc>,
}

impl MongoDeviceSettings {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<DeviceDoc>(DEVICE_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait::async_trait]
impl DeviceSettings for MongoDeviceSettings {
    async fn find_device(&self, origin: &str) -> Result<Option<DeviceConfig>> {
        let doc = self.collection.find_one(doc! { "origin": origin }).await?;
        Ok(doc.map(|d| DeviceConfig {
            active: d.is_active(),
            origin: d.origin,
        }))
    }

    async fn set_device_setting(&self, origin: &str, key: &str, value: Bson) -> Result<bool> {
        let mut fields = bson::Document::new();
        fields.insert(format!("settings.{}", key), value);
        let result = self
            .collection
            .update_one(doc! { "origin": origin }, Metadata::touch(fields))
            .await?;
        Ok(result.matched_count > 0)
    }
}
