//! Durable storage
//!
//! MongoDB holds the source of truth for accounts and device configuration.
//! The cache layer only mirrors hot counters on top of it.

pub mod accounts;
pub mod devices;
pub mod mongo;
pub mod schemas;
pub mod stats;

pub use accounts::{AccountStore, MongoAccountStore};
pub use devices::{DeviceConfig, DeviceSettings, MongoDeviceSettings};
pub use mongo::{redact_uri, MongoClient, MongoCollection};
pub use stats::{MongoStatsStore, StatsStore};
