//! Database schemas for Relaygate
//!
//! MongoDB document structures for accounts, devices, and collected stats.

mod account;
mod device;
mod metadata;
mod stats;

pub use account::{Account, AccountDoc, ACCOUNT_COLLECTION};
pub use device::{DeviceDoc, DEVICE_COLLECTION};
pub use metadata::Metadata;
pub use stats::{StatsDoc, STATS_COLLECTION};
