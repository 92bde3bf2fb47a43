//! Relaygate - fleet coordinator for relay-connected automation devices
//!
//! Relaygate discovers which devices are reachable through a relay service,
//! keeps one supervised worker running per device, and rotates the login
//! accounts those devices use under an encounter budget.
//!
//! ## Components
//!
//! - **Cache**: shared key/value + hash state with a no-op fallback
//! - **Accounts**: per-device account rotation with bounded write-back
//! - **Stats**: game statistics proxy with optional cache-backed reads
//! - **Relay**: per-device command channel with failure classification
//! - **Worker**: worker construction and task lifecycle
//! - **Registry**: device sessions and the relay poller

pub mod accounts;
pub mod cache;
pub mod config;
pub mod db;
pub mod registry;
pub mod relay;
pub mod stats;
pub mod types;
pub mod worker;

pub use config::Args;
pub use types::{GateError, Result};
