//! Relay protocol
//!
//! The relay fronts every device with an HTTP endpoint. [`RelayClient`]
//! lists connected devices and hands out one [`RelayChannel`] per device.

pub mod channel;
pub mod client;
pub mod message;

pub use channel::RelayChannel;
pub use client::RelayClient;
pub use message::{RelayMessage, RelayResponse};
