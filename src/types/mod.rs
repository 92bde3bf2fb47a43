//! Shared types for Relaygate

pub mod error;

pub use error::{GateError, Result};
