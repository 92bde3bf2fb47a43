//! Cache key definitions
//!
//! Account pointers are keyed by origin. Encounter counters are keyed by
//! account identity so every device pointing at one account shares a count.

use std::fmt;

use crate::types::{GateError, Result};

/// Cache key for one piece of shadow state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Pointer from a device to its current account
    CurrentAccount { origin: String },
    /// Running encounter count of one account
    Encounters { login_type: String, username: String },
    /// Per-device player stats hash
    PlayerStats { origin: String },
}

impl CacheKey {
    pub fn current_account(origin: &str) -> Self {
        Self::CurrentAccount {
            origin: origin.to_string(),
        }
    }

    pub fn encounters(login_type: &str, username: &str) -> Self {
        Self::Encounters {
            login_type: login_type.to_string(),
            username: username.to_string(),
        }
    }

    pub fn player_stats(origin: &str) -> Self {
        Self::PlayerStats {
            origin: origin.to_string(),
        }
    }

    /// Convert to storage key string
    pub fn to_storage_key(&self) -> String {
        match self {
            Self::CurrentAccount { origin } => format!("cur-acct:{}", origin),
            Self::Encounters {
                login_type,
                username,
            } => format!("acct-encr:{}:{}", login_type, username),
            Self::PlayerStats { origin } => format!("player-stats:{}", origin),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_storage_key())
    }
}

/// Value stored under a [`CacheKey::CurrentAccount`] key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPointer {
    pub login_type: String,
    pub username: String,
}

impl AccountPointer {
    pub fn new(login_type: &str, username: &str) -> Self {
        Self {
            login_type: login_type.to_string(),
            username: username.to_string(),
        }
    }

    /// Encode as `login_type:username`
    pub fn encode(&self) -> String {
        format!("{}:{}", self.login_type, self.username)
    }

    /// Parse `login_type:username`; the username may itself contain `:`
    pub fn parse(value: &str) -> Result<Self> {
        let (login_type, username) = value
            .split_once(':')
            .ok_or_else(|| GateError::Cache(format!("Malformed account pointer: {}", value)))?;
        Ok(Self::new(login_type, username))
    }

    /// Key of the counter this pointer refers to
    pub fn encounters_key(&self) -> CacheKey {
        CacheKey::encounters(&self.login_type, &self.username)
    }
}
