//! Account allocator
//!
//! Rotates the account each device logs in with and charges encounters
//! against a per-account budget.
//!
//! The cache holds two pieces of shadow state per device: a pointer from the
//! origin to its current account, and an encounter counter keyed by account
//! identity. Counters are written back to the durable store only when a
//! multiple of [`WRITE_BACK_INTERVAL`] is crossed, which bounds durable
//! writes to roughly one per interval.
//!
//! When the budget feature is disabled every operation is a no-op that
//! returns `None`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{AccountPointer, CacheContext, CacheHandle, CacheKey};
use crate::db::schemas::Account;
use crate::db::AccountStore;
use crate::types::{GateError, Result};

/// Encounter interval between durable write-backs
pub const WRITE_BACK_INTERVAL: i64 = 50;

/// Per-device account rotation and encounter budget
pub struct AccountAllocator {
    cache: Arc<CacheContext>,
    store: Arc<dyn AccountStore>,
    encounter_limit: Option<u64>,
}

impl AccountAllocator {
    /// Create an allocator. `encounter_limit = None` disables the feature.
    pub fn new(
        cache: Arc<CacheContext>,
        store: Arc<dyn AccountStore>,
        encounter_limit: Option<u64>,
    ) -> Self {
        Self {
            cache,
            store,
            encounter_limit,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.encounter_limit.is_some()
    }

    /// Current account of `origin`, served from the cache when possible
    pub async fn get_current_account(&self, origin: &str) -> Result<Option<Account>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let cache = self.cache.get_cache(false).await?;
        self.current_account(cache.as_ref(), origin).await
    }

    /// Charge `n` encounters to the current account of `origin`.
    ///
    /// Returns the new count, or None when the device has no account.
    pub async fn add_encounters(&self, origin: &str, n: i64) -> Result<Option<i64>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let cache = self.cache.get_cache(false).await?;
        let Some(account) = self.current_account(cache.as_ref(), origin).await? else {
            debug!(origin = %origin, "No current account, encounters not charged");
            return Ok(None);
        };

        let key = CacheKey::encounters(&account.login_type, &account.username).to_storage_key();
        let new = match cache.incr(&key, n).await? {
            Some(new) => {
                let old = new - n;
                if old / WRITE_BACK_INTERVAL != new / WRITE_BACK_INTERVAL {
                    self.write_back(&account, new).await?;
                }
                new
            }
            None => {
                // Nothing retained the increment; the durable count is all we have
                let new = account.encounters + n;
                self.write_back(&account, new).await?;
                new
            }
        };
        Ok(Some(new))
    }

    /// The current encounter count if it has reached the limit
    pub async fn account_at_encounter_limit(&self, origin: &str) -> Result<Option<i64>> {
        let Some(limit) = self.encounter_limit else {
            return Ok(None);
        };
        let Some(account) = self.get_current_account(origin).await? else {
            return Ok(None);
        };
        if account.encounters >= limit as i64 {
            Ok(Some(account.encounters))
        } else {
            Ok(None)
        }
    }

    /// Have the durable store assign a fresh account to `origin`
    pub async fn get_new_account_for_device(&self, origin: &str) -> Result<Option<Account>> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let cache = self.cache.get_cache(false).await?;

        // The store picks by durable count, which lags the cache counter
        if let Some(previous) = cached_account(cache.as_ref(), origin).await? {
            self.write_back(&previous, previous.encounters).await?;
        }

        let Some(account) = self.store.get_new_account_for_device(origin).await? else {
            warn!(origin = %origin, "Durable store has no account to assign");
            return Ok(None);
        };
        seed(cache.as_ref(), origin, &account).await?;
        info!(
            origin = %origin,
            "Rotated to account {}:{} ({} encounters)",
            account.login_type, account.username, account.encounters
        );
        Ok(Some(account))
    }

    /// Report the current account of `origin` as banned.
    ///
    /// The cache pointer is left in place; callers request a new account.
    pub async fn set_account_banned(&self, origin: &str) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let Some(account) = self.get_current_account(origin).await? else {
            warn!(origin = %origin, "Ban reported for device without an account");
            return Ok(());
        };
        self.store
            .set_account_banned(&account.username, &account.login_type, account.encounters)
            .await
    }

    async fn current_account(
        &self,
        cache: &dyn CacheHandle,
        origin: &str,
    ) -> Result<Option<Account>> {
        if let Some(account) = cached_account(cache, origin).await? {
            return Ok(Some(account));
        }

        let Some(account) = self.store.get_current_account_for_device(origin).await? else {
            return Ok(None);
        };
        seed(cache, origin, &account).await?;
        Ok(Some(account))
    }

    async fn write_back(&self, account: &Account, count: i64) -> Result<()> {
        debug!(
            "Writing back {} encounters for {}:{}",
            count, account.login_type, account.username
        );
        self.store
            .update_encounters_for_account(&account.username, &account.login_type, count)
            .await
    }
}

/// Current account of `origin` as the cache alone knows it
async fn cached_account(cache: &dyn CacheHandle, origin: &str) -> Result<Option<Account>> {
    let pointer_key = CacheKey::current_account(origin).to_storage_key();
    let Some(raw) = cache.get(&pointer_key).await? else {
        return Ok(None);
    };
    let pointer = AccountPointer::parse(&raw)?;
    let encounters = match cache.get(&pointer.encounters_key().to_storage_key()).await? {
        Some(value) => parse_count(&value)?,
        None => 0,
    };
    Ok(Some(Account::new(
        &pointer.login_type,
        &pointer.username,
        encounters,
    )))
}

/// Seed pointer and counter for `account` in one batched write
async fn seed(cache: &dyn CacheHandle, origin: &str, account: &Account) -> Result<()> {
    let pointer = AccountPointer::new(&account.login_type, &account.username);
    cache
        .set_many(&[
            (
                CacheKey::current_account(origin).to_storage_key(),
                pointer.encode(),
            ),
            (
                pointer.encounters_key().to_storage_key(),
                account.encounters.to_string(),
            ),
        ])
        .await
}

fn parse_count(value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| GateError::Cache(format!("Encounter counter is not an integer: {}", value)))
}
