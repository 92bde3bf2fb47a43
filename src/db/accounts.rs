//! Durable account store
//!
//! Source of truth for account assignment and ban state. The allocator only
//! ever talks to the [`AccountStore`] trait; [`MongoAccountStore`] is the
//! production implementation.
//!
//! ## Assignment exclusivity
//!
//! `get_new_account_for_device` claims a candidate with a single
//! `findAndModify` whose filter requires the account to be unassigned. Two
//! coordinators racing for the same candidate cannot both match it: the
//! loser's update lands on the next candidate instead. Transient write
//! conflicts are retried a bounded number of times.

use bson::{doc, Bson, DateTime};
use tracing::{info, warn};

use crate::db::schemas::{Account, AccountDoc, Metadata, ACCOUNT_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::Result;

/// Attempts at the conditional claim before giving up
const CLAIM_ATTEMPTS: u32 = 3;

/// Durable-store operations the account allocator depends on
#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    /// Account currently assigned to `origin`, if any
    async fn get_current_account_for_device(&self, origin: &str) -> Result<Option<Account>>;

    /// Persist the encounter count of one account
    async fn update_encounters_for_account(
        &self,
        username: &str,
        login_type: &str,
        count: i64,
    ) -> Result<()>;

    /// Atomically select a fresh account and assign it to `origin`.
    ///
    /// Implementations must guarantee no two devices hold the same account.
    async fn get_new_account_for_device(&self, origin: &str) -> Result<Option<Account>>;

    /// Mark an account banned, recording its last known encounter count
    async fn set_account_banned(&self, username: &str, login_type: &str, last_count: i64)
        -> Result<()>;
}

/// MongoDB-backed account store
pub struct MongoAccountStore {
    collection: MongoCollection<AccountDoc>,
    encounter_limit: Option<i64>,
}

impl MongoAccountStore {
    /// Create a new account store; `encounter_limit` excludes exhausted
    /// accounts from selection.
    pub async fn new(mongo: &MongoClient, encounter_limit: Option<u64>) -> Result<Self> {
        let collection = mongo.collection::<AccountDoc>(ACCOUNT_COLLECTION).await?;
        Ok(Self {
            collection,
            encounter_limit: encounter_limit.map(|l| l as i64),
        })
    }
}

/// Filter matching accounts eligible for a new assignment
fn candidate_filter(encounter_limit: Option<i64>) -> bson::Document {
    let mut filter = doc! {
        "assigned_origin": Bson::Null,
        "banned": { "$ne": true },
    };
    if let Some(limit) = encounter_limit {
        filter.insert("encounters", doc! { "$lt": limit });
    }
    filter
}

#[async_trait::async_trait]
impl AccountStore for MongoAccountStore {
    async fn get_current_account_for_device(&self, origin: &str) -> Result<Option<Account>> {
        let doc = self
            .collection
            .find_one(doc! { "assigned_origin": origin, "banned": { "$ne": true } })
            .await?;
        Ok(doc.map(|d| d.to_account()))
    }

    async fn update_encounters_for_account(
        &self,
        username: &str,
        login_type: &str,
        count: i64,
    ) -> Result<()> {
        let result = self
            .collection
            .update_one(
                doc! { "username": username, "login_type": login_type },
                Metadata::touch(doc! { "encounters": count }),
            )
            .await?;
        if result.matched_count == 0 {
            warn!("Encounter write-back for unknown account {}:{}", login_type, username);
        }
        Ok(())
    }

    async fn get_new_account_for_device(&self, origin: &str) -> Result<Option<Account>> {
        // Release whatever the device held before
        self.collection
            .update_many(
                doc! { "assigned_origin": origin },
                Metadata::touch(doc! { "assigned_origin": Bson::Null }),
            )
            .await?;

        let filter = candidate_filter(self.encounter_limit);
        let sort = doc! { "encounters": 1, "last_assigned_at": 1 };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let claim = Metadata::touch(doc! {
                "assigned_origin": origin,
                "last_assigned_at": DateTime::now(),
            });
            match self
                .collection
                .find_one_and_update(filter.clone(), claim, sort.clone())
                .await
            {
                Ok(Some(doc)) => {
                    info!(
                        origin = %origin,
                        "Assigned account {}:{} ({} encounters)",
                        doc.login_type, doc.username, doc.encounters
                    );
                    return Ok(Some(doc.to_account()));
                }
                Ok(None) => {
                    warn!(origin = %origin, "No unassigned account available");
                    return Ok(None);
                }
                Err(e) if attempt < CLAIM_ATTEMPTS => {
                    warn!(origin = %origin, "Account claim attempt {} failed: {}", attempt, e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn set_account_banned(
        &self,
        username: &str,
        login_type: &str,
        last_count: i64,
    ) -> Result<()> {
        self.collection
            .update_one(
                doc! { "username": username, "login_type": login_type },
                Metadata::touch(doc! {
                    "banned": true,
                    "banned_at": DateTime::now(),
                    "encounters": last_count,
                    "assigned_origin": Bson::Null,
                }),
            )
            .await?;
        warn!("Account {}:{} marked banned at {} encounters", login_type, username, last_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_filter_without_limit() {
        let filter = candidate_filter(None);
        assert_eq!(filter.get("assigned_origin"), Some(&Bson::Null));
        assert!(filter.get("encounters").is_none());
    }

    #[test]
    fn test_candidate_filter_with_limit() {
        let filter = candidate_filter(Some(150));
        assert_eq!(
            filter.get_document("encounters").unwrap(),
            &doc! { "$lt": 150_i64 }
        );
    }
}
