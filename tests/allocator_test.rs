//! Account allocation across devices sharing one cache

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use relaygate::accounts::AccountAllocator;
use relaygate::cache::{CacheContext, CacheHandle, MemoryCache};
use relaygate::db::schemas::Account;
use relaygate::db::AccountStore;
use relaygate::Result;

/// Durable store with a fixed pool and exclusive assignment
#[derive(Default)]
struct PoolStore {
    accounts: Mutex<Vec<(Account, Option<String>, bool)>>,
    write_backs: Mutex<Vec<i64>>,
    limit: i64,
}

impl PoolStore {
    fn with_accounts(accounts: &[(&str, i64)]) -> Self {
        let store = Self {
            limit: 100,
            ..Self::default()
        };
        {
            let mut pool = store.accounts.lock().unwrap();
            for (username, encounters) in accounts {
                pool.push((Account::new("ptc", username, *encounters), None, false));
            }
        }
        store
    }

    fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    fn encounters_of(&self, username: &str) -> Option<i64> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(a, _, _)| a.username == username)
            .map(|(a, _, _)| a.encounters)
    }

    fn holders(&self) -> HashMap<String, String> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(a, holder, _)| holder.clone().map(|h| (h, a.username.clone())))
            .collect()
    }
}

#[async_trait::async_trait]
impl AccountStore for PoolStore {
    async fn get_current_account_for_device(&self, origin: &str) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .unwrap()
            .iter()
            .find(|(_, holder, banned)| !banned && holder.as_deref() == Some(origin))
            .map(|(a, _, _)| a.clone()))
    }

    async fn update_encounters_for_account(
        &self,
        username: &str,
        _login_type: &str,
        count: i64,
    ) -> Result<()> {
        self.write_backs.lock().unwrap().push(count);
        for (account, _, _) in self.accounts.lock().unwrap().iter_mut() {
            if account.username == username {
                account.encounters = count;
            }
        }
        Ok(())
    }

    async fn get_new_account_for_device(&self, origin: &str) -> Result<Option<Account>> {
        let mut pool = self.accounts.lock().unwrap();
        for (_, holder, _) in pool.iter_mut() {
            if holder.as_deref() == Some(origin) {
                *holder = None;
            }
        }
        let limit = self.limit;
        let candidate = pool
            .iter_mut()
            .filter(|(a, holder, banned)| holder.is_none() && !banned && a.encounters < limit)
            .min_by_key(|(a, _, _)| a.encounters);
        Ok(candidate.map(|(account, holder, _)| {
            *holder = Some(origin.to_string());
            account.clone()
        }))
    }

    async fn set_account_banned(&self, username: &str, _: &str, last_count: i64) -> Result<()> {
        for (account, holder, banned) in self.accounts.lock().unwrap().iter_mut() {
            if account.username == username {
                account.encounters = last_count;
                *holder = None;
                *banned = true;
            }
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_devices_get_distinct_accounts_and_rotate() {
    let memory = MemoryCache::new();
    let cache = Arc::new(CacheContext::fixed(Arc::new(memory.clone())));
    let store = Arc::new(PoolStore::with_accounts(&[("a", 0), ("b", 10), ("c", 20)]));
    let allocator = AccountAllocator::new(cache, store.clone(), Some(100));

    let first = allocator.get_new_account_for_device("atv01").await.unwrap().unwrap();
    let second = allocator.get_new_account_for_device("atv02").await.unwrap().unwrap();
    assert_eq!(first.username, "a");
    assert_eq!(second.username, "b");

    assert_eq!(allocator.add_encounters("atv01", 99).await.unwrap(), Some(99));
    assert_eq!(allocator.account_at_encounter_limit("atv01").await.unwrap(), None);
    assert_eq!(allocator.add_encounters("atv01", 1).await.unwrap(), Some(100));
    assert_eq!(
        allocator.account_at_encounter_limit("atv01").await.unwrap(),
        Some(100)
    );
    // 0 -> 99 crosses 50, 99 -> 100 crosses 100
    assert_eq!(store.write_backs.lock().unwrap().clone(), vec![99, 100]);

    let rotated = allocator.get_new_account_for_device("atv01").await.unwrap().unwrap();
    assert_eq!(rotated.username, "c");

    let holders = store.holders();
    assert_eq!(holders.get("atv01").map(String::as_str), Some("c"));
    assert_eq!(holders.get("atv02").map(String::as_str), Some("b"));
    assert_eq!(
        memory.get("cur-acct:atv01").await.unwrap().as_deref(),
        Some("ptc:c")
    );
}

#[tokio::test]
async fn test_ban_then_rotate() {
    let memory = MemoryCache::new();
    let cache = Arc::new(CacheContext::fixed(Arc::new(memory.clone())));
    let store = Arc::new(PoolStore::with_accounts(&[("a", 0), ("b", 5)]));
    let allocator = AccountAllocator::new(cache, store.clone(), Some(100));

    allocator.get_new_account_for_device("atv01").await.unwrap();
    allocator.add_encounters("atv01", 7).await.unwrap();
    allocator.set_account_banned("atv01").await.unwrap();

    {
        let pool = store.accounts.lock().unwrap();
        let (account, holder, banned) = &pool[0];
        assert_eq!(account.encounters, 7);
        assert!(holder.is_none());
        assert!(*banned);
    }

    let next = allocator.get_new_account_for_device("atv01").await.unwrap().unwrap();
    assert_eq!(next.username, "b");
    let current = allocator.get_current_account("atv01").await.unwrap().unwrap();
    assert_eq!(current, next);
}

#[tokio::test]
async fn test_shared_counter_between_devices() {
    let memory = MemoryCache::new();
    let cache = Arc::new(CacheContext::fixed(Arc::new(memory.clone())));
    let allocator = AccountAllocator::new(cache, Arc::new(PoolStore::default()), Some(100));

    // Two devices pointed at the same account observe one running count
    memory.set("cur-acct:atv01", "ptc:shared").await.unwrap();
    memory.set("cur-acct:atv02", "ptc:shared").await.unwrap();
    memory.set("acct-encr:ptc:shared", "10").await.unwrap();

    allocator.add_encounters("atv01", 3).await.unwrap();
    allocator.add_encounters("atv02", 4).await.unwrap();

    let a = allocator.get_current_account("atv01").await.unwrap().unwrap();
    let b = allocator.get_current_account("atv02").await.unwrap().unwrap();
    assert_eq!(a.encounters, 17);
    assert_eq!(b.encounters, 17);
}

#[tokio::test]
async fn test_rotation_persists_count_before_reassigning() {
    let memory = MemoryCache::new();
    let cache = Arc::new(CacheContext::fixed(Arc::new(memory.clone())));
    let store = Arc::new(PoolStore::with_accounts(&[("a", 0), ("b", 60)]).with_limit(70));
    let allocator = AccountAllocator::new(cache, store.clone(), Some(70));

    let first = allocator.get_new_account_for_device("atv01").await.unwrap().unwrap();
    assert_eq!(first.username, "a");
    for _ in 0..70 {
        allocator.add_encounters("atv01", 1).await.unwrap();
    }
    assert_eq!(
        allocator.account_at_encounter_limit("atv01").await.unwrap(),
        Some(70)
    );
    // Only the crossing of 50 reached the store so far
    assert_eq!(store.encounters_of("a"), Some(50));

    let rotated = allocator.get_new_account_for_device("atv01").await.unwrap().unwrap();
    assert_eq!(rotated.username, "b");
    assert_eq!(store.encounters_of("a"), Some(70));

    let current = allocator.get_current_account("atv01").await.unwrap().unwrap();
    assert_eq!(current, Account::new("ptc", "b", 60));
    assert_eq!(allocator.account_at_encounter_limit("atv01").await.unwrap(), None);
}
