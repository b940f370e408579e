use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;
use crate::error::DbError;
use crate::param::Params;
use crate::value::Value;

fn rendered(sql: &str, params: &[(&str, Value)]) -> Rendered {
    let mut table = Params::new();
    for (name, value) in params {
        table.set(*name, value.clone());
    }
    Rendered {
        sql: sql.to_string(),
        params: table,
    }
}

#[test]
fn test_cache_key_is_stable_and_order_independent() {
    let a = rendered("SELECT 1", &[(":a", Value::Int(1)), (":b", Value::Int(2))]);
    let b = rendered("SELECT 1", &[(":b", Value::Int(2)), (":a", Value::Int(1))]);
    let c = rendered("SELECT 1", &[(":a", Value::Int(1)), (":b", Value::Int(3))]);

    let key = cache_key("db.select.", &a).unwrap();
    assert!(key.starts_with("db.select."));
    assert_eq!(key.len(), "db.select.".len() + 64);
    assert_eq!(key, cache_key("db.select.", &b).unwrap());
    assert_ne!(key, cache_key("db.select.", &c).unwrap());
}

#[test]
fn test_ttl_conversions() {
    assert_eq!(CacheTtl::default(), CacheTtl::Bypass);
    assert_eq!(CacheTtl::from(60), CacheTtl::Expire(Duration::from_secs(60)));
    assert_eq!(CacheTtl::from(60u64), CacheTtl::Expire(Duration::from_secs(60)));
    assert_eq!(CacheTtl::from(0), CacheTtl::Bypass);
    assert_eq!(CacheTtl::from(-5), CacheTtl::Bypass);
    assert_eq!(CacheTtl::from(None::<Duration>), CacheTtl::Persist);
    assert_eq!(CacheTtl::Persist.expires_after(), None);
}

async fn counted(counter: &AtomicUsize, value: i64) -> DbResult<i64> {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(value)
}

#[tokio::test]
async fn test_second_fetch_is_served_from_cache() {
    let store = MemoryStore::default();
    let calls = AtomicUsize::new(0);
    let r = rendered("SELECT n FROM t;", &[(":p0", Value::Int(1))]);

    let first: i64 = fetch_with_cache(Some(&store), "db.select.", &r, 60.into(), || {
        counted(&calls, 7)
    })
    .await
    .unwrap();
    let second: i64 = fetch_with_cache(Some(&store), "db.select.", &r, 60.into(), || {
        counted(&calls, 8)
    })
    .await
    .unwrap();

    assert_eq!((first, second), (7, 7));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_bypass_and_missing_store_always_execute() {
    let store = MemoryStore::default();
    let calls = AtomicUsize::new(0);
    let r = rendered("SELECT 1;", &[]);

    for _ in 0..2 {
        let _: i64 = fetch_with_cache(Some(&store), "p.", &r, CacheTtl::Bypass, || {
            counted(&calls, 1)
        })
        .await
        .unwrap();
        let _: i64 = fetch_with_cache(None::<&NoCache>, "p.", &r, CacheTtl::Persist, || {
            counted(&calls, 1)
        })
        .await
        .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(store.is_empty());
}

/// Item-pool backend double that can be told to fail.
#[derive(Default)]
struct TestPool {
    items: Mutex<HashMap<String, CacheItem>>,
    fail: bool,
    saves: AtomicUsize,
}

impl CachePool for TestPool {
    async fn get_item(&self, key: &str) -> DbResult<CacheItem> {
        if self.fail {
            return Err(DbError::cache("pool unavailable"));
        }
        let items = self.items.lock().unwrap();
        Ok(items
            .get(key)
            .cloned()
            .unwrap_or_else(|| CacheItem::new(key)))
    }

    async fn has_item(&self, key: &str) -> DbResult<bool> {
        if self.fail {
            return Err(DbError::cache("pool unavailable"));
        }
        Ok(self.items.lock().unwrap().contains_key(key))
    }

    async fn save(&self, item: CacheItem) -> DbResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .insert(item.key().to_string(), item);
        Ok(())
    }
}

#[tokio::test]
async fn test_pool_store_normalizes_item_pools() {
    let store = PoolStore::new(TestPool::default());
    let calls = AtomicUsize::new(0);
    let r = rendered("SELECT 2;", &[]);

    for _ in 0..3 {
        let v: i64 = fetch_with_cache(
            Some(&store),
            "db.select.",
            &r,
            Duration::from_secs(5).into(),
            || counted(&calls, 2),
        )
        .await
        .unwrap();
        assert_eq!(v, 2);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(store.pool().saves.load(Ordering::SeqCst), 1);

    let key = cache_key("db.select.", &r).unwrap();
    let items = store.pool().items.lock().unwrap();
    assert_eq!(items[&key].ttl(), Some(Duration::from_secs(5)));
    assert_eq!(items[&key].get(), Some("2"));
}

#[tokio::test]
async fn test_cache_errors_propagate() {
    let store = PoolStore::new(TestPool {
        fail: true,
        ..TestPool::default()
    });
    let calls = AtomicUsize::new(0);
    let r = rendered("SELECT 3;", &[]);

    let err = fetch_with_cache(Some(&store), "p.", &r, CacheTtl::Persist, || {
        counted(&calls, 3)
    })
    .await
    .unwrap_err();
    assert!(matches!(err, DbError::Cache(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// A store that claims to have every key but returns nothing for it.
struct Flaky;

impl CacheStore for Flaky {
    async fn has(&self, _key: &str) -> DbResult<bool> {
        Ok(true)
    }

    async fn get(&self, _key: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> DbResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_has_without_value_is_a_miss() {
    let calls = AtomicUsize::new(0);
    let r = rendered("SELECT 4;", &[]);
    let v: i64 = fetch_with_cache(Some(&Flaky), "p.", &r, CacheTtl::Persist, || {
        counted(&calls, 4)
    })
    .await
    .unwrap();
    assert_eq!(v, 4);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
