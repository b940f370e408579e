//! Read-through result cache for select fetches.
//!
//! Two backend shapes are supported and normalised here: a simple key/value
//! store ([`CacheStore`]) and an item-pool store ([`CachePool`], adapted by
//! [`PoolStore`]). Past this module only [`CacheStore`] exists.
//!
//! The `has`/`get`/`set` sequence is not atomic. Two callers missing the
//! same key at the same time both execute the query and both write the
//! entry; the last write wins.

mod memory;

pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::time::Duration;

use crate::error::DbResult;
use crate::stmt::Rendered;

/// How a fetch interacts with the result cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheTtl {
    /// Skip the cache and always hit the database.
    #[default]
    Bypass,
    /// Cache without expiry.
    Persist,
    /// Cache for the given duration.
    Expire(Duration),
}

impl CacheTtl {
    pub fn is_bypass(&self) -> bool {
        matches!(self, CacheTtl::Bypass)
    }

    /// The expiry handed to the store (`None` means no expiry).
    pub fn expires_after(&self) -> Option<Duration> {
        match self {
            CacheTtl::Expire(ttl) => Some(*ttl),
            CacheTtl::Bypass | CacheTtl::Persist => None,
        }
    }
}

impl From<Duration> for CacheTtl {
    fn from(ttl: Duration) -> Self {
        CacheTtl::Expire(ttl)
    }
}

/// Seconds; zero bypasses the cache.
impl From<u64> for CacheTtl {
    fn from(secs: u64) -> Self {
        if secs == 0 {
            return CacheTtl::Bypass;
        }
        CacheTtl::Expire(Duration::from_secs(secs))
    }
}

/// Seconds; zero or negative bypasses the cache.
impl From<i32> for CacheTtl {
    fn from(secs: i32) -> Self {
        u64::try_from(secs).map_or(CacheTtl::Bypass, CacheTtl::from)
    }
}

impl From<Option<Duration>> for CacheTtl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(CacheTtl::Persist, CacheTtl::Expire)
    }
}

/// Simple key/value cache backend.
pub trait CacheStore: Send + Sync {
    fn has(&self, key: &str) -> impl Future<Output = DbResult<bool>> + Send;

    fn get(&self, key: &str) -> impl Future<Output = DbResult<Option<String>>> + Send;

    fn set(
        &self,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> impl Future<Output = DbResult<()>> + Send;
}

/// An entry of an item-pool cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheItem {
    key: String,
    value: Option<String>,
    expires_after: Option<Duration>,
}

impl CacheItem {
    /// A miss for `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    /// A hit for `key` holding `value`.
    pub fn hit(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(key).set(value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn is_hit(&self) -> bool {
        self.value.is_some()
    }

    pub fn get(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn into_value(self) -> Option<String> {
        self.value
    }

    pub fn set(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn expires_after(mut self, ttl: Option<Duration>) -> Self {
        self.expires_after = ttl;
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.expires_after
    }
}

/// Item-pool cache backend: items are fetched, filled and saved back.
pub trait CachePool: Send + Sync {
    fn get_item(&self, key: &str) -> impl Future<Output = DbResult<CacheItem>> + Send;

    fn has_item(&self, key: &str) -> impl Future<Output = DbResult<bool>> + Send;

    fn save(&self, item: CacheItem) -> impl Future<Output = DbResult<()>> + Send;
}

/// Adapts a [`CachePool`] to the [`CacheStore`] interface.
#[derive(Debug, Clone)]
pub struct PoolStore<P> {
    pool: P,
}

impl<P: CachePool> PoolStore<P> {
    pub fn new(pool: P) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }
}

impl<P: CachePool> CacheStore for PoolStore<P> {
    async fn has(&self, key: &str) -> DbResult<bool> {
        self.pool.has_item(key).await
    }

    async fn get(&self, key: &str) -> DbResult<Option<String>> {
        let item = self.pool.get_item(key).await?;
        Ok(item.into_value())
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> DbResult<()> {
        let item = self.pool.get_item(key).await?;
        self.pool.save(item.set(value).expires_after(ttl)).await
    }
}

/// The store used when no cache is configured. Never hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl CacheStore for NoCache {
    async fn has(&self, _key: &str) -> DbResult<bool> {
        Ok(false)
    }

    async fn get(&self, _key: &str) -> DbResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) -> DbResult<()> {
        Ok(())
    }
}

/// `prefix` + hex SHA-256 of the SQL text followed by the parameters as JSON
/// sorted by name.
pub fn cache_key(prefix: &str, rendered: &Rendered) -> DbResult<String> {
    let params = serde_json::to_string(&rendered.params.snapshot())?;
    let mut hasher = Sha256::new();
    hasher.update(rendered.sql.as_bytes());
    hasher.update(params.as_bytes());
    Ok(format!("{prefix}{}", hex::encode(hasher.finalize())))
}

/// Read-through fetch: serve from `store` when the key is present, otherwise
/// run `exec`, store its result and return it.
///
/// `exec` runs directly when there is no store or `ttl` is
/// [`CacheTtl::Bypass`]. Cache backend errors are returned, never masked by
/// falling back to the database.
pub async fn fetch_with_cache<C, T, F, Fut>(
    store: Option<&C>,
    key_prefix: &str,
    rendered: &Rendered,
    ttl: CacheTtl,
    exec: F,
) -> DbResult<T>
where
    C: CacheStore,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = DbResult<T>>,
{
    let store = match store {
        Some(store) if !ttl.is_bypass() => store,
        _ => return exec().await,
    };

    let key = cache_key(key_prefix, rendered)?;
    if store.has(&key).await? {
        if let Some(cached) = store.get(&key).await? {
            #[cfg(feature = "tracing")]
            tracing::trace!(target: "sqlstmt.cache", key = %key, "cache hit");
            return Ok(serde_json::from_str(&cached)?);
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!(target: "sqlstmt.cache", key = %key, "cache miss");
    let value = exec().await?;
    store
        .set(&key, serde_json::to_string(&value)?, ttl.expires_after())
        .await?;
    Ok(value)
}

#[cfg(test)]
mod tests;
