//! The select fetch family. Every flavour goes through the read-through
//! cache with the whole [`ResultSet`] as the cached value, so they share one
//! entry per rendered query. A pending [`Db::prefix`] bypasses the cache.

use serde::de::DeserializeOwned;

use crate::cache::{CacheStore, CacheTtl, fetch_with_cache};
use crate::db::Db;
use crate::driver::{Driver, Record, ResultSet};
use crate::error::DbResult;
use crate::stmt::{Select, Statement};
use crate::value::Value;

impl Select {
    async fn fetch_result<D: Driver, C: CacheStore>(
        &self,
        db: &Db<D, C>,
        ttl: CacheTtl,
    ) -> DbResult<ResultSet> {
        // Prefixed results are never read from or written to the cache.
        if let Some(prefix) = db.take_prefix() {
            return db.execute_with_prefix(self, Some(&prefix)).await;
        }
        fetch_with_cache(
            db.cache(),
            &db.config().cache_key_prefix,
            self.render(),
            ttl,
            || db.execute_with_prefix(self, None),
        )
        .await
    }

    /// All rows.
    pub async fn fetch_all<D: Driver, C: CacheStore>(
        &self,
        db: &Db<D, C>,
        ttl: impl Into<CacheTtl>,
    ) -> DbResult<Vec<Record>> {
        Ok(self.fetch_result(db, ttl.into()).await?.records())
    }

    /// The first row, if any.
    pub async fn fetch<D: Driver, C: CacheStore>(
        &self,
        db: &Db<D, C>,
        ttl: impl Into<CacheTtl>,
    ) -> DbResult<Option<Record>> {
        Ok(self.fetch_result(db, ttl.into()).await?.record(0))
    }

    /// Column `index` of the first row.
    pub async fn fetch_column<D: Driver, C: CacheStore>(
        &self,
        db: &Db<D, C>,
        index: usize,
        ttl: impl Into<CacheTtl>,
    ) -> DbResult<Option<Value>> {
        let result = self.fetch_result(db, ttl.into()).await?;
        Ok(result.first_column(index).cloned())
    }

    /// The first row mapped onto `T` by column name.
    pub async fn fetch_as<T, D, C>(
        &self,
        db: &Db<D, C>,
        ttl: impl Into<CacheTtl>,
    ) -> DbResult<Option<T>>
    where
        T: DeserializeOwned,
        D: Driver,
        C: CacheStore,
    {
        self.fetch(db, ttl)
            .await?
            .map(|record| record.to_typed())
            .transpose()
    }

    pub async fn fetch_all_as<T, D, C>(
        &self,
        db: &Db<D, C>,
        ttl: impl Into<CacheTtl>,
    ) -> DbResult<Vec<T>>
    where
        T: DeserializeOwned,
        D: Driver,
        C: CacheStore,
    {
        self.fetch_result(db, ttl.into()).await?.to_typed()
    }
}
