//! The database facade: builder factories, execution and transactions over
//! one driver and an optional result cache.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use crate::cache::{CacheStore, NoCache};
use crate::config::{DbConfig, TransactionConfig};
use crate::driver::{Driver, ResultSet};
use crate::error::DbResult;
use crate::exec;
use crate::sql::RawSql;
use crate::stmt::{Delete, Insert, Select, Statement, Update};
use crate::transaction::TransactionRunner;
use crate::value::Value;

/// Entry point tying a [`Driver`], a [`DbConfig`] and an optional
/// [`CacheStore`] together.
///
/// ```ignore
/// use sqlstmt::{Db, DbConfig, MemoryStore, WhereClause};
///
/// let db = Db::new(driver).with_cache(MemoryStore::default());
/// let mut q = db.select("users");
/// q.filter([("id", 7)])?;
/// let user = q.fetch(&db, 60).await?;
/// ```
#[derive(Debug)]
pub struct Db<D, C = NoCache> {
    driver: D,
    cache: Option<C>,
    config: DbConfig,
    prefix: Mutex<Option<String>>,
}

impl<D: Driver> Db<D, NoCache> {
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, DbConfig::default())
    }

    pub fn with_config(driver: D, config: DbConfig) -> Self {
        Self {
            driver,
            cache: None,
            config,
            prefix: Mutex::new(None),
        }
    }
}

impl<D: Driver, C: CacheStore> Db<D, C> {
    /// Attach a result cache used by the select fetch family.
    pub fn with_cache<S: CacheStore>(self, cache: S) -> Db<D, S> {
        Db {
            driver: self.driver,
            cache: Some(cache),
            config: self.config,
            prefix: self.prefix,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&C> {
        self.cache.as_ref()
    }

    pub fn select(&self, table: impl Into<String>) -> Select {
        Select::styled(table, self.config.style)
    }

    pub fn insert(&self, table: impl Into<String>) -> Insert {
        Insert::styled(table, self.config.style)
    }

    pub fn update(&self, table: impl Into<String>) -> Update {
        Update::styled(table, self.config.style)
    }

    pub fn delete(&self, table: impl Into<String>) -> Delete {
        Delete::styled(table, self.config.style)
    }

    /// A raw fragment with its named parameters bound.
    pub fn sql<K, V>(
        &self,
        text: impl Into<String>,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> DbResult<RawSql>
    where
        K: AsRef<str>,
        V: Into<Value>,
    {
        params
            .into_iter()
            .try_fold(RawSql::new(text), |raw, (name, value)| {
                raw.bind(name.as_ref(), value)
            })
    }

    /// Set a one-shot prefix (e.g. `EXPLAIN `) for the next executed
    /// statement. `None` clears a pending prefix.
    pub fn prefix(&self, prefix: Option<&str>) {
        *self.lock_prefix() = prefix.map(str::to_string);
    }

    pub(crate) fn take_prefix(&self) -> Option<String> {
        self.lock_prefix().take()
    }

    fn lock_prefix(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.prefix.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Render (freezing) and execute `stmt`, consuming a pending prefix.
    pub async fn execute<S: Statement + Sync + ?Sized>(&self, stmt: &S) -> DbResult<ResultSet> {
        let prefix = self.take_prefix();
        self.execute_with_prefix(stmt, prefix.as_deref()).await
    }

    /// Execute `stmt` with a prefix already taken off the facade, so every
    /// retry of one call sees the same prefix.
    pub(crate) async fn execute_with_prefix<S: Statement + Sync + ?Sized>(
        &self,
        stmt: &S,
        prefix: Option<&str>,
    ) -> DbResult<ResultSet> {
        exec::execute(
            &self.driver,
            Some(stmt.kind()),
            stmt.render(),
            prefix,
            &self.config,
        )
        .await
    }

    /// Execute a raw fragment.
    pub async fn execute_raw(&self, raw: &RawSql) -> DbResult<ResultSet> {
        let prefix = self.take_prefix();
        let rendered = crate::stmt::Rendered {
            sql: raw.as_str().to_string(),
            params: raw.params().clone(),
        };
        exec::execute(&self.driver, None, &rendered, prefix.as_deref(), &self.config).await
    }

    /// Run `work` in a retried transaction with the configured defaults.
    pub async fn transaction<T, F, Fut>(&self, work: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        self.transaction_with(self.config.transaction.clone(), work)
            .await
    }

    pub async fn transaction_with<T, F, Fut>(
        &self,
        config: TransactionConfig,
        work: F,
    ) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        TransactionRunner::new(&self.driver, config).run(work).await
    }

    pub async fn last_insert_id(&self) -> DbResult<Option<String>> {
        self.driver.last_insert_id().await
    }
}
