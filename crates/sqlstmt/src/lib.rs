//! # sqlstmt
//!
//! Composable SQL statement builders with an execution layer on top.
//!
//! ## Features
//!
//! - **Frozen rendering**: a statement renders its SQL and placeholder table once;
//!   any later mutation is a [`DbError::Frozen`] error
//! - **Placeholders everywhere**: values become `:p0`, `:p1`, ... with numbering that
//!   stays unique across merged sub-selects
//! - **Sub-selects**: any [`Select`] can be used as a value, a projection or an IN list
//! - **Retrying transactions**: transient failures (serialization conflicts) are retried
//!   with a constant delay, everything else propagates unchanged
//! - **Read-through cache**: select fetches can be served from a [`CacheStore`]
//! - **Postgres driver**: [`PgDriver`] over `tokio-postgres` (feature `postgres`)
//!
//! ## Statements
//!
//! ```ignore
//! use sqlstmt::{Db, JoinClause, Statement, WhereClause, sql};
//!
//! let db = Db::new(driver);
//!
//! // SELECT
//! let mut q = db.select("users u");
//! q.fields([("u.id", "id"), ("u.name", "name")])?
//!     .left_join("orders o", "o.user_id = u.id")?
//!     .filter([("u.status", "active")])?
//!     .order_by("u.created_at DESC")?
//!     .limit(10)?
//!     .page(Some(2))?;
//! let users = q.fetch_all(&db, 60).await?;
//!
//! // INSERT
//! let mut ins = db.insert("users");
//! ins.values([("name", "alice"), ("email", "alice@example.com")])?;
//! ins.exec(&db).await?;
//!
//! // UPDATE
//! let mut up = db.update("users");
//! up.set([("visits", sql("visits + 1"))])?.filter([("id", 7)])?;
//! up.exec(&db).await?;
//!
//! // DELETE
//! let mut del = db.delete("sessions");
//! del.filter("expires_at < NOW()")?;
//! del.exec(&db).await?;
//! ```

pub mod cache;
pub mod config;
pub mod db;
pub mod driver;
pub mod error;
pub mod exec;
mod fetch;
pub mod ident;
pub mod join;
pub mod param;
pub mod predicate;
pub mod sql;
pub mod stmt;
pub mod transaction;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

pub use cache::{
    CacheItem, CachePool, CacheStore, CacheTtl, MemoryStore, NoCache, PoolStore, cache_key,
    fetch_with_cache,
};
pub use config::{DbConfig, LimitForm, SqlStyle, TransactionConfig};
pub use db::Db;
pub use driver::{Driver, Record, ResultSet};
pub use error::{DbError, DbResult, DriverError, DriverErrorKind};
pub use join::JoinKind;
pub use param::Params;
pub use predicate::{Predicate, Predicates};
pub use sql::{RawSql, sql};
pub use stmt::{
    Assignments, Columns, Delete, Executable, Field, Fields, Insert, JoinClause, Limit, Rendered,
    Row, Select, Statement, StatementKind, Update, WhereClause,
};
pub use transaction::{FailureClass, TransactionRunner, classify};
pub use value::{BindType, Operand, Value};

#[cfg(feature = "postgres")]
pub use pg::PgDriver;
