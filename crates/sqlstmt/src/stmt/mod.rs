//! Statement builders.
//!
//! Every builder follows the same life cycle: mutators are called on a
//! `&mut` builder, the first call to [`Statement::render`] (or `to_string`,
//! or execution) renders the SQL text and placeholder table once, and from
//! then on the statement is frozen. Any mutator called on a frozen statement
//! returns [`DbError::Frozen`].
//!
//! ```ignore
//! use sqlstmt::{Select, Statement, WhereClause};
//!
//! let mut q = Select::new("users");
//! q.fields(["id", "name"])?.filter([("active", true)])?.limit(10)?;
//! assert_eq!(q.to_sql(), "SELECT id,name FROM users\r\nWHERE `active`=:p0\r\nLIMIT 10 ;");
//! assert!(q.limit(20).is_err());
//! ```

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::OnceLock;

use crate::cache::CacheStore;
use crate::config::SqlStyle;
use crate::db::Db;
use crate::driver::{Driver, ResultSet};
use crate::error::{DbError, DbResult};
use crate::ident;
use crate::join::{JoinKind, Joins};
use crate::param::Params;
use crate::predicate::Predicates;
use crate::sql::RawSql;
use crate::value::Operand;

macro_rules! impl_statement {
    ($ty:ty, $kind:expr) => {
        impl $crate::stmt::Statement for $ty {
            fn kind(&self) -> $crate::stmt::StatementKind {
                $kind
            }

            fn render(&self) -> &$crate::stmt::Rendered {
                self.rendered.get_or_init(|| self.build())
            }

            fn is_frozen(&self) -> bool {
                self.rendered.get().is_some()
            }
        }

        impl ::std::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(&$crate::stmt::Statement::render(self).sql)
            }
        }
    };
}

mod delete;
mod insert;
mod select;
mod update;


pub use delete::Delete;
pub use insert::{Insert, Row};
pub use select::{Columns, Field, Fields, Limit, Select, paginate};
pub use update::Update;

/// Statement variant, used in logs and frozen-statement errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The frozen output of a statement: SQL text plus its placeholder table.
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub sql: String,
    pub params: Params,
}

/// Common interface of the four statement builders.
pub trait Statement {
    fn kind(&self) -> StatementKind;

    /// Render once and freeze; later calls return the memoized output.
    fn render(&self) -> &Rendered;

    fn is_frozen(&self) -> bool;

    fn to_sql(&self) -> &str {
        &self.render().sql
    }

    fn params(&self) -> &Params {
        &self.render().params
    }
}

pub(crate) fn ensure_mutable(rendered: &OnceLock<Rendered>, kind: StatementKind) -> DbResult<()> {
    if rendered.get().is_some() {
        return Err(DbError::Frozen {
            statement: kind.as_str(),
        });
    }
    Ok(())
}

/// WHERE clause mutator shared by SELECT, UPDATE and DELETE.
pub trait WhereClause: Sized {
    /// The WHERE predicates, or [`DbError::Frozen`] once rendered.
    fn where_mut(&mut self) -> DbResult<&mut Predicates>;

    /// Merge predicates into the WHERE clause; an empty collection resets it.
    fn filter(&mut self, predicates: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.where_mut()?.merge(predicates.into());
        Ok(self)
    }
}

/// Join mutators shared by SELECT and UPDATE.
pub trait JoinClause: Sized {
    /// The join list, or [`DbError::Frozen`] once rendered.
    fn joins_mut(&mut self) -> DbResult<&mut Joins>;

    /// Add a comma join; `None` clears all comma joins.
    fn self_join(&mut self, target: Option<&str>) -> DbResult<&mut Self> {
        self.joins_mut()?.add_self_join(target);
        Ok(self)
    }

    /// Add a typed join. An empty `on` renders a bare join.
    fn join(
        &mut self,
        kind: JoinKind,
        target: &str,
        on: impl Into<Predicates>,
    ) -> DbResult<&mut Self> {
        self.joins_mut()?.add(kind, target, on.into());
        Ok(self)
    }

    fn inner_join(&mut self, target: &str, on: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.join(JoinKind::Inner, target, on)
    }

    fn left_join(&mut self, target: &str, on: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.join(JoinKind::Left, target, on)
    }

    fn right_join(&mut self, target: &str, on: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.join(JoinKind::Right, target, on)
    }

    fn full_join(&mut self, target: &str, on: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.join(JoinKind::Full, target, on)
    }

    fn full_outer_join(&mut self, target: &str, on: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.join(JoinKind::FullOuter, target, on)
    }
}

/// Statements that can be sent to the database through a [`Db`].
pub trait Executable: Statement + Sync {
    /// Whether `exec` wraps the statement in the retrying transaction runner.
    fn uses_transaction(&self) -> bool {
        false
    }

    /// Execute the statement, inside a transaction when
    /// [`uses_transaction`](Executable::uses_transaction) is set. A pending
    /// prefix applies to every attempt.
    fn exec<D: Driver, C: CacheStore>(
        &self,
        db: &Db<D, C>,
    ) -> impl Future<Output = DbResult<ResultSet>> + Send
    where
        Self: Sized,
    {
        async move {
            let prefix = db.take_prefix();
            let prefix = prefix.as_deref();
            if self.uses_transaction() {
                db.transaction(|| db.execute_with_prefix(self, prefix))
                    .await
            } else {
                db.execute_with_prefix(self, prefix).await
            }
        }
    }
}

/// Ordered `column = operand` pairs: UPDATE sets, INSERT rows and
/// `ON DUPLICATE KEY UPDATE` values.
#[derive(Debug, Clone, Default)]
pub struct Assignments {
    items: Vec<(String, Operand)>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pair (builder style), replacing an earlier pair for the same column.
    pub fn and(mut self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Operand>) {
        let column = column.into();
        let value = value.into();
        match self.items.iter_mut().find(|(c, _)| *c == column) {
            Some(item) => item.1 = value,
            None => self.items.push((column, value)),
        }
    }

    /// Merge `other`; an empty `other` resets the list.
    pub fn merge(&mut self, other: Assignments) {
        if other.is_empty() {
            self.items.clear();
            return;
        }
        for (column, value) in other.items {
            self.insert(column, value);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|(c, _)| c.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Operand> {
        self.items.iter().map(|(_, v)| v)
    }

    /// `` `a`=:p0,`b`=:p1 ``
    pub(crate) fn render_pairs(&self, ctx: &mut RenderCtx) -> String {
        let mut out = Vec::with_capacity(self.items.len());
        for (column, value) in &self.items {
            let value = ctx.prepare_value(value);
            out.push(format!("{}={value}", ctx.quote(column)));
        }
        out.join(",")
    }
}

impl<K: Into<String>, V: Into<Operand>> From<Vec<(K, V)>> for Assignments {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().collect()
    }
}

impl<const N: usize, K: Into<String>, V: Into<Operand>> From<[(K, V); N]> for Assignments {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Operand>> FromIterator<(K, V)> for Assignments {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut assignments = Assignments::new();
        for (column, value) in iter {
            assignments.insert(column, value);
        }
        assignments
    }
}

/// Mutable state threaded through one render: the style in effect and the
/// placeholder table being filled.
#[derive(Debug)]
pub(crate) struct RenderCtx {
    pub(crate) style: SqlStyle,
    pub(crate) params: Params,
}

impl RenderCtx {
    pub(crate) fn new(style: SqlStyle) -> Self {
        Self {
            style,
            params: Params::new(),
        }
    }

    pub(crate) fn quote<'t>(&self, token: &'t str) -> Cow<'t, str> {
        ident::quote(token, self.style.ident_quote)
    }

    /// The shared value preparer: scalars become placeholders, raw SQL is
    /// emitted verbatim with its parameters merged, selects are merged and
    /// parenthesised.
    pub(crate) fn prepare_value(&mut self, value: &Operand) -> String {
        match value {
            Operand::Value(v) => self.params.allocate(v.clone()),
            Operand::Sql(raw) => self.merge_raw(raw),
            Operand::Select(select) => format!("({})", self.merge_sub_select(select)),
        }
    }

    pub(crate) fn merge_raw(&mut self, raw: &RawSql) -> String {
        for (name, value) in raw.params().iter() {
            self.params.set(name, value.clone());
        }
        raw.as_str().to_string()
    }

    /// Render `select` in this context's style with placeholder numbering
    /// continuing from this context, absorb its parameters, and return its
    /// text without the trailing `;`.
    pub(crate) fn merge_sub_select(&mut self, select: &Select) -> String {
        let mut child = RenderCtx {
            style: self.style,
            params: self.params.fork(),
        };
        let sql = select.render_into(&mut child);
        self.params.absorb(child.params);
        sql.trim_end_matches(';').to_string()
    }
}
