//! Predicate collections for WHERE, HAVING and join ON clauses.
//!
//! A [`Predicates`] value is an ordered list of [`Predicate`] items that
//! renders as an `AND`-joined boolean expression:
//!
//! ```ignore
//! use sqlstmt::{Predicate, Predicates};
//!
//! let filter = Predicates::from([("status", "active")])
//!     .and(Predicate::is_in("role", ["admin", "owner"]))
//!     .and("created_at > NOW() - INTERVAL 1 DAY");
//! // `status`=:p0 AND `role` IN (:p1,:p2) AND created_at > NOW() - INTERVAL 1 DAY
//! ```
//!
//! Column-keyed items are keyed by their column text: merging a second
//! collection replaces an item with the same column in place, while raw
//! fragments always append. Merging an empty collection resets the clause.

use crate::sql::RawSql;
use crate::stmt::{RenderCtx, Select};
use crate::value::{Operand, Value};

/// A single boolean condition.
///
/// Build with the constructors rather than the variants directly; they
/// normalise `NULL` values into [`Predicate::IsNull`] and nested selects
/// into [`Predicate::SubSelect`].
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Emitted verbatim.
    Raw(RawSql),
    /// `` `column`=:p0 ``, or `column :p0` when the column text contains a space.
    Eq { column: String, value: Operand },
    /// `` `column` IS NULL ``, or the column text alone when it contains a space.
    IsNull { column: String },
    /// `` `column` IN (:p0,:p1) ``, or `` `column` IN (<subquery>) ``.
    In { column: String, values: Vec<Operand> },
    /// `` `column` = (<subquery>) ``, or `column (<subquery>)` when the column text contains a space.
    SubSelect { column: String, select: Box<Select> },
}

impl Predicate {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Operand>) -> Self {
        let column = column.into();
        match value.into() {
            Operand::Value(Value::Null) => Predicate::IsNull { column },
            Operand::Select(select) => Predicate::SubSelect { column, select },
            value => Predicate::Eq { column, value },
        }
    }

    /// `column IS NULL`.
    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull {
            column: column.into(),
        }
    }

    /// `column IN (...)`.
    pub fn is_in<I>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Operand>,
    {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// `column IN (<subquery>)`.
    pub fn in_select(column: impl Into<String>, select: Select) -> Self {
        Predicate::In {
            column: column.into(),
            values: vec![Operand::Select(Box::new(select))],
        }
    }

    /// A caller-written condition.
    pub fn raw(sql: impl Into<RawSql>) -> Self {
        Predicate::Raw(sql.into())
    }

    /// The merge key: the column text, or `None` for raw fragments.
    pub fn column(&self) -> Option<&str> {
        match self {
            Predicate::Raw(_) => None,
            Predicate::Eq { column, .. }
            | Predicate::IsNull { column }
            | Predicate::In { column, .. }
            | Predicate::SubSelect { column, .. } => Some(column),
        }
    }

    pub(crate) fn render(&self, ctx: &mut RenderCtx, parameterize: bool) -> String {
        match self {
            Predicate::In { values, .. } if values.is_empty() => "1=0".to_string(),
            Predicate::In { column, values } => {
                format!("{} IN ({})", ctx.quote(column), render_membership(ctx, values))
            }
            Predicate::SubSelect { column, select } => render_sub_select(ctx, column, select),
            Predicate::Eq {
                column,
                value: Operand::Select(select),
            } => render_sub_select(ctx, column, select),
            Predicate::Raw(raw) => ctx.merge_raw(raw),
            Predicate::IsNull { column }
            | Predicate::Eq {
                column,
                value: Operand::Value(Value::Null),
            } => {
                if column.contains(' ') {
                    column.clone()
                } else {
                    format!("{} IS NULL", ctx.quote(column))
                }
            }
            Predicate::Eq { column, value } => {
                let rhs = if parameterize {
                    ctx.prepare_value(value)
                } else {
                    literal(ctx, value)
                };
                if column.contains(' ') {
                    format!("{column} {rhs}")
                } else {
                    format!("{}={rhs}", ctx.quote(column))
                }
            }
        }
    }
}

fn render_sub_select(ctx: &mut RenderCtx, column: &str, select: &Select) -> String {
    let sub = ctx.merge_sub_select(select);
    if column.contains(' ') {
        format!("{column} ({sub})")
    } else {
        format!("{} = ({sub})", ctx.quote(column))
    }
}

fn literal(ctx: &mut RenderCtx, value: &Operand) -> String {
    match value {
        Operand::Value(v) => v.to_literal(),
        other => ctx.prepare_value(other),
    }
}

/// Render the inside of an `IN (...)` list.
///
/// When any element is a nested select, that select alone is rendered and
/// the sibling elements are dropped without allocating placeholders.
fn render_membership(ctx: &mut RenderCtx, values: &[Operand]) -> String {
    if let Some(select) = values.iter().find_map(|v| match v {
        Operand::Select(select) => Some(select),
        _ => None,
    }) {
        #[cfg(feature = "tracing")]
        if values.len() > 1 {
            tracing::warn!(
                target: "sqlstmt.sql",
                dropped = values.len() - 1,
                "IN list mixes a sub-select with other values; only the sub-select is rendered"
            );
        }
        return ctx.merge_sub_select(select);
    }
    values
        .iter()
        .map(|v| ctx.prepare_value(v))
        .collect::<Vec<_>>()
        .join(",")
}

/// An ordered, AND-joined collection of predicates.
#[derive(Debug, Clone, Default)]
pub struct Predicates {
    items: Vec<Predicate>,
}

impl Predicates {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate (builder style).
    pub fn and(mut self, predicate: impl Into<Predicate>) -> Self {
        self.push(predicate.into());
        self
    }

    /// Add a predicate, replacing an existing item keyed by the same column.
    pub fn push(&mut self, predicate: Predicate) {
        let existing = predicate
            .column()
            .and_then(|col| self.items.iter().position(|p| p.column() == Some(col)));
        match existing {
            Some(pos) => self.items[pos] = predicate,
            None => self.items.push(predicate),
        }
    }

    /// Merge `other` into this collection. An empty `other` resets it.
    pub fn merge(&mut self, other: Predicates) {
        if other.is_empty() {
            self.items.clear();
            return;
        }
        for predicate in other.items {
            self.push(predicate);
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.items.iter()
    }

    /// Render as `prefix` + `AND`-joined terms, or an empty string when the
    /// collection is empty.
    pub(crate) fn render(&self, ctx: &mut RenderCtx, parameterize: bool, prefix: &str) -> String {
        if self.items.is_empty() {
            return String::new();
        }
        let terms: Vec<String> = self
            .items
            .iter()
            .map(|p| p.render(ctx, parameterize))
            .collect();
        format!("{prefix}{}", terms.join(" AND "))
    }
}

impl From<&str> for Predicate {
    fn from(sql: &str) -> Self {
        Predicate::raw(sql)
    }
}

impl From<String> for Predicate {
    fn from(sql: String) -> Self {
        Predicate::raw(sql)
    }
}

impl From<RawSql> for Predicate {
    fn from(sql: RawSql) -> Self {
        Predicate::Raw(sql)
    }
}

impl<K: Into<String>, V: Into<Operand>> From<(K, V)> for Predicate {
    fn from((column, value): (K, V)) -> Self {
        Predicate::eq(column, value)
    }
}

impl From<Predicate> for Predicates {
    fn from(predicate: Predicate) -> Self {
        Predicates::new().and(predicate)
    }
}

/// An empty string is an empty collection.
impl From<&str> for Predicates {
    fn from(sql: &str) -> Self {
        if sql.is_empty() {
            return Predicates::new();
        }
        Predicates::new().and(Predicate::raw(sql))
    }
}

impl From<String> for Predicates {
    fn from(sql: String) -> Self {
        Predicates::from(sql.as_str())
    }
}

impl From<RawSql> for Predicates {
    fn from(sql: RawSql) -> Self {
        Predicates::new().and(Predicate::Raw(sql))
    }
}

impl From<Vec<Predicate>> for Predicates {
    fn from(items: Vec<Predicate>) -> Self {
        items.into_iter().collect()
    }
}

impl<const N: usize> From<[Predicate; N]> for Predicates {
    fn from(items: [Predicate; N]) -> Self {
        items.into_iter().collect()
    }
}

impl<K: Into<String>, V: Into<Operand>> From<Vec<(K, V)>> for Predicates {
    fn from(pairs: Vec<(K, V)>) -> Self {
        pairs.into_iter().map(Predicate::from).collect()
    }
}

impl<const N: usize, K: Into<String>, V: Into<Operand>> From<[(K, V); N]> for Predicates {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().map(Predicate::from).collect()
    }
}

impl<P: Into<Predicates>> From<Option<P>> for Predicates {
    fn from(value: Option<P>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl FromIterator<Predicate> for Predicates {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        let mut predicates = Predicates::new();
        for predicate in iter {
            predicates.push(predicate);
        }
        predicates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SqlStyle;
    use crate::stmt::WhereClause;

    fn render(predicates: &Predicates, parameterize: bool) -> (String, RenderCtx) {
        let mut ctx = RenderCtx::new(SqlStyle::default());
        let sql = predicates.render(&mut ctx, parameterize, "");
        (sql, ctx)
    }

    #[test]
    fn empty_renders_nothing() {
        let mut ctx = RenderCtx::new(SqlStyle::default());
        assert_eq!(Predicates::new().render(&mut ctx, true, "\r\nWHERE "), "");
    }

    #[test]
    fn equality_and_raw_lhs() {
        let p = Predicates::from([("age", 30)]).and(Predicate::eq("score >", 18));
        let (sql, ctx) = render(&p, true);
        assert_eq!(sql, "`age`=:p0 AND score > :p1");
        assert_eq!(ctx.params.len(), 2);
    }

    #[test]
    fn null_tests() {
        let p = Predicates::new()
            .and(Predicate::eq("deleted_at", None::<i64>))
            .and(Predicate::is_null("parent_id IS NOT NULL"));
        let (sql, ctx) = render(&p, true);
        assert_eq!(sql, "`deleted_at` IS NULL AND parent_id IS NOT NULL");
        assert!(ctx.params.is_empty());
    }

    #[test]
    fn membership_list() {
        let p = Predicates::from(Predicate::is_in("id", [1, 2, 3]));
        let (sql, ctx) = render(&p, true);
        assert_eq!(sql, "`id` IN (:p0,:p1,:p2)");
        assert_eq!(ctx.params.len(), 3);
    }

    #[test]
    fn empty_membership_is_false() {
        let p = Predicates::from(Predicate::is_in("id", Vec::<i64>::new()));
        let (sql, ctx) = render(&p, true);
        assert_eq!(sql, "1=0");
        assert!(ctx.params.is_empty());
    }

    #[test]
    fn membership_with_sub_select_drops_siblings() {
        let mut sub = Select::new("banned");
        sub.fields("user_id").unwrap();
        sub.filter([("reason", "spam")]).unwrap();

        let p = Predicates::from(Predicate::is_in(
            "id",
            vec![Operand::from(7), Operand::from(sub), Operand::from(8)],
        ));
        let (sql, ctx) = render(&p, true);
        assert_eq!(
            sql,
            "`id` IN (SELECT user_id FROM banned\r\nWHERE `reason`=:p0)"
        );
        assert_eq!(ctx.params.len(), 1);
        assert_eq!(ctx.params.get(":p0"), Some(&Value::from("spam")));
    }

    #[test]
    fn sub_select_equality() {
        let mut sub = Select::new("groups");
        sub.fields("MAX(id)").unwrap();
        let p = Predicates::new()
            .and(Predicate::eq("group_id", sub.clone()))
            .and(Predicate::eq("owner_id >=", sub));
        let (sql, _) = render(&p, true);
        assert_eq!(
            sql,
            "`group_id` = (SELECT MAX(id) FROM groups) AND owner_id >= (SELECT MAX(id) FROM groups)"
        );
    }

    #[test]
    fn unparameterized_emits_literals() {
        let p = Predicates::from([("a.id", "b.a_id")]).and(Predicate::eq("b.active", true));
        let (sql, ctx) = render(&p, false);
        assert_eq!(sql, "a.id=b.a_id AND b.active=1");
        assert!(ctx.params.is_empty());
    }

    #[test]
    fn merge_replaces_by_column_and_resets_on_empty() {
        let mut p = Predicates::from([("a", 1), ("b", 2)]);
        p.merge(Predicates::from([("a", 3)]).and("c > 0"));
        let (sql, ctx) = render(&p, true);
        assert_eq!(sql, "`a`=:p0 AND `b`=:p1 AND c > 0");
        assert_eq!(ctx.params.get(":p0"), Some(&Value::Int(3)));

        p.merge(Predicates::new());
        assert!(p.is_empty());
    }

    #[test]
    fn rendering_is_idempotent() {
        let p = Predicates::from([("a", 1), ("b", 2)]).and("c IS NOT NULL");
        let (first, _) = render(&p, true);
        let (second, _) = render(&p, true);
        assert_eq!(first, second);
        assert_eq!(first.matches(" AND ").count() + 1, p.len());
    }
}
