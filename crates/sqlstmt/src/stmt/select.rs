use std::sync::OnceLock;

use super::{Executable, JoinClause, RenderCtx, Rendered, StatementKind, WhereClause, ensure_mutable};
use crate::config::{LimitForm, SqlStyle};
use crate::error::DbResult;
use crate::join::Joins;
use crate::predicate::Predicates;

/// One entry of a projection list.
#[derive(Debug, Clone)]
pub enum Field {
    /// A bare column or expression, emitted as-is.
    Expr(String),
    /// `` `column` AS `alias` ``.
    Alias { column: String, alias: String },
    /// `(<subquery>) AS alias`, with the alias quoted.
    Sub { alias: String, select: Box<Select> },
}

impl Field {
    pub fn expr(expr: impl Into<String>) -> Self {
        Field::Expr(expr.into())
    }

    pub fn alias(column: impl Into<String>, alias: impl Into<String>) -> Self {
        Field::Alias {
            column: column.into(),
            alias: alias.into(),
        }
    }

    pub fn sub(alias: impl Into<String>, select: Select) -> Self {
        Field::Sub {
            alias: alias.into(),
            select: Box::new(select),
        }
    }

    fn key(&self) -> Option<&str> {
        match self {
            Field::Expr(_) => None,
            Field::Alias { column, .. } => Some(column),
            Field::Sub { alias, .. } => Some(alias),
        }
    }

    fn render(&self, ctx: &mut RenderCtx) -> String {
        match self {
            Field::Expr(expr) => expr.clone(),
            Field::Alias { column, alias } => {
                format!("{} AS {}", ctx.quote(column), ctx.quote(alias))
            }
            Field::Sub { alias, select } => {
                let sub = ctx.merge_sub_select(select);
                format!("({sub}) AS {}", ctx.quote(alias))
            }
        }
    }
}

/// A projection list. Empty renders as `*`.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    items: Vec<Field>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, field: Field) -> Self {
        self.push(field);
        self
    }

    /// Add a field; aliased fields replace an earlier field with the same key.
    pub fn push(&mut self, field: Field) {
        let existing = field
            .key()
            .and_then(|key| self.items.iter().position(|f| f.key() == Some(key)));
        match existing {
            Some(pos) => self.items[pos] = field,
            None => self.items.push(field),
        }
    }

    pub fn merge(&mut self, other: Fields) {
        if other.is_empty() {
            self.items.clear();
            return;
        }
        for field in other.items {
            self.push(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    fn render(&self, ctx: &mut RenderCtx) -> String {
        if self.items.is_empty() {
            return "*".to_string();
        }
        self.items
            .iter()
            .map(|f| f.render(ctx))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromIterator<Field> for Fields {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for field in iter {
            fields.push(field);
        }
        fields
    }
}

impl From<Field> for Fields {
    fn from(field: Field) -> Self {
        Fields::new().and(field)
    }
}

impl From<&str> for Fields {
    fn from(expr: &str) -> Self {
        Fields::new().and(Field::expr(expr))
    }
}

impl From<String> for Fields {
    fn from(expr: String) -> Self {
        Fields::new().and(Field::Expr(expr))
    }
}

impl<const N: usize> From<[&str; N]> for Fields {
    fn from(exprs: [&str; N]) -> Self {
        exprs.into_iter().map(Field::expr).collect()
    }
}

impl From<Vec<&str>> for Fields {
    fn from(exprs: Vec<&str>) -> Self {
        exprs.into_iter().map(Field::expr).collect()
    }
}

impl From<Vec<String>> for Fields {
    fn from(exprs: Vec<String>) -> Self {
        exprs.into_iter().map(Field::Expr).collect()
    }
}

/// `(column, alias)` pairs.
impl<const N: usize> From<[(&str, &str); N]> for Fields {
    fn from(pairs: [(&str, &str); N]) -> Self {
        pairs.into_iter().map(|(c, a)| Field::alias(c, a)).collect()
    }
}

impl From<Vec<(&str, &str)>> for Fields {
    fn from(pairs: Vec<(&str, &str)>) -> Self {
        pairs.into_iter().map(|(c, a)| Field::alias(c, a)).collect()
    }
}

impl<const N: usize> From<[Field; N]> for Fields {
    fn from(fields: [Field; N]) -> Self {
        fields.into_iter().collect()
    }
}

impl From<Vec<Field>> for Fields {
    fn from(fields: Vec<Field>) -> Self {
        fields.into_iter().collect()
    }
}

/// A list of column names or expressions (GROUP BY, ORDER BY).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns(pub Vec<String>);

impl From<&str> for Columns {
    fn from(column: &str) -> Self {
        Columns(vec![column.to_string()])
    }
}

impl From<String> for Columns {
    fn from(column: String) -> Self {
        Columns(vec![column])
    }
}

impl<const N: usize> From<[&str; N]> for Columns {
    fn from(columns: [&str; N]) -> Self {
        Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

impl From<Vec<&str>> for Columns {
    fn from(columns: Vec<&str>) -> Self {
        Columns(columns.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for Columns {
    fn from(columns: Vec<String>) -> Self {
        Columns(columns)
    }
}

impl<C: Into<Columns>> From<Option<C>> for Columns {
    fn from(columns: Option<C>) -> Self {
        columns.map(Into::into).unwrap_or_default()
    }
}

/// The LIMIT value of a select.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Limit {
    #[default]
    Unset,
    /// A row count; combined with a page it becomes `offset, count`.
    Count(u64),
    /// Caller-written limit text, emitted verbatim (e.g. `"10, 20"`).
    Raw(String),
}

impl From<u64> for Limit {
    fn from(n: u64) -> Self {
        Limit::Count(n)
    }
}

impl From<u32> for Limit {
    fn from(n: u32) -> Self {
        Limit::Count(u64::from(n))
    }
}

impl From<usize> for Limit {
    fn from(n: usize) -> Self {
        Limit::Count(n as u64)
    }
}

/// Negative counts clamp to zero.
impl From<i32> for Limit {
    fn from(n: i32) -> Self {
        Limit::Count(u64::try_from(n).unwrap_or(0))
    }
}

impl From<i64> for Limit {
    fn from(n: i64) -> Self {
        Limit::Count(u64::try_from(n).unwrap_or(0))
    }
}

impl From<&str> for Limit {
    fn from(text: &str) -> Self {
        Limit::Raw(text.to_string())
    }
}

impl From<String> for Limit {
    fn from(text: String) -> Self {
        Limit::Raw(text)
    }
}

impl From<Option<u64>> for Limit {
    fn from(n: Option<u64>) -> Self {
        n.map_or(Limit::Unset, Limit::Count)
    }
}

/// The LIMIT clause body for a limit/page pair, or `None` when no clause
/// should be rendered. Offsets are spelled per `style.limit_form`.
///
/// - count and page: offset `count*page`, size `count`
/// - page only: offset `page*default_page_size`, size `default_page_size`
/// - count only: `count`
/// - raw text: the text itself
pub fn paginate(limit: &Limit, page: Option<u64>, style: &SqlStyle) -> Option<String> {
    let (size, offset) = match (limit, page) {
        (Limit::Raw(text), _) if !text.is_empty() => return Some(text.clone()),
        (Limit::Count(n), Some(page)) => (*n, n.saturating_mul(page)),
        (Limit::Count(n), None) => return Some(n.to_string()),
        (_, Some(page)) => (
            style.default_page_size,
            page.saturating_mul(style.default_page_size),
        ),
        (_, None) => return None,
    };
    Some(match style.limit_form {
        LimitForm::OffsetComma => format!("{offset}, {size}"),
        LimitForm::OffsetKeyword => format!("{size} OFFSET {offset}"),
    })
}

/// SELECT statement builder.
#[derive(Debug, Clone)]
pub struct Select {
    table: String,
    style: SqlStyle,
    fields: Fields,
    into: Option<String>,
    filter: Predicates,
    joins: Joins,
    group_by: Vec<String>,
    having: Predicates,
    order_by: Vec<String>,
    limit: Limit,
    page: Option<u64>,
    unions: Vec<Select>,
    union_all: bool,
    rendered: OnceLock<Rendered>,
}

impl_statement!(Select, StatementKind::Select);

impl Select {
    /// Select from `table` with the default style.
    pub fn new(table: impl Into<String>) -> Self {
        Self::styled(table, SqlStyle::default())
    }

    /// Select from `table` with an explicit style.
    pub fn styled(table: impl Into<String>, style: SqlStyle) -> Self {
        Self {
            table: table.into(),
            style,
            fields: Fields::new(),
            into: None,
            filter: Predicates::new(),
            joins: Joins::default(),
            group_by: Vec::new(),
            having: Predicates::new(),
            order_by: Vec::new(),
            limit: Limit::Unset,
            page: None,
            unions: Vec::new(),
            union_all: false,
            rendered: OnceLock::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn style(&self) -> SqlStyle {
        self.style
    }

    fn guard(&self) -> DbResult<()> {
        ensure_mutable(&self.rendered, StatementKind::Select)
    }

    /// Merge into the projection list; empty resets it to `*`.
    pub fn fields(&mut self, fields: impl Into<Fields>) -> DbResult<&mut Self> {
        self.guard()?;
        self.fields.merge(fields.into());
        Ok(self)
    }

    /// `SELECT ... INTO target`; `None` removes it.
    pub fn into_table(&mut self, target: Option<&str>) -> DbResult<&mut Self> {
        self.guard()?;
        self.into = target.map(str::to_string);
        Ok(self)
    }

    /// Append GROUP BY columns; empty resets the list.
    pub fn group_by(&mut self, columns: impl Into<Columns>) -> DbResult<&mut Self> {
        self.guard()?;
        merge_columns(&mut self.group_by, columns.into());
        Ok(self)
    }

    /// Merge into the HAVING predicates; empty resets them.
    pub fn having(&mut self, predicates: impl Into<Predicates>) -> DbResult<&mut Self> {
        self.guard()?;
        self.having.merge(predicates.into());
        Ok(self)
    }

    /// Append ORDER BY columns; empty resets the list.
    pub fn order_by(&mut self, columns: impl Into<Columns>) -> DbResult<&mut Self> {
        self.guard()?;
        merge_columns(&mut self.order_by, columns.into());
        Ok(self)
    }

    pub fn limit(&mut self, limit: impl Into<Limit>) -> DbResult<&mut Self> {
        self.guard()?;
        self.limit = limit.into();
        Ok(self)
    }

    /// Zero-based page number; the offset is `page * limit`.
    pub fn page(&mut self, page: Option<u64>) -> DbResult<&mut Self> {
        self.guard()?;
        self.page = page;
        Ok(self)
    }

    /// Add a select to the UNION chain; `None` clears the chain.
    pub fn union(&mut self, other: Option<Select>) -> DbResult<&mut Self> {
        self.guard()?;
        match other {
            Some(other) => self.unions.push(other),
            None => self.unions.clear(),
        }
        Ok(self)
    }

    /// `UNION ALL` instead of `UNION DISTINCT`, for the whole chain.
    pub fn union_all(&mut self, all: bool) -> DbResult<&mut Self> {
        self.guard()?;
        self.union_all = all;
        Ok(self)
    }

    fn build(&self) -> Rendered {
        let mut ctx = RenderCtx::new(self.style);
        let sql = self.render_into(&mut ctx);
        Rendered {
            sql,
            params: ctx.params,
        }
    }

    /// Render the full statement into `ctx`. Clause order fixes the order in
    /// which placeholders are allocated.
    pub(crate) fn render_into(&self, ctx: &mut RenderCtx) -> String {
        let fields = self.fields.render(ctx);
        let into = match self.into.as_deref() {
            Some(target) if !target.is_empty() => format!("\r\nINTO {target} "),
            _ => String::new(),
        };
        let table = self.render_table(ctx);
        let self_joins = self.joins.render_self_joins();
        let joins = self.joins.render_joins(ctx);
        let filter = self.filter.render(ctx, true, "\r\nWHERE ");
        let group_by = render_list(ctx, "GROUP BY", &self.group_by);
        let having = if self.having.is_empty() {
            String::new()
        } else {
            format!("\r\nHAVING {} ", self.having.render(ctx, true, ""))
        };
        let order_by = render_list(ctx, "ORDER BY", &self.order_by);
        let limit = paginate(&self.limit, self.page, &ctx.style)
            .map(|body| format!("\r\nLIMIT {body} "))
            .unwrap_or_default();

        format!(
            "SELECT {fields}{into} FROM {table}{self_joins}{joins}{filter}{group_by}{having}{order_by}{limit};"
        )
    }

    fn render_table(&self, ctx: &mut RenderCtx) -> String {
        if self.unions.is_empty() {
            return self.table.clone();
        }
        let parts: Vec<String> = self
            .unions
            .iter()
            .map(|select| ctx.merge_sub_select(select))
            .collect();
        let separator = if self.union_all {
            "\r\n) UNION ALL (\r\n"
        } else {
            "\r\n) UNION DISTINCT (\r\n"
        };
        format!("(({})) AS {}", parts.join(separator), self.table)
    }
}

fn merge_columns(list: &mut Vec<String>, columns: Columns) {
    if columns.0.is_empty() {
        list.clear();
    } else {
        list.extend(columns.0);
    }
}

fn render_list(ctx: &RenderCtx, keyword: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return String::new();
    }
    let quoted: Vec<_> = columns.iter().map(|c| ctx.quote(c)).collect();
    format!("\r\n{keyword} {} ", quoted.join(","))
}

impl WhereClause for Select {
    fn where_mut(&mut self) -> DbResult<&mut Predicates> {
        self.guard()?;
        Ok(&mut self.filter)
    }
}

impl JoinClause for Select {
    fn joins_mut(&mut self) -> DbResult<&mut Joins> {
        self.guard()?;
        Ok(&mut self.joins)
    }
}

impl Executable for Select {}
