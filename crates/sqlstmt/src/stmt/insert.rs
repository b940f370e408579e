use std::sync::OnceLock;

use super::{Assignments, Executable, RenderCtx, Rendered, Select, StatementKind, ensure_mutable};
use crate::config::SqlStyle;
use crate::error::DbResult;
use crate::value::{Operand, Value};

/// Row data for an INSERT.
#[derive(Debug, Clone)]
pub enum Row {
    /// Named columns with their values.
    Assoc(Assignments),
    /// Column names only. With a source select this is the column list of
    /// `INSERT ... SELECT`; without one the names are bound as values.
    Columns(Vec<String>),
    /// Several rows; the column list is taken from the first one.
    Many(Vec<Row>),
}

impl Row {
    fn columns(&self) -> Vec<&str> {
        match self {
            Row::Assoc(pairs) => pairs.columns().collect(),
            Row::Columns(columns) => columns.iter().map(String::as_str).collect(),
            Row::Many(rows) => rows.first().map(Row::columns).unwrap_or_default(),
        }
    }

    fn render_values(&self, ctx: &mut RenderCtx) -> String {
        let values: Vec<String> = match self {
            Row::Many(rows) => {
                return rows
                    .iter()
                    .map(|row| row.render_values(ctx))
                    .collect::<Vec<_>>()
                    .join(",");
            }
            Row::Assoc(pairs) => pairs.values().map(|v| ctx.prepare_value(v)).collect(),
            Row::Columns(columns) => columns
                .iter()
                .map(|c| ctx.params.allocate(Value::Text(c.clone())))
                .collect(),
        };
        if values.is_empty() {
            return String::new();
        }
        format!("({})", values.join(","))
    }
}

impl From<Assignments> for Row {
    fn from(pairs: Assignments) -> Self {
        Row::Assoc(pairs)
    }
}

impl<K: Into<String>, V: Into<Operand>> From<Vec<(K, V)>> for Row {
    fn from(pairs: Vec<(K, V)>) -> Self {
        Row::Assoc(pairs.into())
    }
}

impl<const N: usize, K: Into<String>, V: Into<Operand>> From<[(K, V); N]> for Row {
    fn from(pairs: [(K, V); N]) -> Self {
        Row::Assoc(pairs.into())
    }
}

impl<const N: usize> From<[&str; N]> for Row {
    fn from(columns: [&str; N]) -> Self {
        Row::Columns(columns.iter().map(|c| c.to_string()).collect())
    }
}

impl From<Vec<&str>> for Row {
    fn from(columns: Vec<&str>) -> Self {
        Row::Columns(columns.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<Row>> for Row {
    fn from(rows: Vec<Row>) -> Self {
        Row::Many(rows)
    }
}

impl From<Vec<Assignments>> for Row {
    fn from(rows: Vec<Assignments>) -> Self {
        Row::Many(rows.into_iter().map(Row::Assoc).collect())
    }
}

/// INSERT statement builder.
///
/// `INSERT INTO`, `INSERT IGNORE INTO` or `REPLACE INTO` (replace wins when
/// both flags are set), from literal rows or from a source select, with an
/// optional `ON DUPLICATE KEY UPDATE` list.
#[derive(Debug, Clone)]
pub struct Insert {
    table: String,
    style: SqlStyle,
    row: Row,
    source: Option<Box<Select>>,
    on_duplicate: Assignments,
    ignore: bool,
    replace: bool,
    use_transaction: bool,
    rendered: OnceLock<Rendered>,
}

impl_statement!(Insert, StatementKind::Insert);

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self::styled(table, SqlStyle::default())
    }

    pub fn styled(table: impl Into<String>, style: SqlStyle) -> Self {
        Self {
            table: table.into(),
            style,
            row: Row::Many(Vec::new()),
            source: None,
            on_duplicate: Assignments::new(),
            ignore: false,
            replace: false,
            use_transaction: false,
            rendered: OnceLock::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn guard(&self) -> DbResult<()> {
        ensure_mutable(&self.rendered, StatementKind::Insert)
    }

    /// Replace the row data.
    pub fn values(&mut self, row: impl Into<Row>) -> DbResult<&mut Self> {
        self.guard()?;
        self.row = row.into();
        Ok(self)
    }

    /// `INSERT ... SELECT`; `None` goes back to literal rows.
    pub fn select(&mut self, source: Option<Select>) -> DbResult<&mut Self> {
        self.guard()?;
        self.source = source.map(Box::new);
        Ok(self)
    }

    /// Merge into the `ON DUPLICATE KEY UPDATE` list; empty resets it.
    pub fn on_duplicate_key_update(
        &mut self,
        values: impl Into<Assignments>,
    ) -> DbResult<&mut Self> {
        self.guard()?;
        self.on_duplicate.merge(values.into());
        Ok(self)
    }

    pub fn ignore(&mut self, ignore: bool) -> DbResult<&mut Self> {
        self.guard()?;
        self.ignore = ignore;
        Ok(self)
    }

    pub fn replace(&mut self, replace: bool) -> DbResult<&mut Self> {
        self.guard()?;
        self.replace = replace;
        Ok(self)
    }

    /// Run [`exec`](Executable::exec) through the retrying transaction runner.
    pub fn use_transaction(&mut self, enabled: bool) -> DbResult<&mut Self> {
        self.guard()?;
        self.use_transaction = enabled;
        Ok(self)
    }

    fn instruction(&self) -> &'static str {
        if self.replace {
            "REPLACE INTO"
        } else if self.ignore {
            "INSERT IGNORE INTO"
        } else {
            "INSERT INTO"
        }
    }

    fn build(&self) -> Rendered {
        let mut ctx = RenderCtx::new(self.style);
        let table = ctx.quote(&self.table).into_owned();

        let columns = self.row.columns();
        let columns = if columns.is_empty() {
            String::new()
        } else {
            let quoted: Vec<_> = columns.iter().map(|c| ctx.quote(c)).collect();
            format!("({})", quoted.join(","))
        };

        let body = match &self.source {
            Some(select) => ctx.merge_sub_select(select),
            None => format!("VALUES {}", self.row.render_values(&mut ctx)),
        };

        let update = if self.on_duplicate.is_empty() {
            String::new()
        } else {
            format!(
                "\r\nON DUPLICATE KEY UPDATE {}",
                self.on_duplicate.render_pairs(&mut ctx)
            )
        };

        let sql = format!(
            "{} {table}{columns} \r\n{body}{update};",
            self.instruction()
        );
        Rendered {
            sql,
            params: ctx.params,
        }
    }
}

impl Executable for Insert {
    fn uses_transaction(&self) -> bool {
        self.use_transaction
    }
}
