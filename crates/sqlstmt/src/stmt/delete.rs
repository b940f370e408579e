use std::sync::OnceLock;

use super::{Executable, RenderCtx, Rendered, StatementKind, WhereClause, ensure_mutable};
use crate::config::SqlStyle;
use crate::error::DbResult;
use crate::predicate::Predicates;

/// DELETE statement builder.
///
/// Nothing stops a DELETE without predicates: it renders as
/// `DELETE FROM table;` and removes every row.
#[derive(Debug, Clone)]
pub struct Delete {
    table: String,
    style: SqlStyle,
    filter: Predicates,
    use_transaction: bool,
    rendered: OnceLock<Rendered>,
}

impl_statement!(Delete, StatementKind::Delete);

impl Delete {
    pub fn new(table: impl Into<String>) -> Self {
        Self::styled(table, SqlStyle::default())
    }

    pub fn styled(table: impl Into<String>, style: SqlStyle) -> Self {
        Self {
            table: table.into(),
            style,
            filter: Predicates::new(),
            use_transaction: false,
            rendered: OnceLock::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Run [`exec`](Executable::exec) through the retrying transaction runner.
    pub fn use_transaction(&mut self, enabled: bool) -> DbResult<&mut Self> {
        ensure_mutable(&self.rendered, StatementKind::Delete)?;
        self.use_transaction = enabled;
        Ok(self)
    }

    fn build(&self) -> Rendered {
        let mut ctx = RenderCtx::new(self.style);
        let table = ctx.quote(&self.table).into_owned();
        let filter = self.filter.render(&mut ctx, true, " \r\nWHERE ");
        Rendered {
            sql: format!("DELETE FROM {table}{filter};"),
            params: ctx.params,
        }
    }
}

impl WhereClause for Delete {
    fn where_mut(&mut self) -> DbResult<&mut Predicates> {
        ensure_mutable(&self.rendered, StatementKind::Delete)?;
        Ok(&mut self.filter)
    }
}

impl Executable for Delete {
    fn uses_transaction(&self) -> bool {
        self.use_transaction
    }
}
