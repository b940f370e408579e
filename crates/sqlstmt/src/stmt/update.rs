use std::sync::OnceLock;

use super::{
    Assignments, Executable, JoinClause, RenderCtx, Rendered, StatementKind, WhereClause,
    ensure_mutable,
};
use crate::config::SqlStyle;
use crate::error::DbResult;
use crate::join::Joins;
use crate::predicate::Predicates;

/// UPDATE statement builder.
#[derive(Debug, Clone)]
pub struct Update {
    table: String,
    style: SqlStyle,
    sets: Assignments,
    filter: Predicates,
    joins: Joins,
    use_transaction: bool,
    rendered: OnceLock<Rendered>,
}

impl_statement!(Update, StatementKind::Update);

impl Update {
    pub fn new(table: impl Into<String>) -> Self {
        Self::styled(table, SqlStyle::default())
    }

    pub fn styled(table: impl Into<String>, style: SqlStyle) -> Self {
        Self {
            table: table.into(),
            style,
            sets: Assignments::new(),
            filter: Predicates::new(),
            joins: Joins::default(),
            use_transaction: false,
            rendered: OnceLock::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn guard(&self) -> DbResult<()> {
        ensure_mutable(&self.rendered, StatementKind::Update)
    }

    /// Merge `column = value` pairs into the SET list; empty resets it.
    pub fn set(&mut self, sets: impl Into<Assignments>) -> DbResult<&mut Self> {
        self.guard()?;
        self.sets.merge(sets.into());
        Ok(self)
    }

    /// Run [`exec`](Executable::exec) through the retrying transaction runner.
    pub fn use_transaction(&mut self, enabled: bool) -> DbResult<&mut Self> {
        self.guard()?;
        self.use_transaction = enabled;
        Ok(self)
    }

    fn build(&self) -> Rendered {
        let mut ctx = RenderCtx::new(self.style);
        let table = ctx.quote(&self.table).into_owned();
        let self_joins = self.joins.render_self_joins();
        let joins = self.joins.render_joins(&mut ctx);
        let sets = self.sets.render_pairs(&mut ctx);
        let filter = self.filter.render(&mut ctx, true, " \r\nWHERE ");

        let sql = format!("UPDATE {table}{self_joins}{joins} \r\nSET {sets}{filter};");
        Rendered {
            sql,
            params: ctx.params,
        }
    }
}

impl WhereClause for Update {
    fn where_mut(&mut self) -> DbResult<&mut Predicates> {
        self.guard()?;
        Ok(&mut self.filter)
    }
}

impl JoinClause for Update {
    fn joins_mut(&mut self) -> DbResult<&mut Joins> {
        self.guard()?;
        Ok(&mut self.joins)
    }
}

impl Executable for Update {
    fn uses_transaction(&self) -> bool {
        self.use_transaction
    }
}
