//! Join composition for SELECT and UPDATE.

use crate::predicate::Predicates;
use crate::stmt::RenderCtx;

/// Typed join kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    FullOuter,
}

impl JoinKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::FullOuter => "FULL OUTER JOIN",
        }
    }
}

/// A typed join: kind, target text and an optional ON condition.
#[derive(Debug, Clone)]
pub struct Join {
    pub kind: JoinKind,
    pub target: String,
    pub on: Predicates,
}

/// Self-joins (comma joins) and typed joins of one statement.
#[derive(Debug, Clone, Default)]
pub struct Joins {
    self_joins: Vec<String>,
    joins: Vec<Join>,
}

impl Joins {
    /// Append a comma join, or clear them all with `None`.
    pub fn add_self_join(&mut self, target: Option<&str>) {
        match target {
            Some(target) => self.self_joins.push(target.to_string()),
            None => self.self_joins.clear(),
        }
    }

    pub fn add(&mut self, kind: JoinKind, target: impl Into<String>, on: Predicates) {
        self.joins.push(Join {
            kind,
            target: target.into(),
            on,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.self_joins.is_empty() && self.joins.is_empty()
    }

    pub(crate) fn render_self_joins(&self) -> String {
        if self.self_joins.is_empty() {
            return String::new();
        }
        format!(",{} ", self.self_joins.join(","))
    }

    /// ON conditions are rendered unparameterised: values are column
    /// references, not data.
    pub(crate) fn render_joins(&self, ctx: &mut RenderCtx) -> String {
        let mut out = String::new();
        for join in &self.joins {
            let on = join.on.render(ctx, false, "");
            out.push_str("\r\n");
            out.push_str(join.kind.keyword());
            out.push(' ');
            out.push_str(&join.target);
            if !on.is_empty() {
                out.push_str(" ON ");
                out.push_str(&on);
                out.push(' ');
            }
            out.push(' ');
        }
        out
    }
}
