//! Execution adapter: hands rendered SQL and its placeholder table to the driver.

use std::borrow::Cow;

use crate::config::DbConfig;
use crate::driver::{Driver, ResultSet};
use crate::error::DbResult;
use crate::stmt::{Rendered, StatementKind};

/// Execute `rendered` through `driver`, with `prefix` (e.g. `EXPLAIN `)
/// prepended to the SQL text when given.
pub async fn execute<D: Driver>(
    driver: &D,
    kind: Option<StatementKind>,
    rendered: &Rendered,
    prefix: Option<&str>,
    config: &DbConfig,
) -> DbResult<ResultSet> {
    let sql = match prefix {
        Some(prefix) => Cow::Owned(format!("{prefix}{}", rendered.sql)),
        None => Cow::Borrowed(rendered.sql.as_str()),
    };
    log_sql(config, kind, &sql, rendered.params.len());
    driver.execute(&sql, &rendered.params).await
}

#[cfg(feature = "tracing")]
fn log_sql(config: &DbConfig, kind: Option<StatementKind>, sql: &str, param_count: usize) {
    if !config.logging_enabled {
        return;
    }
    let sql = truncate_sql(sql, config.log_max_sql_length);
    tracing::debug!(
        target: "sqlstmt.sql",
        kind = kind.map_or("RAW", StatementKind::as_str),
        param_count,
        sql = %sql,
    );
}

#[cfg(not(feature = "tracing"))]
fn log_sql(_config: &DbConfig, _kind: Option<StatementKind>, _sql: &str, _param_count: usize) {}

/// Cut `sql` to at most `max` bytes on a char boundary, marking the cut with `...`.
pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> Cow<'_, str> {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!("{}...", &sql[..end]))
        }
        _ => Cow::Borrowed(sql),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_sql("SELECT 1", Some(100)), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", None), "SELECT 1");
        assert_eq!(truncate_sql("SELECT 1", Some(6)), "SELECT...");
        // 'é' is two bytes; cutting inside it backs off to the boundary.
        assert_eq!(truncate_sql("aé", Some(2)), "a...");
    }
}
