//! Caller-written SQL fragments.
//!
//! A [`RawSql`] is emitted verbatim wherever a value is expected and carries
//! its own named parameters, which are merged into the statement's
//! placeholder table when the fragment is rendered.
//!
//! ```ignore
//! use sqlstmt::{sql, RawSql};
//!
//! let mut update = db.update("users");
//! update.set([
//!     ("seen_at", RawSql::call("NOW", "")),
//!     ("score", sql("score + :bump").bind("bump", 5)?.into()),
//! ])?;
//! ```

use std::fmt;

use crate::error::{DbError, DbResult};
use crate::param::Params;
use crate::value::Value;

/// A SQL fragment with its own named parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSql {
    sql: String,
    params: Params,
}

/// Start a raw SQL fragment.
pub fn sql(text: impl Into<String>) -> RawSql {
    RawSql::new(text)
}

impl RawSql {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            sql: text.into(),
            params: Params::new(),
        }
    }

    /// A function call fragment, `name(args)`.
    pub fn call(name: &str, args: &str) -> Self {
        Self::new(format!("{name}({args})"))
    }

    /// Bind a named parameter (`:name` or `name`).
    ///
    /// Names of the form `p<digits>` are reserved for generated placeholders
    /// and rejected.
    pub fn bind(mut self, name: &str, value: impl Into<Value>) -> DbResult<Self> {
        let bare = name.strip_prefix(':').unwrap_or(name);
        if bare.is_empty() {
            return Err(DbError::usage("raw SQL parameter name cannot be empty"));
        }
        if is_generated_name(bare) {
            return Err(DbError::usage(format!(
                "raw SQL parameter name ':{bare}' is reserved for generated placeholders"
            )));
        }
        self.params.set(format!(":{bare}"), value.into());
        Ok(self)
    }

    pub fn as_str(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &Params {
        &self.params
    }
}

fn is_generated_name(name: &str) -> bool {
    name.strip_prefix('p')
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

impl fmt::Display for RawSql {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl From<&str> for RawSql {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for RawSql {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_builds_function_fragment() {
        assert_eq!(RawSql::call("NOW", "").as_str(), "NOW()");
        assert_eq!(RawSql::call("COALESCE", "a,b").to_string(), "COALESCE(a,b)");
    }

    #[test]
    fn bind_normalizes_names() {
        let raw = sql("score + :bump")
            .bind("bump", 5)
            .unwrap()
            .bind(":bump", 6)
            .unwrap();
        assert_eq!(raw.params().len(), 1);
        assert_eq!(raw.params().get(":bump"), Some(&Value::Int(6)));
    }

    #[test]
    fn generated_names_are_reserved() {
        let err = sql("x = :p0").bind("p0", 1).unwrap_err();
        assert!(matches!(err, DbError::Usage(_)));
        assert!(sql("x = :p").bind("p", 1).is_ok());
        assert!(sql("x = :page").bind(":page", 1).is_ok());
        assert!(sql("x").bind(":", 1).is_err());
    }
}
