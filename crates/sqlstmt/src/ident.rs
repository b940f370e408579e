//! Identifier quoting.
//!
//! Columns and tables go through the same entry point whether the caller
//! passed a bare name (`id`) or a pre-formed expression (`u.id`,
//! `COUNT(*)`, `id DESC`). Bare names are wrapped in the configured quote
//! character; anything that already looks like an expression is left alone.
//!
//! ```ignore
//! use sqlstmt::ident::quote;
//!
//! assert_eq!(quote("id", '`'), "`id`");
//! assert_eq!(quote("u.id", '`'), "u.id");
//! ```

use std::borrow::Cow;

/// Quote `token` with `quote_char` unless it contains the quote character,
/// a `.`, a space or a `(`.
pub fn quote(token: &str, quote_char: char) -> Cow<'_, str> {
    if is_expression(token, quote_char) {
        return Cow::Borrowed(token);
    }
    let mut out = String::with_capacity(token.len() + 2);
    out.push(quote_char);
    out.push_str(token);
    out.push(quote_char);
    Cow::Owned(out)
}

/// Whether `token` is passed through [`quote`] untouched.
pub fn is_expression(token: &str, quote_char: char) -> bool {
    token.contains(quote_char) || token.contains(['.', ' ', '('])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_are_quoted() {
        assert_eq!(quote("id", '`'), "`id`");
        assert_eq!(quote("users", '"'), "\"users\"");
    }

    #[test]
    fn expressions_pass_through() {
        assert_eq!(quote("`id`", '`'), "`id`");
        assert_eq!(quote("u.id", '`'), "u.id");
        assert_eq!(quote("id DESC", '`'), "id DESC");
        assert_eq!(quote("COUNT(*)", '`'), "COUNT(*)");
        assert!(matches!(quote("u.id", '`'), Cow::Borrowed(_)));
    }

    #[test]
    fn quote_char_is_configurable() {
        assert_eq!(quote("`odd`", '"'), "\"`odd`\"");
        assert_eq!(quote("\"x\"", '"'), "\"x\"");
    }
}
