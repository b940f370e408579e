//! Configuration for rendering, execution and the transaction runner.

use std::time::Duration;

/// How a paginated LIMIT clause is spelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LimitForm {
    /// `LIMIT offset, count` (MySQL).
    #[default]
    OffsetComma,
    /// `LIMIT count OFFSET offset` (Postgres, SQLite).
    OffsetKeyword,
}

/// SQL dialect knobs used while rendering statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlStyle {
    /// Character wrapped around bare identifiers (`` ` `` for MySQL, `"` for Postgres).
    pub ident_quote: char,
    /// Page size used when a page is given without a limit.
    pub default_page_size: u64,
    /// Spelling of `LIMIT` with an offset.
    pub limit_form: LimitForm,
}

impl Default for SqlStyle {
    fn default() -> Self {
        Self {
            ident_quote: '`',
            default_page_size: 1000,
            limit_form: LimitForm::OffsetComma,
        }
    }
}

impl SqlStyle {
    /// Create a style with defaults (backtick quoting, page size 1000).
    pub fn new() -> Self {
        Self::default()
    }

    /// Style with `"` identifier quoting and `LIMIT n OFFSET m`, as Postgres
    /// expects.
    ///
    /// Only the rendering changes: `INSERT IGNORE`, `REPLACE INTO` and
    /// `ON DUPLICATE KEY UPDATE` are MySQL statements and Postgres rejects them.
    pub fn postgres() -> Self {
        Self::default()
            .ident_quote('"')
            .limit_form(LimitForm::OffsetKeyword)
    }

    /// Set the identifier quote character.
    pub fn ident_quote(mut self, quote: char) -> Self {
        self.ident_quote = quote;
        self
    }

    /// Set the default page size.
    pub fn default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    /// Set how `LIMIT` with an offset is spelled.
    pub fn limit_form(mut self, form: LimitForm) -> Self {
        self.limit_form = form;
        self
    }
}

/// Retry policy for [`TransactionRunner`](crate::TransactionRunner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionConfig {
    /// Maximum number of attempts, including the first.
    pub attempts: u32,
    /// Constant delay between attempts.
    pub delay: Duration,
    /// Driver error codes treated as transient (serialization failure).
    pub retry_codes: Vec<String>,
    /// Message fragment that marks a driver error as transient.
    pub retry_message: String,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(200),
            retry_codes: vec!["40001".to_string()],
            retry_message: "try restarting transaction".to_string(),
        }
    }
}

impl TransactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of attempts.
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Set the delay between attempts.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Add a driver error code treated as transient.
    pub fn retry_code(mut self, code: impl Into<String>) -> Self {
        self.retry_codes.push(code.into());
        self
    }

    /// Set the message fragment that marks an error as transient.
    pub fn retry_message(mut self, message: impl Into<String>) -> Self {
        self.retry_message = message.into();
        self
    }
}

/// Configuration for [`Db`](crate::Db).
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Rendering style stamped on every builder the facade creates.
    pub style: SqlStyle,
    /// Defaults for `Db::transaction` and `use_transaction` statements.
    pub transaction: TransactionConfig,
    /// Whether to log executed SQL.
    pub logging_enabled: bool,
    /// Truncate logged SQL to this many characters.
    pub log_max_sql_length: Option<usize>,
    /// Prefix of every result-cache key.
    pub cache_key_prefix: String,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            style: SqlStyle::default(),
            transaction: TransactionConfig::default(),
            logging_enabled: false,
            log_max_sql_length: Some(200),
            cache_key_prefix: "db.select.".to_string(),
        }
    }
}

impl DbConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the rendering style.
    pub fn style(mut self, style: SqlStyle) -> Self {
        self.style = style;
        self
    }

    /// Set the transaction defaults.
    pub fn transaction(mut self, config: TransactionConfig) -> Self {
        self.transaction = config;
        self
    }

    /// Enable SQL logging.
    pub fn with_logging(mut self) -> Self {
        self.logging_enabled = true;
        self
    }

    /// Set the maximum logged SQL length (`None` logs the full text).
    pub fn log_max_sql_length(mut self, len: Option<usize>) -> Self {
        self.log_max_sql_length = len;
        self
    }

    /// Set the result-cache key prefix.
    pub fn cache_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = prefix.into();
        self
    }
}
