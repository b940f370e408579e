//! Retrying transaction runner.
//!
//! A unit of work runs between BEGIN and COMMIT. When it fails (or the
//! commit does), the transaction is rolled back and the failure classified:
//! transient failures (serialization conflicts, deadlocks asking for a
//! restart) are retried after a constant delay, up to a bounded number of
//! attempts; everything else is returned immediately and unchanged.
//!
//! ```ignore
//! use sqlstmt::{TransactionConfig, TransactionRunner};
//!
//! let runner = TransactionRunner::new(&driver, TransactionConfig::new().attempts(5));
//! let id = runner
//!     .run(|| async {
//!         insert_order(&db).await?;
//!         db.last_insert_id().await
//!     })
//!     .await?;
//! ```

use std::future::Future;

use crate::config::TransactionConfig;
use crate::driver::Driver;
use crate::error::{DbError, DbResult, DriverError};

/// Retry classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying after the configured delay.
    Transient,
    /// Returned to the caller as-is.
    Fatal,
}

/// Classify `err` under `config`.
///
/// Only driver errors are ever transient: those whose code is one of
/// `retry_codes`, or whose message contains `retry_message`.
pub fn classify(err: &DbError, config: &TransactionConfig) -> FailureClass {
    let DbError::Driver(driver_err) = err else {
        return FailureClass::Fatal;
    };
    let code_matches = driver_err
        .code
        .as_deref()
        .is_some_and(|code| config.retry_codes.iter().any(|c| c == code));
    let message_matches =
        !config.retry_message.is_empty() && driver_err.message.contains(&config.retry_message);
    if code_matches || message_matches {
        FailureClass::Transient
    } else {
        FailureClass::Fatal
    }
}

/// Runs units of work inside retried transactions on one driver.
#[derive(Debug)]
pub struct TransactionRunner<'a, D> {
    driver: &'a D,
    config: TransactionConfig,
}

impl<'a, D: Driver> TransactionRunner<'a, D> {
    pub fn new(driver: &'a D, config: TransactionConfig) -> Self {
        Self { driver, config }
    }

    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Run `work` in a transaction, retrying transient failures.
    ///
    /// A failing BEGIN is returned immediately. A failing ROLLBACK ends the
    /// run with [`DbError::Other`] describing both errors. When every
    /// attempt fails transiently the last failure is returned.
    pub async fn run<T, F, Fut>(&self, mut work: F) -> DbResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DbResult<T>>,
    {
        if self.config.attempts == 0 {
            return Err(DbError::usage("transaction attempts must be at least 1"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            if !self.driver.begin_transaction().await? {
                return Err(DriverError::transaction("BEGIN was refused").into());
            }

            let error = match work().await {
                Ok(value) => match self.driver.commit().await {
                    Ok(true) => {
                        #[cfg(feature = "tracing")]
                        tracing::debug!(target: "sqlstmt.tx", attempt, "transaction committed");
                        return Ok(value);
                    }
                    Ok(false) => DriverError::transaction("COMMIT was refused").into(),
                    Err(err) => err,
                },
                Err(err) => err,
            };

            match self.driver.rollback().await {
                Ok(true) => {}
                Ok(false) => {
                    return Err(DbError::Other(format!(
                        "{error} (rollback failed: ROLLBACK was refused)"
                    )));
                }
                Err(rollback_err) => {
                    return Err(DbError::Other(format!(
                        "{error} (rollback failed: {rollback_err})"
                    )));
                }
            }

            if classify(&error, &self.config) == FailureClass::Fatal
                || attempt >= self.config.attempts
            {
                return Err(error);
            }

            #[cfg(feature = "tracing")]
            tracing::warn!(
                target: "sqlstmt.tx",
                attempt,
                max_attempts = self.config.attempts,
                delay_ms = self.config.delay.as_millis() as u64,
                error = %error,
                "transient transaction failure, retrying"
            );
            tokio::time::sleep(self.config.delay).await;
        }
    }
}
