#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use sqlstmt::{DbError, DbResult, Driver, Params, ResultSet};

/// A driver double that records every call and replays scripted outcomes.
///
/// `execute` pops the next scripted outcome; when the script is empty it
/// answers with `default_result`.
#[derive(Default)]
pub struct MockDriver {
    pub executed: Mutex<Vec<(String, Params)>>,
    pub control: Mutex<Vec<&'static str>>,
    pub script: Mutex<VecDeque<DbResult<ResultSet>>>,
    pub default_result: ResultSet,
    pub insert_id: Option<String>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn returning(result: ResultSet) -> Self {
        Self {
            default_result: result,
            ..Self::default()
        }
    }

    pub fn push(&self, outcome: DbResult<ResultSet>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn push_err(&self, err: impl Into<DbError>) {
        self.push(Err(err.into()));
    }

    pub fn executed_sql(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn execute_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }

    pub fn control_log(&self) -> Vec<&'static str> {
        self.control.lock().unwrap().clone()
    }
}

impl Driver for MockDriver {
    async fn execute(&self, sql: &str, params: &Params) -> DbResult<ResultSet> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.default_result.clone()))
    }

    async fn begin_transaction(&self) -> DbResult<bool> {
        self.control.lock().unwrap().push("begin");
        Ok(true)
    }

    async fn commit(&self) -> DbResult<bool> {
        self.control.lock().unwrap().push("commit");
        Ok(true)
    }

    async fn rollback(&self) -> DbResult<bool> {
        self.control.lock().unwrap().push("rollback");
        Ok(true)
    }

    async fn last_insert_id(&self) -> DbResult<Option<String>> {
        Ok(self.insert_id.clone())
    }
}
