//! The database driver contract and the result types it produces.

use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::future::Future;

use crate::error::DbResult;
use crate::param::Params;
use crate::value::Value;

/// The narrow driver interface every statement is executed through.
///
/// SQL text arrives with named placeholders (`:p0`, `:name`); binding them
/// in whatever form the database understands is the driver's job. Bind types
/// follow [`Value::bind_type`](crate::Value::bind_type).
pub trait Driver: Send + Sync {
    /// Execute one statement and collect its result.
    fn execute(
        &self,
        sql: &str,
        params: &Params,
    ) -> impl Future<Output = DbResult<ResultSet>> + Send;

    fn begin_transaction(&self) -> impl Future<Output = DbResult<bool>> + Send;

    fn commit(&self) -> impl Future<Output = DbResult<bool>> + Send;

    fn rollback(&self) -> impl Future<Output = DbResult<bool>> + Send;

    /// Id generated by the last INSERT on this connection, if any.
    fn last_insert_id(&self) -> impl Future<Output = DbResult<Option<String>>> + Send;
}

/// A fully materialised statement result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Rows affected, for statements that report it.
    pub affected: u64,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            affected: 0,
        }
    }

    /// A result with no rows, as returned by INSERT/UPDATE/DELETE.
    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn record(&self, index: usize) -> Option<Record> {
        self.rows.get(index).map(|values| Record {
            columns: self.columns.clone(),
            values: values.clone(),
        })
    }

    pub fn records(&self) -> Vec<Record> {
        (0..self.rows.len()).filter_map(|i| self.record(i)).collect()
    }

    /// Value of column `column` in the first row.
    pub fn first_column(&self, column: usize) -> Option<&Value> {
        self.rows.first().and_then(|row| row.get(column))
    }

    /// Map every row onto `T` through its column names.
    pub fn to_typed<T: DeserializeOwned>(&self) -> DbResult<Vec<T>> {
        self.records().iter().map(Record::to_typed).collect()
    }
}

/// One result row with its column names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub columns: Vec<String>,
    pub values: Vec<Value>,
}

impl Record {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Deserialize the row as a JSON object keyed by column name.
    pub fn to_typed<T: DeserializeOwned>(&self) -> DbResult<T> {
        let object: serde_json::Map<String, serde_json::Value> = self
            .columns
            .iter()
            .zip(&self.values)
            .map(|(c, v)| Ok((c.clone(), serde_json::to_value(v)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
        email: Option<String>,
    }

    fn users() -> ResultSet {
        ResultSet::new(
            vec!["id".into(), "name".into(), "email".into()],
            vec![
                vec![Value::Int(1), Value::from("ann"), Value::Null],
                vec![Value::Int(2), Value::from("bo"), Value::from("bo@x.io")],
            ],
        )
    }

    #[test]
    fn records_by_name() {
        let rs = users();
        let first = rs.record(0).unwrap();
        assert_eq!(first.get("name"), Some(&Value::from("ann")));
        assert_eq!(first.get("missing"), None);
        assert_eq!(rs.first_column(1), Some(&Value::from("ann")));
        assert!(rs.record(5).is_none());
    }

    #[test]
    fn typed_rows() {
        let typed: Vec<User> = users().to_typed().unwrap();
        assert_eq!(
            typed[1],
            User {
                id: 2,
                name: "bo".into(),
                email: Some("bo@x.io".into())
            }
        );
        assert_eq!(typed[0].email, None);
    }

    #[test]
    fn typed_row_mismatch_is_serialization_error() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Wrong {
            id: String,
        }
        let err = users().record(0).unwrap().to_typed::<Wrong>().unwrap_err();
        assert!(matches!(err, crate::DbError::Serialization(_)));
    }
}
