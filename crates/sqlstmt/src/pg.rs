//! tokio-postgres driver adapter.
//!
//! Statements arrive with named placeholders (`:p0`, `:user_id`); they are
//! rewritten to positional `$n` parameters before being prepared. Identifier
//! quoting has to be switched to `"` for Postgres, see [`SqlStyle::postgres`].
//!
//! `INSERT IGNORE`, `REPLACE INTO` and `ON DUPLICATE KEY UPDATE` are MySQL
//! forms; the builders still render them but Postgres rejects them.
//!
//! [`SqlStyle::postgres`]: crate::SqlStyle::postgres

use std::error::Error;

use bytes::BytesMut;
use futures_util::{TryStreamExt, pin_mut};
use tokio_postgres::types::{IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls, Row};

use crate::driver::{Driver, ResultSet};
use crate::error::{DbError, DbResult, DriverError, DriverErrorKind};
use crate::param::Params;
use crate::value::Value;

/// SQLSTATE `object_not_in_prerequisite_state`, raised by `lastval()` when
/// no sequence was used in the session yet.
const NO_LASTVAL: &str = "55000";

/// [`Driver`] over a single `tokio_postgres::Client`.
#[derive(Debug)]
pub struct PgDriver {
    client: Client,
}

impl PgDriver {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect with `NoTls` and drive the connection on a background task.
    pub async fn connect(url: &str) -> DbResult<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(|e| DriverError::from(e).with_kind(DriverErrorKind::Connection))?;
        tokio::spawn(async move {
            if let Err(_err) = connection.await {
                #[cfg(feature = "tracing")]
                tracing::error!(target: "sqlstmt.pg", error = %_err, "connection closed");
            }
        });
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn control(&self, command: &str) -> DbResult<bool> {
        self.client
            .batch_execute(command)
            .await
            .map_err(|e| DriverError::from(e).with_kind(DriverErrorKind::Transaction))?;
        Ok(true)
    }
}

impl Driver for PgDriver {
    async fn execute(&self, sql: &str, params: &Params) -> DbResult<ResultSet> {
        let (sql, values) = to_positional(sql, params)?;
        let statement = self.client.prepare(&sql).await.map_err(DriverError::from)?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let binds: Vec<&(dyn ToSql + Sync)> =
            values.iter().map(|v| *v as &(dyn ToSql + Sync)).collect();
        let stream = self
            .client
            .query_raw(&statement, binds.iter().copied())
            .await
            .map_err(DriverError::from)?;
        pin_mut!(stream);

        let mut rows = Vec::new();
        while let Some(row) = stream.try_next().await.map_err(DriverError::from)? {
            rows.push(decode_row(&row)?);
        }
        let affected = stream.rows_affected().unwrap_or(0);

        Ok(ResultSet {
            columns,
            rows,
            affected,
        })
    }

    async fn begin_transaction(&self) -> DbResult<bool> {
        self.control("BEGIN").await
    }

    async fn commit(&self) -> DbResult<bool> {
        self.control("COMMIT").await
    }

    async fn rollback(&self) -> DbResult<bool> {
        self.control("ROLLBACK").await
    }

    async fn last_insert_id(&self) -> DbResult<Option<String>> {
        match self.client.query_one("SELECT lastval()", &[]).await {
            Ok(row) => {
                let id: i64 = row
                    .try_get(0)
                    .map_err(|e| DriverError::decode("lastval", e))?;
                Ok(Some(id.to_string()))
            }
            Err(err) if err.code().is_some_and(|c| c.code() == NO_LASTVAL) => Ok(None),
            Err(err) => Err(DriverError::from(err).into()),
        }
    }
}

impl From<tokio_postgres::Error> for DriverError {
    fn from(err: tokio_postgres::Error) -> Self {
        let kind = if err.is_closed() {
            DriverErrorKind::Connection
        } else {
            DriverErrorKind::Execute
        };
        let message = match err.as_db_error() {
            Some(db_err) => db_err.message().to_string(),
            None => err.to_string(),
        };
        let driver_err = DriverError::new(kind, message);
        match err.code() {
            Some(code) => driver_err.with_code(code.code()),
            None => driver_err,
        }
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        DbError::Driver(err.into())
    }
}

/// Rewrite `:name` placeholders to `$n`, outside quoted text and `::` casts.
///
/// A name used more than once maps to the same position. Returns the
/// rewritten SQL and the values in positional order.
pub fn to_positional<'p>(sql: &str, params: &'p Params) -> DbResult<(String, Vec<&'p Value>)> {
    let mut out = String::with_capacity(sql.len());
    let mut names: Vec<&str> = Vec::new();
    let mut values: Vec<&'p Value> = Vec::new();
    let mut quote: Option<char> = None;
    let mut chars = sql.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' | '`' => {
                quote = Some(c);
                out.push(c);
            }
            ':' if chars.peek().is_some_and(|&(_, n)| n == ':') => {
                out.push_str("::");
                chars.next();
            }
            ':' if chars
                .peek()
                .is_some_and(|&(_, n)| n.is_ascii_alphabetic() || n == '_') =>
            {
                let start = i + 1;
                let mut end = start;
                while let Some(&(j, n)) = chars.peek() {
                    if !(n.is_ascii_alphanumeric() || n == '_') {
                        break;
                    }
                    end = j + n.len_utf8();
                    chars.next();
                }
                let name = &sql[start..end];
                let position = match names.iter().position(|n| *n == name) {
                    Some(pos) => pos,
                    None => {
                        let value = params.get(name).ok_or_else(|| {
                            DbError::usage(format!("placeholder :{name} has no bound value"))
                        })?;
                        names.push(name);
                        values.push(value);
                        names.len() - 1
                    }
                };
                out.push('$');
                out.push_str(&(position + 1).to_string());
            }
            _ => out.push(c),
        }
    }
    Ok((out, values))
}

fn decode_row(row: &Row) -> DbResult<Vec<Value>> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, column)| decode_column(row, i, column.type_(), column.name()))
        .collect()
}

fn decode_column(row: &Row, index: usize, ty: &Type, name: &str) -> DbResult<Value> {
    let decode_err = |e: tokio_postgres::Error| DbError::from(DriverError::decode(name, e));
    let value: Value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(index).map_err(decode_err)?.into(),
        Type::INT2 => row.try_get::<_, Option<i16>>(index).map_err(decode_err)?.into(),
        Type::INT4 => row.try_get::<_, Option<i32>>(index).map_err(decode_err)?.into(),
        Type::INT8 => row.try_get::<_, Option<i64>>(index).map_err(decode_err)?.into(),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(index).map_err(decode_err)?.into(),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(index).map_err(decode_err)?.into(),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => row
            .try_get::<_, Option<String>>(index)
            .map_err(decode_err)?
            .into(),
        _ => {
            return Err(DriverError::decode(name, format!("unsupported column type {ty}")).into());
        }
    };
    Ok(value)
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ => Value::Int(i64::from(*b)).to_sql(ty, out),
            },
            Value::Int(n) => match *ty {
                Type::INT2 => i16::try_from(*n)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*n)?.to_sql(ty, out),
                Type::INT8 => n.to_sql(ty, out),
                Type::FLOAT4 => (*n as f32).to_sql(ty, out),
                Type::FLOAT8 => (*n as f64).to_sql(ty, out),
                Type::BOOL => (*n != 0).to_sql(ty, out),
                _ => n.to_string().to_sql(ty, out),
            },
            Value::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                Type::FLOAT8 => f.to_sql(ty, out),
                Type::INT2 | Type::INT4 | Type::INT8 | Type::BOOL => {
                    Err(format!("cannot bind float {f} as {ty}").into())
                }
                _ => f.to_string().to_sql(ty, out),
            },
            Value::Text(s) => match *ty {
                Type::INT2 => s.parse::<i16>()?.to_sql(ty, out),
                Type::INT4 => s.parse::<i32>()?.to_sql(ty, out),
                Type::INT8 => s.parse::<i64>()?.to_sql(ty, out),
                Type::FLOAT4 => s.parse::<f32>()?.to_sql(ty, out),
                Type::FLOAT8 => s.parse::<f64>()?.to_sql(ty, out),
                Type::BOOL => s.parse::<bool>()?.to_sql(ty, out),
                _ => s.as_str().to_sql(ty, out),
            },
        }
    }

    fn accepts(ty: &Type) -> bool {
        matches!(
            *ty,
            Type::BOOL
                | Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::TEXT
                | Type::VARCHAR
                | Type::BPCHAR
                | Type::NAME
                | Type::UNKNOWN
        )
    }

    tokio_postgres::types::to_sql_checked!();
}
