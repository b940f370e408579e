//! Scalar values bound to placeholders, and the operands statements accept.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sql::RawSql;
use crate::stmt::Select;

/// A scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Native bind type a driver should use for a [`Value`].
///
/// This is the minimum inference table: integers, booleans and nulls bind
/// natively, everything else binds as a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindType {
    Int,
    Bool,
    Null,
    Str,
}

impl Value {
    pub fn bind_type(&self) -> BindType {
        match self {
            Value::Null => BindType::Null,
            Value::Bool(_) => BindType::Bool,
            Value::Int(_) => BindType::Int,
            Value::Float(_) | Value::Text(_) => BindType::Str,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render the value verbatim, for contexts that are not parameterised
    /// (join `ON` conditions).
    pub fn to_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "1".to_string(),
            Value::Bool(false) => "0".to_string(),
            Value::Int(v) => v.to_string(),
            Value::Float(v) => v.to_string(),
            Value::Text(v) => v.clone(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_literal())
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v.into())
                }
            }
        )*
    };
}

impl_value_from!(
    bool => Bool,
    i8 => Int,
    i16 => Int,
    i32 => Int,
    i64 => Int,
    u8 => Int,
    u16 => Int,
    u32 => Int,
    f32 => Float,
    f64 => Float,
    String => Text,
    &str => Text,
);

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Anything that can stand on the right-hand side of a column: a bound
/// scalar, a caller-written SQL fragment, or a nested select.
#[derive(Debug, Clone)]
pub enum Operand {
    Value(Value),
    Sql(RawSql),
    Select(Box<Select>),
}

impl Operand {
    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }

    pub fn is_select(&self) -> bool {
        matches!(self, Operand::Select(_))
    }
}

macro_rules! impl_operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(v.into())
                }
            }

            impl From<Option<$ty>> for Operand {
                fn from(v: Option<$ty>) -> Self {
                    Operand::Value(v.into())
                }
            }
        )*
    };
}

impl_operand_from_value!(bool, i8, i16, i32, i64, u8, u16, u32, f32, f64, String, &str);

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<RawSql> for Operand {
    fn from(v: RawSql) -> Self {
        Operand::Sql(v)
    }
}

impl From<Select> for Operand {
    fn from(v: Select) -> Self {
        Operand::Select(Box::new(v))
    }
}
