//! # Value Type
//!
//! Row-oriented cell values. A decoded row is a `Vec<Value>` in column-spec
//! order, with `Value::Null` standing in for SQL NULL.
//!
//! ## Design Decisions
//!
//! - **No defaults in rows**: row decode threads `Null` through directly; only
//!   the dense column path substitutes per-type placeholders
//! - **`UInt` for the top half of BIGINT UNSIGNED**: narrower unsigned columns
//!   fit in `Int` and decode there
//! - **Lenient numerics on encode**: an integer column accepts any numeric
//!   value whose integer part is in range

use std::fmt;

use crate::codec::CodecError;
use crate::dtypes::ColumnType;

/// A single cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::UInt(u) => i64::try_from(*u).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::UInt(u) => Some(*u as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Short name of the variant, used in type-mismatch messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Int(_) | Value::UInt(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Binary(_) => "binary",
        }
    }

    /// Integer view of a numeric value, range-checked against `ty`.
    ///
    /// Finite floats are truncated toward zero first. NaN and infinities
    /// cannot be represented in an integer column.
    pub fn to_integer(&self, ty: ColumnType) -> Result<i128, CodecError> {
        let value = match self {
            Value::Int(i) => i128::from(*i),
            Value::UInt(u) => i128::from(*u),
            Value::Float(f) if f.is_finite() => f.trunc() as i128,
            Value::Float(f) => {
                return Err(CodecError::OutOfRange {
                    value: f.to_string(),
                    type_name: ty.sql_name(),
                })
            }
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: ty.sql_name(),
                    got: other.kind_name(),
                })
            }
        };
        ty.check_int(value)?;
        Ok(value)
    }

    /// Float view of a numeric value.
    pub fn to_float(&self, ty: ColumnType) -> Result<f64, CodecError> {
        self.as_f64().ok_or_else(|| CodecError::TypeMismatch {
            expected: ty.sql_name(),
            got: self.kind_name(),
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::UInt(u) => write!(f, "{u}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Binary(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
