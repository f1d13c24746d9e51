//! # Column Types
//!
//! Type codes exchanged with the database and their classification.
//!
//! A type code is a signed integer. Its magnitude selects the SQL type, its
//! sign marks the unsigned variant of an integer type or the binary variant of
//! a string type:
//!
//! | Code | Type | Wire width |
//! |------|------|------------|
//! | ±1 | TINYINT | 1 |
//! | ±2 | SMALLINT | 2 |
//! | ±9 | MEDIUMINT | 4 (validated as 24-bit) |
//! | ±3 | INT | 4 |
//! | ±8 | BIGINT | 8 |
//! | 4 | FLOAT | 4 |
//! | 5 | DOUBLE | 8 |
//! | 15, 245, 247-254 | text (negated: binary) | 8-byte length + bytes |

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codec::CodecError;
use crate::value::Value;

/// Raw type codes
pub mod codes {
    pub const TINY: i32 = 1;
    pub const SHORT: i32 = 2;
    pub const LONG: i32 = 3;
    pub const FLOAT: i32 = 4;
    pub const DOUBLE: i32 = 5;
    pub const LONGLONG: i32 = 8;
    pub const INT24: i32 = 9;
    pub const VARCHAR: i32 = 15;
    pub const JSON: i32 = 245;
    pub const ENUM: i32 = 247;
    pub const SET: i32 = 248;
    pub const TINY_BLOB: i32 = 249;
    pub const MEDIUM_BLOB: i32 = 250;
    pub const LONG_BLOB: i32 = 251;
    pub const BLOB: i32 = 252;
    pub const VAR_STRING: i32 = 253;
    pub const STRING: i32 = 254;

    /// Codes carried as length-prefixed text (negated: binary)
    pub const STRING_CODES: [i32; 10] = [
        VARCHAR,
        JSON,
        ENUM,
        SET,
        TINY_BLOB,
        MEDIUM_BLOB,
        LONG_BLOB,
        BLOB,
        VAR_STRING,
        STRING,
    ];
}

pub const MEDIUMINT_MIN: i64 = -8_388_608;
pub const MEDIUMINT_MAX: i64 = 8_388_607;
pub const MEDIUMINT_UNSIGNED_MAX: i64 = 16_777_215;

/// Decoded classification of a type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    /// MEDIUMINT, carried in a 4-byte slot
    Int24,
    UInt24,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    /// UTF-8 text; keeps the original code for SQL rendering
    Text(i32),
    /// Raw bytes; keeps the original (negative) code
    Binary(i32),
}

impl ColumnType {
    /// Classify a type code. Unknown codes are a value error.
    pub fn from_code(code: i32) -> Result<Self, CodecError> {
        use codes::*;
        let ty = match code {
            TINY => ColumnType::Int8,
            c if c == -TINY => ColumnType::UInt8,
            SHORT => ColumnType::Int16,
            c if c == -SHORT => ColumnType::UInt16,
            INT24 => ColumnType::Int24,
            c if c == -INT24 => ColumnType::UInt24,
            LONG => ColumnType::Int32,
            c if c == -LONG => ColumnType::UInt32,
            LONGLONG => ColumnType::Int64,
            c if c == -LONGLONG => ColumnType::UInt64,
            FLOAT => ColumnType::Float32,
            DOUBLE => ColumnType::Float64,
            c if STRING_CODES.contains(&c) => ColumnType::Text(c),
            c if c < 0 && STRING_CODES.contains(&-c) => ColumnType::Binary(c),
            other => return Err(CodecError::UnknownType(other)),
        };
        Ok(ty)
    }

    /// The type code this classification came from.
    pub fn code(self) -> i32 {
        use codes::*;
        match self {
            ColumnType::Int8 => TINY,
            ColumnType::UInt8 => -TINY,
            ColumnType::Int16 => SHORT,
            ColumnType::UInt16 => -SHORT,
            ColumnType::Int24 => INT24,
            ColumnType::UInt24 => -INT24,
            ColumnType::Int32 => LONG,
            ColumnType::UInt32 => -LONG,
            ColumnType::Int64 => LONGLONG,
            ColumnType::UInt64 => -LONGLONG,
            ColumnType::Float32 => FLOAT,
            ColumnType::Float64 => DOUBLE,
            ColumnType::Text(c) | ColumnType::Binary(c) => c,
        }
    }

    /// Bytes occupied on the wire, `None` for length-prefixed types.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            ColumnType::Int8 | ColumnType::UInt8 => Some(1),
            ColumnType::Int16 | ColumnType::UInt16 => Some(2),
            ColumnType::Int24
            | ColumnType::UInt24
            | ColumnType::Int32
            | ColumnType::UInt32
            | ColumnType::Float32 => Some(4),
            ColumnType::Int64 | ColumnType::UInt64 | ColumnType::Float64 => Some(8),
            ColumnType::Text(_) | ColumnType::Binary(_) => None,
        }
    }

    pub fn is_integer(self) -> bool {
        self.int_range().is_some()
    }

    pub fn is_float(self) -> bool {
        matches!(self, ColumnType::Float32 | ColumnType::Float64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            ColumnType::UInt8
                | ColumnType::UInt16
                | ColumnType::UInt24
                | ColumnType::UInt32
                | ColumnType::UInt64
        )
    }

    /// Inclusive value range of an integer type.
    ///
    /// The 24-bit types report the MEDIUMINT range, not the range of their
    /// 4-byte storage slot.
    pub fn int_range(self) -> Option<(i128, i128)> {
        let range = match self {
            ColumnType::Int8 => (i8::MIN as i128, i8::MAX as i128),
            ColumnType::UInt8 => (0, u8::MAX as i128),
            ColumnType::Int16 => (i16::MIN as i128, i16::MAX as i128),
            ColumnType::UInt16 => (0, u16::MAX as i128),
            ColumnType::Int24 => (MEDIUMINT_MIN as i128, MEDIUMINT_MAX as i128),
            ColumnType::UInt24 => (0, MEDIUMINT_UNSIGNED_MAX as i128),
            ColumnType::Int32 => (i32::MIN as i128, i32::MAX as i128),
            ColumnType::UInt32 => (0, u32::MAX as i128),
            ColumnType::Int64 => (i64::MIN as i128, i64::MAX as i128),
            ColumnType::UInt64 => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Validate an integer against this type's range.
    pub fn check_int(self, value: i128) -> Result<(), CodecError> {
        match self.int_range() {
            Some((min, max)) if value < min || value > max => Err(CodecError::OutOfRange {
                value: value.to_string(),
                type_name: self.sql_name(),
            }),
            Some(_) => Ok(()),
            None => Err(CodecError::TypeMismatch {
                expected: self.sql_name(),
                got: "integer",
            }),
        }
    }

    /// Placeholder stored in dense vectors for null slots, and written on the
    /// wire for null fixed-width values.
    pub fn default_value(self) -> Value {
        match self {
            ColumnType::Float32 | ColumnType::Float64 => Value::Float(f64::NAN),
            ColumnType::UInt64 => Value::UInt(0),
            ColumnType::Text(_) => Value::Text(String::new()),
            ColumnType::Binary(_) => Value::Binary(Vec::new()),
            _ => Value::Int(0),
        }
    }

    /// SQL type name used in `CREATE FUNCTION` statements.
    pub fn sql_name(self) -> &'static str {
        use codes::*;
        match self {
            ColumnType::Int8 => "TINYINT",
            ColumnType::UInt8 => "TINYINT UNSIGNED",
            ColumnType::Int16 => "SMALLINT",
            ColumnType::UInt16 => "SMALLINT UNSIGNED",
            ColumnType::Int24 => "MEDIUMINT",
            ColumnType::UInt24 => "MEDIUMINT UNSIGNED",
            ColumnType::Int32 => "INT",
            ColumnType::UInt32 => "INT UNSIGNED",
            ColumnType::Int64 => "BIGINT",
            ColumnType::UInt64 => "BIGINT UNSIGNED",
            ColumnType::Float32 => "FLOAT",
            ColumnType::Float64 => "DOUBLE",
            ColumnType::Text(code) => match code {
                JSON => "JSON",
                TINY_BLOB => "TINYTEXT",
                MEDIUM_BLOB => "MEDIUMTEXT",
                LONG_BLOB => "LONGTEXT",
                BLOB => "TEXT",
                STRING => "CHAR(255)",
                _ => "VARCHAR(255)",
            },
            ColumnType::Binary(code) => match -code {
                TINY_BLOB => "TINYBLOB",
                MEDIUM_BLOB => "MEDIUMBLOB",
                LONG_BLOB => "LONGBLOB",
                BLOB => "BLOB",
                STRING => "BINARY(255)",
                _ => "VARBINARY(255)",
            },
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// One named, typed column of a function's input or output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub type_code: i32,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, type_code: i32) -> Self {
        ColumnSpec {
            name: name.into(),
            type_code,
        }
    }

    pub fn column_type(&self) -> Result<ColumnType, CodecError> {
        ColumnType::from_code(self.type_code)
    }
}

/// Classify every column of a spec, failing on the first unknown code.
pub fn column_types(colspec: &[ColumnSpec]) -> Result<Vec<ColumnType>, CodecError> {
    colspec.iter().map(ColumnSpec::column_type).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for code in [1, -1, 2, -2, 3, -3, 4, 5, 8, -8, 9, -9, 15, -15, 245, 252, -254] {
            let ty = ColumnType::from_code(code).unwrap();
            assert_eq!(ty.code(), code, "code {code}");
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        for code in [0, 6, 7, -4, -5, 10, 246, -245 + 1000, 255] {
            assert!(
                matches!(ColumnType::from_code(code), Err(CodecError::UnknownType(c)) if c == code),
                "code {code} should be rejected"
            );
        }
    }

    #[test]
    fn test_binary_is_negated_text() {
        assert_eq!(ColumnType::from_code(-252).unwrap(), ColumnType::Binary(-252));
        assert_eq!(ColumnType::from_code(252).unwrap(), ColumnType::Text(252));
    }

    #[test]
    fn test_widths() {
        assert_eq!(ColumnType::Int8.fixed_width(), Some(1));
        assert_eq!(ColumnType::UInt16.fixed_width(), Some(2));
        assert_eq!(ColumnType::Int24.fixed_width(), Some(4));
        assert_eq!(ColumnType::Float32.fixed_width(), Some(4));
        assert_eq!(ColumnType::UInt64.fixed_width(), Some(8));
        assert_eq!(ColumnType::Text(15).fixed_width(), None);
    }

    #[test]
    fn test_mediumint_range_is_24_bit() {
        assert!(ColumnType::Int24.check_int(8_388_607).is_ok());
        assert!(ColumnType::Int24.check_int(-8_388_608).is_ok());
        assert!(ColumnType::Int24.check_int(8_388_608).is_err());
        assert!(ColumnType::Int24.check_int(-8_388_609).is_err());
        assert!(ColumnType::UInt24.check_int(16_777_215).is_ok());
        assert!(ColumnType::UInt24.check_int(16_777_216).is_err());
        assert!(ColumnType::UInt24.check_int(-1).is_err());
    }

    #[test]
    fn test_default_values() {
        assert_eq!(ColumnType::Int32.default_value(), Value::Int(0));
        assert!(matches!(ColumnType::Float64.default_value(), Value::Float(f) if f.is_nan()));
        assert_eq!(ColumnType::Text(15).default_value(), Value::Text(String::new()));
        assert_eq!(ColumnType::Binary(-15).default_value(), Value::Binary(Vec::new()));
    }

    #[test]
    fn test_sql_names() {
        assert_eq!(ColumnType::UInt24.sql_name(), "MEDIUMINT UNSIGNED");
        assert_eq!(ColumnType::Text(252).sql_name(), "TEXT");
        assert_eq!(ColumnType::Binary(-252).sql_name(), "BLOB");
        assert_eq!(ColumnType::Text(15).sql_name(), "VARCHAR(255)");
    }
}
