//! Codec errors. Every variant is a value error: the payload, not the
//! connection, is at fault.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    /// Type code outside the known set
    #[error("unrecognized column type: {0}")]
    UnknownType(i32),

    /// Buffer ended in the middle of a row
    #[error("buffer truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    /// Integer outside the range of its declared type, or a float that does
    /// not fit its slot
    #[error("value {value} is out of range for {type_name}")]
    OutOfRange {
        value: String,
        type_name: &'static str,
    },

    /// Value kind does not fit the column
    #[error("expected {expected} value, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    #[error("text column holds invalid UTF-8")]
    InvalidUtf8,

    #[error("negative length prefix: {0}")]
    NegativeLength(i64),

    /// Column or row count disagrees with the row ids
    #[error("length mismatch: expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// Row or batch has a different number of columns than its column specs
    #[error("column count mismatch: spec has {expected}, data has {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// NaN or infinity headed for a format that cannot carry it
    #[error("non-finite float {0} has no JSON representation")]
    NotFinite(f64),

    #[error("JSON payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow payload error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("{0}")]
    Invalid(String),
}
