//! # rowdat_1
//!
//! Compact little-endian row format. Per row:
//!
//! ```text
//! row_id: i64
//! per column:
//!   is_null: u8            (1 = null, 0 = present)
//!   fixed width  -> 1/2/4/8 bytes; the type default on null
//!   text/binary  -> len: i64, then len bytes; len 0 on null
//! ```
//!
//! Rows repeat until the buffer is exhausted. There is no row count and no
//! resync marker, so both ends must agree on every column width.
//!
//! Two strategies implement the format:
//!
//! - [`Strategy::Reference`]: cursor-based, value at a time
//! - [`Strategy::Accelerated`]: plan-compiled, slice-based, typed pushes
//!
//! They produce identical bytes and batches.

mod accelerated;
mod reference;

use crate::batch::{narrow_f32, ColumnBatch, RowBatch};
use crate::codec::{Codec, CodecError, ROWDAT_1_CONTENT_TYPE};
use crate::dtypes::{column_types, ColumnSpec, ColumnType};
use crate::value::Value;

pub(crate) const NULL_FLAG: u8 = 1;
pub(crate) const PRESENT_FLAG: u8 = 0;

/// Implementation path used by [`Rowdat1`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    Reference,
    #[default]
    Accelerated,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Rowdat1 {
    strategy: Strategy,
}

impl Rowdat1 {
    pub fn new(strategy: Strategy) -> Self {
        Rowdat1 { strategy }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
}

impl Codec for Rowdat1 {
    fn name(&self) -> &'static str {
        "rowdat_1"
    }

    fn content_type(&self) -> &'static str {
        ROWDAT_1_CONTENT_TYPE
    }

    fn load_rows(&self, colspec: &[ColumnSpec], data: &[u8]) -> Result<RowBatch, CodecError> {
        let types = column_types(colspec)?;
        match self.strategy {
            Strategy::Reference => reference::load_rows(&types, data),
            Strategy::Accelerated => accelerated::load_rows(&types, data),
        }
    }

    fn load_columns(
        &self,
        colspec: &[ColumnSpec],
        data: &[u8],
    ) -> Result<ColumnBatch, CodecError> {
        let types = column_types(colspec)?;
        match self.strategy {
            Strategy::Reference => reference::load_columns(&types, data),
            Strategy::Accelerated => accelerated::load_columns(&types, data),
        }
    }

    fn dump_rows(&self, returns: &[ColumnSpec], batch: &RowBatch) -> Result<Vec<u8>, CodecError> {
        let types = column_types(returns)?;
        batch.validate()?;
        match self.strategy {
            Strategy::Reference => reference::dump_rows(&types, batch),
            Strategy::Accelerated => accelerated::dump_rows(&types, batch),
        }
    }

    fn dump_columns(
        &self,
        returns: &[ColumnSpec],
        batch: &ColumnBatch,
    ) -> Result<Vec<u8>, CodecError> {
        let types = column_types(returns)?;
        batch.validate()?;
        if batch.columns.len() != types.len() {
            return Err(CodecError::ArityMismatch {
                expected: types.len(),
                got: batch.columns.len(),
            });
        }
        match self.strategy {
            Strategy::Reference => reference::dump_columns(&types, batch),
            Strategy::Accelerated => accelerated::dump_columns(&types, batch),
        }
    }
}

/// Write the placeholder a null cell occupies on the wire.
pub(crate) fn write_default(out: &mut Vec<u8>, ty: ColumnType) {
    match ty {
        ColumnType::Float32 => out.extend_from_slice(&f32::NAN.to_le_bytes()),
        ColumnType::Float64 => out.extend_from_slice(&f64::NAN.to_le_bytes()),
        ColumnType::Text(_) | ColumnType::Binary(_) => out.extend_from_slice(&0_i64.to_le_bytes()),
        fixed => {
            let width = fixed.fixed_width().unwrap_or(0);
            out.resize(out.len() + width, 0);
        }
    }
}

pub(crate) fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as i64).to_le_bytes());
    out.extend_from_slice(bytes);
}

/// Write one cell: null flag, then the value or the type default.
///
/// Integer values are range-checked against `ty`, MEDIUMINT against its
/// 24-bit range rather than its 4-byte slot.
pub(crate) fn write_value(out: &mut Vec<u8>, ty: ColumnType, value: &Value) -> Result<(), CodecError> {
    if value.is_null() {
        out.push(NULL_FLAG);
        write_default(out, ty);
        return Ok(());
    }
    out.push(PRESENT_FLAG);
    match ty {
        ColumnType::Int8 => out.extend_from_slice(&(value.to_integer(ty)? as i8).to_le_bytes()),
        ColumnType::UInt8 => out.push(value.to_integer(ty)? as u8),
        ColumnType::Int16 => out.extend_from_slice(&(value.to_integer(ty)? as i16).to_le_bytes()),
        ColumnType::UInt16 => {
            out.extend_from_slice(&(value.to_integer(ty)? as u16).to_le_bytes());
        }
        ColumnType::Int24 | ColumnType::Int32 => {
            out.extend_from_slice(&(value.to_integer(ty)? as i32).to_le_bytes());
        }
        ColumnType::UInt24 | ColumnType::UInt32 => {
            out.extend_from_slice(&(value.to_integer(ty)? as u32).to_le_bytes());
        }
        ColumnType::Int64 => out.extend_from_slice(&(value.to_integer(ty)? as i64).to_le_bytes()),
        ColumnType::UInt64 => {
            out.extend_from_slice(&(value.to_integer(ty)? as u64).to_le_bytes());
        }
        ColumnType::Float32 => {
            out.extend_from_slice(&narrow_f32(value.to_float(ty)?)?.to_le_bytes());
        }
        ColumnType::Float64 => out.extend_from_slice(&value.to_float(ty)?.to_le_bytes()),
        ColumnType::Text(_) => match value {
            Value::Text(s) => write_bytes(out, s.as_bytes()),
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: ty.sql_name(),
                    got: other.kind_name(),
                })
            }
        },
        ColumnType::Binary(_) => match value {
            Value::Binary(b) => write_bytes(out, b),
            Value::Text(s) => write_bytes(out, s.as_bytes()),
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: ty.sql_name(),
                    got: other.kind_name(),
                })
            }
        },
    }
    Ok(())
}

/// Validate a length prefix against the bytes left in the buffer.
pub(crate) fn checked_len(raw: i64, remaining: usize) -> Result<usize, CodecError> {
    if raw < 0 {
        return Err(CodecError::NegativeLength(raw));
    }
    let len = usize::try_from(raw).unwrap_or(usize::MAX);
    if len > remaining {
        return Err(CodecError::Truncated {
            needed: len,
            remaining,
        });
    }
    Ok(len)
}
