//! Accelerated path: column types are compiled into a plan once per call,
//! decoding indexes straight into the input slice, and vector decode pushes
//! into typed vectors without going through [`Value`].

use super::{checked_len, write_bytes, write_default, write_value, NULL_FLAG, PRESENT_FLAG};
use crate::batch::{Column, ColumnBatch, ColumnBuffer, ColumnData, RowBatch};
use crate::codec::CodecError;
use crate::dtypes::ColumnType;
use crate::value::Value;

/// Per-call decode/encode plan.
struct Plan<'a> {
    types: &'a [ColumnType],
    /// Bytes per row when every column is fixed width
    stride: Option<usize>,
}

impl<'a> Plan<'a> {
    fn new(types: &'a [ColumnType]) -> Self {
        let stride = types
            .iter()
            .map(|ty| ty.fixed_width().map(|w| w + 1))
            .sum::<Option<usize>>()
            .map(|cells| cells + 8);
        Plan { types, stride }
    }

    /// Row count estimate for preallocation.
    fn estimate_rows(&self, bytes: usize) -> usize {
        match self.stride {
            Some(stride) => bytes / stride,
            None => bytes / (8 + 9 * self.types.len()).max(8),
        }
    }

    fn estimate_bytes(&self, rows: usize) -> usize {
        self.stride.unwrap_or(8 + 17 * self.types.len()) * rows
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Reader { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(CodecError::Truncated {
                needed: n,
                remaining,
            });
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut buf = [0_u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    fn flag(&mut self) -> Result<bool, CodecError> {
        Ok(self.take(1)?[0] == NULL_FLAG)
    }

    fn prefixed(&mut self) -> Result<&'a [u8], CodecError> {
        let raw = i64::from_le_bytes(self.array()?);
        let len = checked_len(raw, self.remaining())?;
        self.take(len)
    }
}

fn read_value(reader: &mut Reader<'_>, ty: ColumnType) -> Result<Value, CodecError> {
    let null = reader.flag()?;
    let value = match ty {
        ColumnType::Int8 => Value::Int(i8::from_le_bytes(reader.array()?).into()),
        ColumnType::UInt8 => Value::Int(reader.array::<1>()?[0].into()),
        ColumnType::Int16 => Value::Int(i16::from_le_bytes(reader.array()?).into()),
        ColumnType::UInt16 => Value::Int(u16::from_le_bytes(reader.array()?).into()),
        ColumnType::Int24 | ColumnType::Int32 => {
            Value::Int(i32::from_le_bytes(reader.array()?).into())
        }
        ColumnType::UInt24 | ColumnType::UInt32 => {
            Value::Int(u32::from_le_bytes(reader.array()?).into())
        }
        ColumnType::Int64 => Value::Int(i64::from_le_bytes(reader.array()?)),
        ColumnType::UInt64 => Value::UInt(u64::from_le_bytes(reader.array()?)),
        ColumnType::Float32 => Value::Float(f32::from_le_bytes(reader.array()?).into()),
        ColumnType::Float64 => Value::Float(f64::from_le_bytes(reader.array()?)),
        ColumnType::Text(_) => {
            let bytes = reader.prefixed()?;
            if null {
                return Ok(Value::Null);
            }
            Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| CodecError::InvalidUtf8)?
                    .to_owned(),
            )
        }
        ColumnType::Binary(_) => Value::Binary(reader.prefixed()?.to_vec()),
    };
    Ok(if null { Value::Null } else { value })
}

pub(super) fn load_rows(types: &[ColumnType], data: &[u8]) -> Result<RowBatch, CodecError> {
    let plan = Plan::new(types);
    let mut reader = Reader::new(data);
    let mut batch = RowBatch::with_capacity(plan.estimate_rows(data.len()));
    while reader.remaining() > 0 {
        let row_id = i64::from_le_bytes(reader.array()?);
        let mut row = Vec::with_capacity(types.len());
        for ty in plan.types {
            row.push(read_value(&mut reader, *ty)?);
        }
        batch.push(row_id, row);
    }
    Ok(batch)
}

/// Decode one cell straight into the column's typed vector.
fn decode_cell(reader: &mut Reader<'_>, column: &mut Column) -> Result<(), CodecError> {
    let null = reader.flag()?;
    macro_rules! fixed {
        ($v:expr, $t:ty, $default:expr) => {{
            let x = <$t>::from_le_bytes(reader.array()?);
            $v.push(if null { $default } else { x });
        }};
    }
    match &mut column.data {
        ColumnData::Int8(v) => fixed!(v, i8, 0),
        ColumnData::UInt8(v) => fixed!(v, u8, 0),
        ColumnData::Int16(v) => fixed!(v, i16, 0),
        ColumnData::UInt16(v) => fixed!(v, u16, 0),
        ColumnData::Int32(v) => fixed!(v, i32, 0),
        ColumnData::UInt32(v) => fixed!(v, u32, 0),
        ColumnData::Int64(v) => fixed!(v, i64, 0),
        ColumnData::UInt64(v) => fixed!(v, u64, 0),
        ColumnData::Float32(v) => fixed!(v, f32, f32::NAN),
        ColumnData::Float64(v) => fixed!(v, f64, f64::NAN),
        ColumnData::Text(v) => {
            let bytes = reader.prefixed()?;
            if null {
                v.push(String::new());
            } else {
                let s = std::str::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?;
                v.push(s.to_owned());
            }
        }
        ColumnData::Binary(v) => {
            let bytes = reader.prefixed()?;
            v.push(if null { Vec::new() } else { bytes.to_vec() });
        }
    }
    if let Some(mask) = column.mask.as_mut() {
        mask.push(null);
    }
    Ok(())
}

pub(super) fn load_columns(types: &[ColumnType], data: &[u8]) -> Result<ColumnBatch, CodecError> {
    let plan = Plan::new(types);
    let rows = plan.estimate_rows(data.len());
    let mut reader = Reader::new(data);
    let mut row_ids = Vec::with_capacity(rows);
    let mut columns: Vec<Column> = types
        .iter()
        .map(|ty| Column::with_capacity(*ty, rows, true))
        .collect();
    while reader.remaining() > 0 {
        row_ids.push(i64::from_le_bytes(reader.array()?));
        for column in &mut columns {
            decode_cell(&mut reader, column)?;
        }
    }
    Ok(ColumnBatch::new(row_ids, columns))
}

pub(super) fn dump_rows(types: &[ColumnType], batch: &RowBatch) -> Result<Vec<u8>, CodecError> {
    let plan = Plan::new(types);
    let mut out = Vec::with_capacity(plan.estimate_bytes(batch.len()));
    for (row_id, row) in batch.iter() {
        if row.len() != types.len() {
            return Err(CodecError::ArityMismatch {
                expected: types.len(),
                got: row.len(),
            });
        }
        out.extend_from_slice(&row_id.to_le_bytes());
        for (ty, value) in plan.types.iter().zip(row) {
            write_value(&mut out, *ty, value)?;
        }
    }
    Ok(out)
}

/// Whether a column's vector can be written without per-value conversion.
///
/// MEDIUMINT always takes the checked path because its storage is wider than
/// its range.
fn direct(column: &Column, ty: ColumnType) -> bool {
    column.data.is_storage_for(ty) && !matches!(ty, ColumnType::Int24 | ColumnType::UInt24)
}

fn write_direct(out: &mut Vec<u8>, data: &ColumnData, i: usize, null: bool, ty: ColumnType) {
    if null {
        out.push(NULL_FLAG);
        write_default(out, ty);
        return;
    }
    out.push(PRESENT_FLAG);
    match data {
        ColumnData::Int8(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::UInt8(v) => out.push(v[i]),
        ColumnData::Int16(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::UInt16(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::Int32(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::UInt32(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::Int64(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::UInt64(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::Float32(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::Float64(v) => out.extend_from_slice(&v[i].to_le_bytes()),
        ColumnData::Text(v) => write_bytes(out, v[i].as_bytes()),
        ColumnData::Binary(v) => write_bytes(out, &v[i]),
    }
}

pub(super) fn dump_columns(types: &[ColumnType], batch: &ColumnBatch) -> Result<Vec<u8>, CodecError> {
    let plan = Plan::new(types);
    let fast_paths: Vec<bool> = batch
        .columns
        .iter()
        .zip(types)
        .map(|(column, ty)| direct(column, *ty))
        .collect();
    let mut out = Vec::with_capacity(plan.estimate_bytes(batch.len()));
    for (i, row_id) in batch.row_ids.iter().enumerate() {
        out.extend_from_slice(&row_id.to_le_bytes());
        for ((column, ty), fast) in batch.columns.iter().zip(plan.types).zip(&fast_paths) {
            if *fast {
                write_direct(&mut out, &column.data, i, column.is_null(i), *ty);
            } else {
                let value = column.get(i).unwrap_or(Value::Null);
                write_value(&mut out, *ty, &value)?;
            }
        }
    }
    Ok(out)
}
