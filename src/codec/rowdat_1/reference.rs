//! Reference path: a `Cursor` walks the buffer one value at a time and every
//! cell goes through [`Value`].

use std::io::{Cursor, Read};

use super::{checked_len, write_value, NULL_FLAG};
use crate::batch::{Column, ColumnBatch, ColumnBuffer, RowBatch};
use crate::codec::CodecError;
use crate::dtypes::ColumnType;
use crate::value::Value;

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    let len = cursor.get_ref().len();
    len.saturating_sub(cursor.position() as usize)
}

fn read_array<const N: usize>(cursor: &mut Cursor<&[u8]>) -> Result<[u8; N], CodecError> {
    let left = remaining(cursor);
    let mut buf = [0_u8; N];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated {
            needed: N,
            remaining: left,
        })?;
    Ok(buf)
}

fn read_prefixed(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, CodecError> {
    let raw = i64::from_le_bytes(read_array(cursor)?);
    let len = checked_len(raw, remaining(cursor))?;
    let mut buf = vec![0_u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| CodecError::Truncated {
            needed: len,
            remaining: 0,
        })?;
    Ok(buf)
}

fn read_value(cursor: &mut Cursor<&[u8]>, ty: ColumnType) -> Result<Value, CodecError> {
    let [flag] = read_array::<1>(cursor)?;
    let value = match ty {
        ColumnType::Int8 => Value::Int(i8::from_le_bytes(read_array(cursor)?).into()),
        ColumnType::UInt8 => Value::Int(u8::from_le_bytes(read_array(cursor)?).into()),
        ColumnType::Int16 => Value::Int(i16::from_le_bytes(read_array(cursor)?).into()),
        ColumnType::UInt16 => Value::Int(u16::from_le_bytes(read_array(cursor)?).into()),
        ColumnType::Int24 | ColumnType::Int32 => {
            Value::Int(i32::from_le_bytes(read_array(cursor)?).into())
        }
        ColumnType::UInt24 | ColumnType::UInt32 => {
            Value::Int(u32::from_le_bytes(read_array(cursor)?).into())
        }
        ColumnType::Int64 => Value::Int(i64::from_le_bytes(read_array(cursor)?)),
        ColumnType::UInt64 => Value::UInt(u64::from_le_bytes(read_array(cursor)?)),
        ColumnType::Float32 => Value::Float(f32::from_le_bytes(read_array(cursor)?).into()),
        ColumnType::Float64 => Value::Float(f64::from_le_bytes(read_array(cursor)?)),
        ColumnType::Text(_) => {
            let bytes = read_prefixed(cursor)?;
            if flag == NULL_FLAG {
                Value::Null
            } else {
                Value::Text(String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8)?)
            }
        }
        ColumnType::Binary(_) => Value::Binary(read_prefixed(cursor)?),
    };
    if flag == NULL_FLAG {
        return Ok(Value::Null);
    }
    Ok(value)
}

pub(super) fn load_rows(types: &[ColumnType], data: &[u8]) -> Result<RowBatch, CodecError> {
    let mut cursor = Cursor::new(data);
    let mut batch = RowBatch::default();
    while remaining(&cursor) > 0 {
        let row_id = i64::from_le_bytes(read_array(&mut cursor)?);
        let row = types
            .iter()
            .map(|ty| read_value(&mut cursor, *ty))
            .collect::<Result<Vec<_>, _>>()?;
        batch.push(row_id, row);
    }
    Ok(batch)
}

pub(super) fn load_columns(types: &[ColumnType], data: &[u8]) -> Result<ColumnBatch, CodecError> {
    let mut cursor = Cursor::new(data);
    let mut row_ids = Vec::new();
    let mut columns: Vec<Column> = types
        .iter()
        .map(|ty| Column::with_capacity(*ty, 0, true))
        .collect();
    while remaining(&cursor) > 0 {
        row_ids.push(i64::from_le_bytes(read_array(&mut cursor)?));
        for (column, ty) in columns.iter_mut().zip(types) {
            column.push(&read_value(&mut cursor, *ty)?)?;
        }
    }
    Ok(ColumnBatch::new(row_ids, columns))
}

pub(super) fn dump_rows(types: &[ColumnType], batch: &RowBatch) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for (row_id, row) in batch.iter() {
        if row.len() != types.len() {
            return Err(CodecError::ArityMismatch {
                expected: types.len(),
                got: row.len(),
            });
        }
        out.extend_from_slice(&row_id.to_le_bytes());
        for (ty, value) in types.iter().zip(row) {
            write_value(&mut out, *ty, value)?;
        }
    }
    Ok(out)
}

pub(super) fn dump_columns(types: &[ColumnType], batch: &ColumnBatch) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    for (i, row_id) in batch.row_ids.iter().enumerate() {
        out.extend_from_slice(&row_id.to_le_bytes());
        for (ty, column) in types.iter().zip(&batch.columns) {
            let value = column.get(i).unwrap_or(Value::Null);
            write_value(&mut out, *ty, &value)?;
        }
    }
    Ok(out)
}
