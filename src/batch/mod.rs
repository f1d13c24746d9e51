//! # Batches
//!
//! In-memory forms of a decoded payload.
//!
//! - [`RowBatch`]: row ids plus one `Vec<Value>` per row; consumed by
//!   row-at-a-time functions
//! - [`ColumnBatch`]: row ids plus one dense [`Column`] per argument; consumed
//!   by vector functions
//! - [`Payload`]: either of the two, as produced by `Codec::load` and
//!   accepted by `Codec::dump`

pub mod arrow;
pub mod column;

pub use column::{narrow_f32, Column, ColumnBuffer, ColumnData};

use crate::codec::CodecError;
use crate::dtypes::ColumnType;
use crate::value::Value;

/// Which in-memory form a codec should decode into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchShape {
    Rows,
    Columns,
}

impl BatchShape {
    pub fn name(self) -> &'static str {
        match self {
            BatchShape::Rows => "row",
            BatchShape::Columns => "column",
        }
    }
}

/// Row-oriented batch. `rows[i]` belongs to `row_ids[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowBatch {
    pub row_ids: Vec<i64>,
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    pub fn new(row_ids: Vec<i64>, rows: Vec<Vec<Value>>) -> Self {
        RowBatch { row_ids, rows }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        RowBatch {
            row_ids: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, row_id: i64, row: Vec<Value>) {
        self.row_ids.push(row_id);
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &[Value])> {
        self.row_ids
            .iter()
            .copied()
            .zip(self.rows.iter().map(Vec::as_slice))
    }

    pub fn validate(&self) -> Result<(), CodecError> {
        if self.rows.len() != self.row_ids.len() {
            return Err(CodecError::LengthMismatch {
                expected: self.row_ids.len(),
                got: self.rows.len(),
            });
        }
        Ok(())
    }
}

/// Column-oriented batch. Every column has one slot per row id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnBatch {
    pub row_ids: Vec<i64>,
    pub columns: Vec<Column>,
}

impl ColumnBatch {
    pub fn new(row_ids: Vec<i64>, columns: Vec<Column>) -> Self {
        ColumnBatch { row_ids, columns }
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    /// Check that every data vector and mask matches the row count.
    pub fn validate(&self) -> Result<(), CodecError> {
        let expected = self.row_ids.len();
        for column in &self.columns {
            let got = column.data.len();
            if got != expected {
                return Err(CodecError::LengthMismatch { expected, got });
            }
            if let Some(mask) = &column.mask {
                if mask.len() != expected {
                    return Err(CodecError::LengthMismatch {
                        expected,
                        got: mask.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Pivot into rows, nulls taken from the masks.
    pub fn to_rows(&self) -> Result<RowBatch, CodecError> {
        self.validate()?;
        let mut batch = RowBatch::with_capacity(self.len());
        for (i, row_id) in self.row_ids.iter().enumerate() {
            let row = self
                .columns
                .iter()
                .map(|c| c.get(i).unwrap_or(Value::Null))
                .collect();
            batch.push(*row_id, row);
        }
        Ok(batch)
    }

    /// Pivot rows into dense columns of the given types.
    pub fn from_rows(
        rows: &RowBatch,
        types: &[ColumnType],
        masked: bool,
    ) -> Result<Self, CodecError> {
        rows.validate()?;
        let mut columns: Vec<Column> = types
            .iter()
            .map(|ty| Column::with_capacity(*ty, rows.len(), masked))
            .collect();
        for (_, row) in rows.iter() {
            if row.len() != types.len() {
                return Err(CodecError::ArityMismatch {
                    expected: types.len(),
                    got: row.len(),
                });
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value)?;
            }
        }
        Ok(ColumnBatch::new(rows.row_ids.clone(), columns))
    }
}

/// Decoded payload in whichever shape the endpoint consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Rows(RowBatch),
    Columns(ColumnBatch),
}

impl Payload {
    pub fn shape(&self) -> BatchShape {
        match self {
            Payload::Rows(_) => BatchShape::Rows,
            Payload::Columns(_) => BatchShape::Columns,
        }
    }

    pub fn row_ids(&self) -> &[i64] {
        match self {
            Payload::Rows(b) => &b.row_ids,
            Payload::Columns(b) => &b.row_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.row_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids().is_empty()
    }

    pub fn into_rows(self) -> Result<RowBatch, CodecError> {
        match self {
            Payload::Rows(b) => Ok(b),
            Payload::Columns(b) => b.to_rows(),
        }
    }
}

impl From<RowBatch> for Payload {
    fn from(batch: RowBatch) -> Self {
        Payload::Rows(batch)
    }
}

impl From<ColumnBatch> for Payload {
    fn from(batch: ColumnBatch) -> Self {
        Payload::Columns(batch)
    }
}
