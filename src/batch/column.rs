//! Dense typed columns and the `ColumnBuffer` capability.
//!
//! A column is a plain native vector plus an optional null mask. Null slots
//! hold the type's placeholder (0, NaN, empty string, empty bytes) so the
//! vector stays dense; the mask is the only source of truth for nullness.

use std::borrow::Cow;

use crate::codec::CodecError;
use crate::dtypes::ColumnType;
use crate::value::Value;

/// One dense vector per storage type. MEDIUMINT columns are stored in
/// `Int32` / `UInt32`.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Text(Vec<String>),
    Binary(Vec<Vec<u8>>),
}

macro_rules! each_variant {
    ($data:expr, $v:ident => $body:expr) => {
        match $data {
            ColumnData::Int8($v) => $body,
            ColumnData::UInt8($v) => $body,
            ColumnData::Int16($v) => $body,
            ColumnData::UInt16($v) => $body,
            ColumnData::Int32($v) => $body,
            ColumnData::UInt32($v) => $body,
            ColumnData::Int64($v) => $body,
            ColumnData::UInt64($v) => $body,
            ColumnData::Float32($v) => $body,
            ColumnData::Float64($v) => $body,
            ColumnData::Text($v) => $body,
            ColumnData::Binary($v) => $body,
        }
    };
}

macro_rules! typed_access {
    ($($variant:ident: $t:ty => $as_fn:ident, $as_mut_fn:ident;)*) => {
        impl ColumnData {
            $(
                pub fn $as_fn(&self) -> Option<&[$t]> {
                    match self {
                        ColumnData::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                pub fn $as_mut_fn(&mut self) -> Option<&mut Vec<$t>> {
                    match self {
                        ColumnData::$variant(v) => Some(v),
                        _ => None,
                    }
                }
            )*
        }

        $(
            impl From<Vec<$t>> for ColumnData {
                fn from(v: Vec<$t>) -> Self {
                    ColumnData::$variant(v)
                }
            }
        )*
    };
}

typed_access! {
    Int8: i8 => as_i8, as_i8_mut;
    UInt8: u8 => as_u8, as_u8_mut;
    Int16: i16 => as_i16, as_i16_mut;
    UInt16: u16 => as_u16, as_u16_mut;
    Int32: i32 => as_i32, as_i32_mut;
    UInt32: u32 => as_u32, as_u32_mut;
    Int64: i64 => as_i64, as_i64_mut;
    UInt64: u64 => as_u64, as_u64_mut;
    Float32: f32 => as_f32, as_f32_mut;
    Float64: f64 => as_f64, as_f64_mut;
    Text: String => as_text, as_text_mut;
    Binary: Vec<u8> => as_binary, as_binary_mut;
}

/// Narrow a double to a FLOAT slot. Finite values beyond `f32::MAX` do not
/// fit; NaN and infinities pass through.
pub fn narrow_f32(value: f64) -> Result<f32, CodecError> {
    if value.is_finite() && value.abs() > f64::from(f32::MAX) {
        return Err(CodecError::OutOfRange {
            value: value.to_string(),
            type_name: "FLOAT",
        });
    }
    Ok(value as f32)
}

impl ColumnData {
    /// Empty vector of the storage type for `ty`.
    pub fn with_capacity(ty: ColumnType, capacity: usize) -> Self {
        match ty {
            ColumnType::Int8 => ColumnData::Int8(Vec::with_capacity(capacity)),
            ColumnType::UInt8 => ColumnData::UInt8(Vec::with_capacity(capacity)),
            ColumnType::Int16 => ColumnData::Int16(Vec::with_capacity(capacity)),
            ColumnType::UInt16 => ColumnData::UInt16(Vec::with_capacity(capacity)),
            ColumnType::Int24 | ColumnType::Int32 => {
                ColumnData::Int32(Vec::with_capacity(capacity))
            }
            ColumnType::UInt24 | ColumnType::UInt32 => {
                ColumnData::UInt32(Vec::with_capacity(capacity))
            }
            ColumnType::Int64 => ColumnData::Int64(Vec::with_capacity(capacity)),
            ColumnType::UInt64 => ColumnData::UInt64(Vec::with_capacity(capacity)),
            ColumnType::Float32 => ColumnData::Float32(Vec::with_capacity(capacity)),
            ColumnType::Float64 => ColumnData::Float64(Vec::with_capacity(capacity)),
            ColumnType::Text(_) => ColumnData::Text(Vec::with_capacity(capacity)),
            ColumnType::Binary(_) => ColumnData::Binary(Vec::with_capacity(capacity)),
        }
    }

    pub fn new(ty: ColumnType) -> Self {
        Self::with_capacity(ty, 0)
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reserve(&mut self, additional: usize) {
        each_variant!(self, v => v.reserve(additional));
    }

    /// Name of the storage variant.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ColumnData::Int8(_) => "Int8",
            ColumnData::UInt8(_) => "UInt8",
            ColumnData::Int16(_) => "Int16",
            ColumnData::UInt16(_) => "UInt16",
            ColumnData::Int32(_) => "Int32",
            ColumnData::UInt32(_) => "UInt32",
            ColumnData::Int64(_) => "Int64",
            ColumnData::UInt64(_) => "UInt64",
            ColumnData::Float32(_) => "Float32",
            ColumnData::Float64(_) => "Float64",
            ColumnData::Text(_) => "Text",
            ColumnData::Binary(_) => "Binary",
        }
    }

    /// True when this vector is the storage type `ty` decodes into.
    pub fn is_storage_for(&self, ty: ColumnType) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(&ColumnData::new(ty))
    }

    /// Element `index` as a row value. Ignores nullness; see [`Column`].
    pub fn get(&self, index: usize) -> Option<Value> {
        let value = match self {
            ColumnData::Int8(v) => Value::Int(i64::from(*v.get(index)?)),
            ColumnData::UInt8(v) => Value::Int(i64::from(*v.get(index)?)),
            ColumnData::Int16(v) => Value::Int(i64::from(*v.get(index)?)),
            ColumnData::UInt16(v) => Value::Int(i64::from(*v.get(index)?)),
            ColumnData::Int32(v) => Value::Int(i64::from(*v.get(index)?)),
            ColumnData::UInt32(v) => Value::Int(i64::from(*v.get(index)?)),
            ColumnData::Int64(v) => Value::Int(*v.get(index)?),
            ColumnData::UInt64(v) => Value::UInt(*v.get(index)?),
            ColumnData::Float32(v) => Value::Float(f64::from(*v.get(index)?)),
            ColumnData::Float64(v) => Value::Float(*v.get(index)?),
            ColumnData::Text(v) => Value::Text(v.get(index)?.clone()),
            ColumnData::Binary(v) => Value::Binary(v.get(index)?.clone()),
        };
        Some(value)
    }

    /// Append the null placeholder.
    pub fn push_default(&mut self) {
        match self {
            ColumnData::Float32(v) => v.push(f32::NAN),
            ColumnData::Float64(v) => v.push(f64::NAN),
            other => each_variant!(other, v => v.push(Default::default())),
        }
    }

    /// Append a row value, converting it to the storage type. `Null` appends
    /// the placeholder.
    pub fn push_value(&mut self, value: &Value) -> Result<(), CodecError> {
        if value.is_null() {
            self.push_default();
            return Ok(());
        }
        match self {
            ColumnData::Int8(v) => v.push(value.to_integer(ColumnType::Int8)? as i8),
            ColumnData::UInt8(v) => v.push(value.to_integer(ColumnType::UInt8)? as u8),
            ColumnData::Int16(v) => v.push(value.to_integer(ColumnType::Int16)? as i16),
            ColumnData::UInt16(v) => v.push(value.to_integer(ColumnType::UInt16)? as u16),
            ColumnData::Int32(v) => v.push(value.to_integer(ColumnType::Int32)? as i32),
            ColumnData::UInt32(v) => v.push(value.to_integer(ColumnType::UInt32)? as u32),
            ColumnData::Int64(v) => v.push(value.to_integer(ColumnType::Int64)? as i64),
            ColumnData::UInt64(v) => v.push(value.to_integer(ColumnType::UInt64)? as u64),
            ColumnData::Float32(v) => v.push(narrow_f32(value.to_float(ColumnType::Float32)?)?),
            ColumnData::Float64(v) => v.push(value.to_float(ColumnType::Float64)?),
            ColumnData::Text(v) => match value {
                Value::Text(s) => v.push(s.clone()),
                other => {
                    return Err(CodecError::TypeMismatch {
                        expected: "text",
                        got: other.kind_name(),
                    })
                }
            },
            ColumnData::Binary(v) => match value {
                Value::Binary(b) => v.push(b.clone()),
                Value::Text(s) => v.push(s.as_bytes().to_vec()),
                other => {
                    return Err(CodecError::TypeMismatch {
                        expected: "binary",
                        got: other.kind_name(),
                    })
                }
            },
        }
        Ok(())
    }

    /// Overwrite element `index` with a converted row value.
    pub fn set_value(&mut self, index: usize, value: &Value) -> Result<(), CodecError> {
        let len = self.len();
        if index >= len {
            return Err(CodecError::LengthMismatch {
                expected: len,
                got: index + 1,
            });
        }
        self.push_value(value)?;
        each_variant!(self, v => {
            v.swap_remove(index);
        });
        Ok(())
    }
}

/// Element-level access shared by every in-memory vector backend.
pub trait ColumnBuffer {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index`, `Value::Null` when its null bit is set.
    fn get(&self, index: usize) -> Option<Value>;

    fn set(&mut self, index: usize, value: &Value) -> Result<(), CodecError>;

    fn is_null(&self, index: usize) -> bool;

    fn set_null(&mut self, index: usize, null: bool);

    fn push(&mut self, value: &Value) -> Result<(), CodecError>;

    /// Typed access to the underlying vector.
    fn data(&self) -> &ColumnData;
}

/// A dense vector plus its optional null mask (`true` = null).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub data: ColumnData,
    pub mask: Option<Vec<bool>>,
}

impl Column {
    pub fn new(data: ColumnData) -> Self {
        Column { data, mask: None }
    }

    pub fn with_mask(data: ColumnData, mask: Vec<bool>) -> Self {
        Column {
            data,
            mask: Some(mask),
        }
    }

    /// Empty column of the storage type for `ty`; `masked` starts a mask.
    pub fn with_capacity(ty: ColumnType, capacity: usize, masked: bool) -> Self {
        Column {
            data: ColumnData::with_capacity(ty, capacity),
            mask: masked.then(|| Vec::with_capacity(capacity)),
        }
    }

    pub fn null_count(&self) -> usize {
        self.mask
            .as_ref()
            .map_or(0, |m| m.iter().filter(|null| **null).count())
    }

    /// This column with storage and range matching `ty`.
    ///
    /// Borrowed when it already matches; otherwise rebuilt value by value,
    /// which range-checks every slot against `ty` (MEDIUMINT included).
    pub fn conformed(&self, ty: ColumnType) -> Result<Cow<'_, Column>, CodecError> {
        let narrow = matches!(ty, ColumnType::Int24 | ColumnType::UInt24);
        if self.data.is_storage_for(ty) && !narrow {
            return Ok(Cow::Borrowed(self));
        }
        let mut out = Column::with_capacity(ty, self.data.len(), self.mask.is_some());
        for i in 0..self.data.len() {
            let value = ColumnBuffer::get(self, i).unwrap_or(Value::Null);
            if narrow && !value.is_null() {
                value.to_integer(ty)?;
            }
            out.push(&value)?;
        }
        Ok(Cow::Owned(out))
    }

    /// Drop the mask when no slot is null.
    pub fn compact_mask(mut self) -> Self {
        if self.null_count() == 0 {
            self.mask = None;
        }
        self
    }
}

impl ColumnBuffer for Column {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn get(&self, index: usize) -> Option<Value> {
        if index >= self.data.len() {
            return None;
        }
        if self.is_null(index) {
            return Some(Value::Null);
        }
        self.data.get(index)
    }

    fn set(&mut self, index: usize, value: &Value) -> Result<(), CodecError> {
        self.data.set_value(index, value)?;
        self.set_null(index, value.is_null());
        Ok(())
    }

    fn is_null(&self, index: usize) -> bool {
        self.mask
            .as_ref()
            .is_some_and(|m| m.get(index).copied().unwrap_or(false))
    }

    fn set_null(&mut self, index: usize, null: bool) {
        let len = self.data.len();
        if self.mask.is_none() && !null {
            return;
        }
        let mask = self.mask.get_or_insert_with(|| vec![false; len]);
        if mask.len() < len {
            mask.resize(len, false);
        }
        if let Some(slot) = mask.get_mut(index) {
            *slot = null;
        }
    }

    fn push(&mut self, value: &Value) -> Result<(), CodecError> {
        let len = self.data.len();
        self.data.push_value(value)?;
        match (&mut self.mask, value.is_null()) {
            (Some(mask), null) => mask.push(null),
            (None, true) => {
                let mut mask = vec![false; len];
                mask.push(true);
                self.mask = Some(mask);
            }
            (None, false) => {}
        }
        Ok(())
    }

    fn data(&self) -> &ColumnData {
        &self.data
    }
}
