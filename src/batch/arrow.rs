//! Arrow Conversion
//!
//! Conversion between dense [`Column`]s and Arrow arrays. Masks map to
//! validity bitmaps; null slots coming back from Arrow get the type's
//! placeholder.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BinaryArray, Float32Array, Float64Array, Int16Array, Int32Array,
    Int64Array, Int8Array, PrimitiveArray, StringArray, UInt16Array, UInt32Array, UInt64Array,
    UInt8Array,
};
use arrow::compute::kernels::cast::{cast_with_options, CastOptions};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};

use super::column::{Column, ColumnBuffer, ColumnData};
use crate::codec::CodecError;
use crate::dtypes::ColumnType;

/// Arrow type a column of `ty` is exchanged as.
pub fn arrow_type(ty: ColumnType) -> DataType {
    match ty {
        ColumnType::Int8 => DataType::Int8,
        ColumnType::UInt8 => DataType::UInt8,
        ColumnType::Int16 => DataType::Int16,
        ColumnType::UInt16 => DataType::UInt16,
        ColumnType::Int24 | ColumnType::Int32 => DataType::Int32,
        ColumnType::UInt24 | ColumnType::UInt32 => DataType::UInt32,
        ColumnType::Int64 => DataType::Int64,
        ColumnType::UInt64 => DataType::UInt64,
        ColumnType::Float32 => DataType::Float32,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Text(_) => DataType::Utf8,
        ColumnType::Binary(_) => DataType::Binary,
    }
}

/// Build an Arrow array from a column, masked slots becoming nulls.
pub fn column_to_array(column: &Column) -> ArrayRef {
    let valid = |i: usize| !column.is_null(i);
    macro_rules! primitive {
        ($array:ty, $values:expr) => {
            Arc::new(
                $values
                    .iter()
                    .enumerate()
                    .map(|(i, v)| valid(i).then_some(*v))
                    .collect::<$array>(),
            ) as ArrayRef
        };
    }
    match &column.data {
        ColumnData::Int8(v) => primitive!(Int8Array, v),
        ColumnData::UInt8(v) => primitive!(UInt8Array, v),
        ColumnData::Int16(v) => primitive!(Int16Array, v),
        ColumnData::UInt16(v) => primitive!(UInt16Array, v),
        ColumnData::Int32(v) => primitive!(Int32Array, v),
        ColumnData::UInt32(v) => primitive!(UInt32Array, v),
        ColumnData::Int64(v) => primitive!(Int64Array, v),
        ColumnData::UInt64(v) => primitive!(UInt64Array, v),
        ColumnData::Float32(v) => primitive!(Float32Array, v),
        ColumnData::Float64(v) => primitive!(Float64Array, v),
        ColumnData::Text(v) => Arc::new(
            v.iter()
                .enumerate()
                .map(|(i, s)| valid(i).then_some(s.as_str()))
                .collect::<StringArray>(),
        ),
        ColumnData::Binary(v) => Arc::new(
            v.iter()
                .enumerate()
                .map(|(i, b)| valid(i).then_some(b.as_slice()))
                .collect::<BinaryArray>(),
        ),
    }
}

fn primitive_values<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    default: T::Native,
) -> Vec<T::Native> {
    array.iter().map(|v| v.unwrap_or(default)).collect()
}

/// Convert an Arrow array to a column of type `ty`.
///
/// The array is cast to the column's storage type first. Casts are not
/// lossy: a value that does not fit is an error rather than a null.
pub fn array_to_column(array: &dyn Array, ty: ColumnType) -> Result<Column, CodecError> {
    let target = arrow_type(ty);
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    let cast = cast_with_options(array, &target, &options)?;
    let mask: Vec<bool> = (0..cast.len()).map(|i| cast.is_null(i)).collect();

    let data = match ty {
        ColumnType::Int8 => {
            ColumnData::Int8(primitive_values(cast.as_primitive::<Int8Type>(), 0))
        }
        ColumnType::UInt8 => {
            ColumnData::UInt8(primitive_values(cast.as_primitive::<UInt8Type>(), 0))
        }
        ColumnType::Int16 => {
            ColumnData::Int16(primitive_values(cast.as_primitive::<Int16Type>(), 0))
        }
        ColumnType::UInt16 => {
            ColumnData::UInt16(primitive_values(cast.as_primitive::<UInt16Type>(), 0))
        }
        ColumnType::Int24 | ColumnType::Int32 => {
            ColumnData::Int32(primitive_values(cast.as_primitive::<Int32Type>(), 0))
        }
        ColumnType::UInt24 | ColumnType::UInt32 => {
            ColumnData::UInt32(primitive_values(cast.as_primitive::<UInt32Type>(), 0))
        }
        ColumnType::Int64 => {
            ColumnData::Int64(primitive_values(cast.as_primitive::<Int64Type>(), 0))
        }
        ColumnType::UInt64 => {
            ColumnData::UInt64(primitive_values(cast.as_primitive::<UInt64Type>(), 0))
        }
        ColumnType::Float32 => ColumnData::Float32(primitive_values(
            cast.as_primitive::<Float32Type>(),
            f32::NAN,
        )),
        ColumnType::Float64 => ColumnData::Float64(primitive_values(
            cast.as_primitive::<Float64Type>(),
            f64::NAN,
        )),
        ColumnType::Text(_) => ColumnData::Text(
            cast.as_string::<i32>()
                .iter()
                .map(|s| s.unwrap_or_default().to_string())
                .collect(),
        ),
        ColumnType::Binary(_) => ColumnData::Binary(
            cast.as_binary::<i32>()
                .iter()
                .map(|b| b.unwrap_or_default().to_vec())
                .collect(),
        ),
    };
    Ok(Column::with_mask(data, mask))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_mask_becomes_validity() {
        let column = Column::with_mask(ColumnData::Int32(vec![5, 0, 7]), vec![false, true, false]);
        let array = column_to_array(&column);
        assert_eq!(array.null_count(), 1);
        assert!(array.is_null(1));

        let back = array_to_column(array.as_ref(), ColumnType::Int32).unwrap();
        assert_eq!(back, column);
    }

    #[test]
    fn test_null_text_gets_empty_placeholder() {
        let array: ArrayRef = Arc::new(StringArray::from(vec![Some("x"), None]));
        let column = array_to_column(array.as_ref(), ColumnType::Text(15)).unwrap();
        assert_eq!(column.data.as_text().unwrap(), ["x", ""]);
        assert_eq!(column.get(1), Some(Value::Null));
    }

    #[test]
    fn test_overflowing_cast_is_an_error() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1_i64, 300]));
        assert!(array_to_column(array.as_ref(), ColumnType::Int8).is_err());
    }
}
