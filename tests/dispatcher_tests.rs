//! Registry dispatch tests: decode → invoke → encode for every call shape.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Int64Array};
use serde_json::json;

use extfunc::batch::{Column, ColumnBatch, ColumnData, Payload, RowBatch};
use extfunc::{
    codes, BatchShape, Codec, CodecError, Codecs, ColumnSpec, DataFormat, DispatchError, Endpoint,
    ExtFuncError, InvokeError, Registry, Rowdat1, Strategy, Value, WireFormat,
};

fn double() -> Endpoint {
    Endpoint::scalar(
        "double",
        vec![ColumnSpec::new("x", codes::LONG)],
        ColumnSpec::new("", codes::LONG),
        |row| match row[0] {
            Value::Int(x) => Ok(Value::Int(x * 2)),
            _ => Ok(Value::Null),
        },
    )
}

fn int_rows(values: &[(i64, Option<i32>)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (row_id, value) in values {
        out.extend_from_slice(&row_id.to_le_bytes());
        match value {
            Some(v) => {
                out.push(0);
                out.extend_from_slice(&v.to_le_bytes());
            }
            None => out.extend_from_slice(&[1, 0, 0, 0, 0]),
        }
    }
    out
}

fn call(
    registry: &Registry,
    codec: &dyn Codec,
    name: &str,
    data: &[u8],
) -> Result<Vec<u8>, ExtFuncError> {
    let endpoint = registry.get(name)?;
    let payload = codec.load(endpoint.input_shape(), &endpoint.args, data)?;
    let result = registry.invoke(name, payload)?;
    Ok(codec.dump_single(&endpoint.returns, &result)?)
}

#[test]
fn test_scalar_call_preserves_row_ids_and_nulls() {
    let mut registry = Registry::new();
    registry.register(double());
    let codec = Rowdat1::new(Strategy::Accelerated);

    let out = call(&registry, &codec, "double", &int_rows(&[(4, Some(21)), (9, None)])).unwrap();
    assert_eq!(out, int_rows(&[(4, Some(42)), (9, None)]));
}

#[test]
fn test_scalar_overflow_fails_on_encode() {
    let mut registry = Registry::new();
    registry.register(double());
    let codec = Rowdat1::new(Strategy::Reference);

    let err = call(&registry, &codec, "double", &int_rows(&[(3, Some(i32::MAX))])).unwrap_err();
    assert!(err.is_value_error());
    assert!(matches!(err, ExtFuncError::Codec(CodecError::OutOfRange { .. })));
}

#[test]
fn test_unknown_function() {
    let registry = Registry::new();
    let codec = Rowdat1::default();
    let err = call(&registry, &codec, "missing", &[]).unwrap_err();
    assert!(matches!(
        err,
        ExtFuncError::Dispatch(DispatchError::NotFound(ref name)) if name == "missing"
    ));
    assert!(!err.is_value_error());
}

#[test]
fn test_function_error_propagates() {
    let mut registry = Registry::new();
    registry.register(Endpoint::scalar(
        "fail",
        vec![ColumnSpec::new("x", codes::LONG)],
        ColumnSpec::new("", codes::LONG),
        |_| Err(InvokeError::failed("boom")),
    ));
    let err = call(&registry, &Rowdat1::default(), "fail", &int_rows(&[(1, Some(1))])).unwrap_err();
    assert!(matches!(err, ExtFuncError::Invoke(InvokeError::Failed(_))));
    assert!(err.chain().contains("boom"));
}

#[test]
fn test_vector_call_drops_masks() {
    let mut registry = Registry::new();
    registry.register(Endpoint::vectors(
        "plus_one",
        vec![ColumnSpec::new("x", codes::LONG)],
        ColumnSpec::new("", codes::LONG),
        |cols| {
            let x = cols[0]
                .as_i32()
                .ok_or_else(|| InvokeError::failed("expected INT storage"))?;
            Ok(ColumnData::Int32(x.iter().map(|v| v + 1).collect()))
        },
    ));
    let endpoint = registry.get("plus_one").unwrap();
    assert_eq!(endpoint.data_format(), DataFormat::Vector);
    assert_eq!(endpoint.input_shape(), BatchShape::Columns);
    assert!(!endpoint.include_null_masks());

    // The null slot decodes to the 0 placeholder; without a mask the result
    // is a present value.
    let out = call(
        &registry,
        &Rowdat1::default(),
        "plus_one",
        &int_rows(&[(1, Some(1)), (2, None)]),
    )
    .unwrap();
    assert_eq!(out, int_rows(&[(1, Some(2)), (2, Some(1))]));
}

#[test]
fn test_masked_vector_call_sees_nulls() {
    let mut registry = Registry::new();
    registry.register(Endpoint::masked_vectors(
        "keep",
        vec![ColumnSpec::new("x", codes::LONG)],
        ColumnSpec::new("", codes::LONG),
        |cols| Ok(cols[0].clone()),
    ));
    assert!(registry.get("keep").unwrap().include_null_masks());

    let data = int_rows(&[(1, Some(5)), (2, None), (3, Some(-7))]);
    let out = call(&registry, &Rowdat1::default(), "keep", &data).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_vector_result_length_mismatch() {
    let mut registry = Registry::new();
    registry.register(Endpoint::vectors(
        "short",
        vec![ColumnSpec::new("x", codes::LONG)],
        ColumnSpec::new("", codes::LONG),
        |_| Ok(ColumnData::Int32(vec![1])),
    ));
    let err = call(
        &registry,
        &Rowdat1::default(),
        "short",
        &int_rows(&[(1, Some(1)), (2, Some(2))]),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ExtFuncError::Codec(CodecError::LengthMismatch { expected: 2, got: 1 })
    ));
}

#[test]
fn test_arrow_call_keeps_validity() {
    let mut registry = Registry::new();
    registry.register(Endpoint::arrow(
        "negate",
        vec![ColumnSpec::new("x", codes::LONGLONG)],
        ColumnSpec::new("", codes::LONGLONG),
        |arrays| {
            let input = arrays[0]
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(|| InvokeError::failed("expected Int64"))?;
            let out: Int64Array = input.iter().map(|v| v.map(|x| -x)).collect();
            Ok(Arc::new(out) as ArrayRef)
        },
    ));
    assert_eq!(registry.get("negate").unwrap().data_format(), DataFormat::Arrow);

    let batch = ColumnBatch::new(
        vec![1, 2],
        vec![Column::with_mask(ColumnData::Int64(vec![3, 0]), vec![false, true])],
    );
    let result = registry.invoke("negate", Payload::Columns(batch)).unwrap();
    let Payload::Columns(out) = result else {
        panic!("expected columns");
    };
    assert_eq!(out.row_ids, vec![1, 2]);
    assert_eq!(out.columns[0].mask, Some(vec![false, true]));
    assert_eq!(out.columns[0].data.as_i64().unwrap()[0], -3);
}

#[test]
fn test_shape_mismatch() {
    let mut registry = Registry::new();
    registry.register(double());
    let batch = ColumnBatch::new(vec![1], vec![Column::new(ColumnData::Int32(vec![1]))]);
    let err = registry.invoke("double", Payload::Columns(batch)).unwrap_err();
    assert!(matches!(
        err,
        ExtFuncError::Dispatch(DispatchError::ShapeMismatch { expected: "row", .. })
    ));
}

#[test]
fn test_tvf_emits_many_rows_per_input() {
    let mut registry = Registry::new();
    registry.register(
        Endpoint::rows(
            "repeat",
            vec![ColumnSpec::new("n", codes::LONG)],
            ColumnSpec::new("i", codes::LONG),
            |batch: RowBatch| {
                let mut out = RowBatch::default();
                for (row_id, row) in batch.iter() {
                    let n = row[0].as_i64().unwrap_or(0);
                    for i in 0..n {
                        out.push(row_id, vec![Value::Int(i)]);
                    }
                }
                Ok(out)
            },
        )
        .tvf(),
    );
    let out = call(
        &registry,
        &Rowdat1::default(),
        "repeat",
        &int_rows(&[(1, Some(2)), (2, Some(0)), (3, Some(1))]),
    )
    .unwrap();
    assert_eq!(out, int_rows(&[(1, Some(0)), (1, Some(1)), (3, Some(0))]));
}

#[test]
fn test_register_replaces_by_name() {
    let mut registry = Registry::new();
    assert!(registry.register(double()).is_none());
    assert!(registry.register(double()).is_some());
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_json_codec_through_codec_table() {
    let mut registry = Registry::new();
    registry.register(double());
    let codecs = Codecs::new(true);
    let codec = codecs.for_format(WireFormat::Json, "1.0").unwrap();

    let body = serde_json::to_vec(&json!({"data": [[1, 21], [2, null]]})).unwrap();
    let out = call(&registry, codec.as_ref(), "double", &body).unwrap();
    let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(parsed, json!({"data": [[1, 42], [2, null]]}));
}

#[test]
fn test_unknown_codec_version() {
    let codecs = Codecs::new(true);
    assert!(matches!(
        codecs.lookup("application/octet-stream", "2.0"),
        Err(ExtFuncError::UnsupportedFormat { .. })
    ));
}
