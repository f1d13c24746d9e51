//! rowdat_1 wire format tests: hand-built buffers, boundaries, malformed input.
//!
//! Every case runs against both codec strategies.

use extfunc::batch::{Column, ColumnBatch, ColumnData, RowBatch};
use extfunc::{codes, Codec, CodecError, ColumnSpec, Rowdat1, Strategy, Value};

const STRATEGIES: [Strategy; 2] = [Strategy::Reference, Strategy::Accelerated];

fn spec(codes: &[i32]) -> Vec<ColumnSpec> {
    codes
        .iter()
        .enumerate()
        .map(|(i, code)| ColumnSpec::new(format!("c{i}"), *code))
        .collect()
}

/// Little-endian row buffer builder.
#[derive(Default)]
struct Rows(Vec<u8>);

impl Rows {
    fn id(mut self, row_id: i64) -> Self {
        self.0.extend_from_slice(&row_id.to_le_bytes());
        self
    }

    fn fixed(mut self, bytes: &[u8]) -> Self {
        self.0.push(0);
        self.0.extend_from_slice(bytes);
        self
    }

    fn null_fixed(mut self, width: usize) -> Self {
        self.0.push(1);
        self.0.extend(std::iter::repeat(0).take(width));
        self
    }

    fn bytes(mut self, data: &[u8]) -> Self {
        self.0.push(0);
        self.0.extend_from_slice(&(data.len() as i64).to_le_bytes());
        self.0.extend_from_slice(data);
        self
    }

    fn null_bytes(mut self) -> Self {
        self.0.push(1);
        self.0.extend_from_slice(&0_i64.to_le_bytes());
        self
    }

    fn raw(mut self, data: &[u8]) -> Self {
        self.0.extend_from_slice(data);
        self
    }
}

#[test]
fn test_decode_int_rows_with_null() {
    let data = Rows::default()
        .id(1)
        .fixed(&10_i32.to_le_bytes())
        .id(2)
        .null_fixed(4)
        .id(3)
        .fixed(&(-5_i32).to_le_bytes())
        .0;
    for strategy in STRATEGIES {
        let batch = Rowdat1::new(strategy).load_rows(&spec(&[codes::LONG]), &data).unwrap();
        assert_eq!(batch.row_ids, vec![1, 2, 3]);
        assert_eq!(
            batch.rows,
            vec![vec![Value::Int(10)], vec![Value::Null], vec![Value::Int(-5)]],
            "{strategy:?}"
        );
    }
}

#[test]
fn test_decode_text_and_binary() {
    let data = Rows::default()
        .id(7)
        .bytes("héllo".as_bytes())
        .bytes(&[0, 255])
        .id(8)
        .null_bytes()
        .null_bytes()
        .0;
    for strategy in STRATEGIES {
        let batch = Rowdat1::new(strategy)
            .load_rows(&spec(&[codes::VARCHAR, -codes::BLOB]), &data)
            .unwrap();
        assert_eq!(
            batch.rows[0],
            vec![Value::Text("héllo".into()), Value::Binary(vec![0, 255])]
        );
        assert_eq!(batch.rows[1], vec![Value::Null, Value::Null]);
    }
}

#[test]
fn test_decode_columns_carries_mask_and_defaults() {
    let data = Rows::default()
        .id(1)
        .fixed(&4_i16.to_le_bytes())
        .id(2)
        .null_fixed(2)
        .0;
    for strategy in STRATEGIES {
        let batch = Rowdat1::new(strategy)
            .load_columns(&spec(&[codes::SHORT]), &data)
            .unwrap();
        assert_eq!(batch.row_ids, vec![1, 2]);
        assert_eq!(batch.columns[0].data, ColumnData::Int16(vec![4, 0]));
        assert_eq!(batch.columns[0].mask, Some(vec![false, true]));
    }
}

#[test]
fn test_unsigned_bigint_max_decodes_as_uint() {
    let data = Rows::default().id(1).fixed(&u64::MAX.to_le_bytes()).0;
    for strategy in STRATEGIES {
        let batch = Rowdat1::new(strategy)
            .load_rows(&spec(&[-codes::LONGLONG]), &data)
            .unwrap();
        assert_eq!(batch.rows[0], vec![Value::UInt(u64::MAX)]);
    }
}

#[test]
fn test_unsigned_int_max_decodes_as_int() {
    let data = Rows::default().id(1).fixed(&u32::MAX.to_le_bytes()).0;
    for strategy in STRATEGIES {
        let batch = Rowdat1::new(strategy)
            .load_rows(&spec(&[-codes::LONG]), &data)
            .unwrap();
        assert_eq!(batch.rows[0], vec![Value::Int(i64::from(u32::MAX))]);
    }
}

#[test]
fn test_boundary_values_encode_exactly() {
    let cases: [(i32, i64, Vec<u8>); 6] = [
        (codes::TINY, -128, vec![0x80]),
        (-codes::TINY, 255, vec![0xff]),
        (codes::SHORT, i64::from(i16::MIN), vec![0x00, 0x80]),
        (codes::INT24, 8_388_607, vec![0xff, 0xff, 0x7f, 0x00]),
        (-codes::INT24, 16_777_215, vec![0xff, 0xff, 0xff, 0x00]),
        (codes::LONG, i64::from(i32::MIN), vec![0x00, 0x00, 0x00, 0x80]),
    ];
    for strategy in STRATEGIES {
        for (code, value, bytes) in &cases {
            let batch = RowBatch::new(vec![1], vec![vec![Value::Int(*value)]]);
            let out = Rowdat1::new(strategy).dump_rows(&spec(&[*code]), &batch).unwrap();
            let expected = Rows::default().id(1).fixed(bytes).0;
            assert_eq!(out, expected, "code {code} value {value} ({strategy:?})");
        }
    }
}

/// `(code, min, max, below min, above max)` for every integer code.
fn integer_bounds() -> Vec<(i32, Value, Value, Value, Value)> {
    vec![
        (codes::TINY, Value::Int(-128), Value::Int(127), Value::Int(-129), Value::Int(128)),
        (-codes::TINY, Value::Int(0), Value::Int(255), Value::Int(-1), Value::Int(256)),
        (
            codes::SHORT,
            Value::Int(-32_768),
            Value::Int(32_767),
            Value::Int(-32_769),
            Value::Int(32_768),
        ),
        (-codes::SHORT, Value::Int(0), Value::Int(65_535), Value::Int(-1), Value::Int(65_536)),
        (
            codes::INT24,
            Value::Int(-8_388_608),
            Value::Int(8_388_607),
            Value::Int(-8_388_609),
            Value::Int(8_388_608),
        ),
        (
            -codes::INT24,
            Value::Int(0),
            Value::Int(16_777_215),
            Value::Int(-1),
            Value::Int(16_777_216),
        ),
        (
            codes::LONG,
            Value::Int(i64::from(i32::MIN)),
            Value::Int(i64::from(i32::MAX)),
            Value::Int(i64::from(i32::MIN) - 1),
            Value::Int(i64::from(i32::MAX) + 1),
        ),
        (
            -codes::LONG,
            Value::Int(0),
            Value::Int(i64::from(u32::MAX)),
            Value::Int(-1),
            Value::Int(4_294_967_296),
        ),
        (
            codes::LONGLONG,
            Value::Int(i64::MIN),
            Value::Int(i64::MAX),
            Value::Float(-1e19),
            Value::UInt(i64::MAX as u64 + 1),
        ),
        (
            -codes::LONGLONG,
            Value::UInt(0),
            Value::UInt(u64::MAX),
            Value::Int(-1),
            Value::Float(2e19),
        ),
    ]
}

#[test]
fn test_integer_bounds_round_trip_for_every_code() {
    for strategy in STRATEGIES {
        let codec = Rowdat1::new(strategy);
        for (code, min, max, _, _) in integer_bounds() {
            let colspec = spec(&[code]);
            let batch = RowBatch::new(vec![1, 2], vec![vec![min.clone()], vec![max.clone()]]);
            let bytes = codec.dump_rows(&colspec, &batch).unwrap();
            let back = codec.load_rows(&colspec, &bytes).unwrap();
            assert_eq!(back, batch, "code {code} ({strategy:?})");
        }
    }
}

#[test]
fn test_one_past_each_boundary_is_out_of_range() {
    for strategy in STRATEGIES {
        let codec = Rowdat1::new(strategy);
        for (code, _, _, below, above) in integer_bounds() {
            for value in [below, above] {
                let batch = RowBatch::new(vec![1], vec![vec![value.clone()]]);
                let result = codec.dump_rows(&spec(&[code]), &batch);
                assert!(
                    matches!(result, Err(CodecError::OutOfRange { .. })),
                    "code {code} value {value:?} ({strategy:?}): {result:?}"
                );
            }
        }
    }
}

#[test]
fn test_float_bounds() {
    for strategy in STRATEGIES {
        let codec = Rowdat1::new(strategy);
        let float = spec(&[codes::FLOAT]);
        let batch = RowBatch::new(
            vec![1, 2, 3],
            vec![
                vec![Value::Float(f64::from(f32::MAX))],
                vec![Value::Float(f64::from(f32::MIN))],
                vec![Value::Float(1.5)],
            ],
        );
        let bytes = codec.dump_rows(&float, &batch).unwrap();
        assert_eq!(codec.load_rows(&float, &bytes).unwrap(), batch, "{strategy:?}");

        for value in [1e300, -1e300] {
            let batch = RowBatch::new(vec![1], vec![vec![Value::Float(value)]]);
            assert!(
                matches!(codec.dump_rows(&float, &batch), Err(CodecError::OutOfRange { .. })),
                "{value} ({strategy:?})"
            );
        }

        let double = spec(&[codes::DOUBLE]);
        let batch = RowBatch::new(
            vec![1, 2],
            vec![vec![Value::Float(f64::MAX)], vec![Value::Float(-0.1)]],
        );
        let bytes = codec.dump_rows(&double, &batch).unwrap();
        assert_eq!(codec.load_rows(&double, &bytes).unwrap(), batch, "{strategy:?}");
    }
}

#[test]
fn test_every_string_code_round_trips() {
    for strategy in STRATEGIES {
        let codec = Rowdat1::new(strategy);
        for code in codes::STRING_CODES {
            let text = spec(&[code]);
            let batch = RowBatch::new(
                vec![1, 2, 3],
                vec![
                    vec![Value::Text("h\u{e9}llo".to_string())],
                    vec![Value::Text(String::new())],
                    vec![Value::Null],
                ],
            );
            let bytes = codec.dump_rows(&text, &batch).unwrap();
            assert_eq!(codec.load_rows(&text, &bytes).unwrap(), batch, "code {code} ({strategy:?})");

            let binary = spec(&[-code]);
            let batch = RowBatch::new(
                vec![1, 2],
                vec![vec![Value::Binary(vec![0, 255, 1])], vec![Value::Null]],
            );
            let bytes = codec.dump_rows(&binary, &batch).unwrap();
            assert_eq!(
                codec.load_rows(&binary, &bytes).unwrap(),
                batch,
                "code {} ({strategy:?})",
                -code
            );
        }
    }
}

#[test]
fn test_mediumint_vector_range_checked_on_encode() {
    let batch = ColumnBatch::new(
        vec![1, 2],
        vec![Column::new(ColumnData::Int32(vec![1, 8_388_608]))],
    );
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).dump_columns(&spec(&[codes::INT24]), &batch);
        assert!(matches!(result, Err(CodecError::OutOfRange { .. })), "{strategy:?}");
    }
}

#[test]
fn test_null_double_writes_nan_placeholder() {
    let batch = RowBatch::new(vec![5], vec![vec![Value::Null]]);
    for strategy in STRATEGIES {
        let out = Rowdat1::new(strategy)
            .dump_rows(&spec(&[codes::DOUBLE]), &batch)
            .unwrap();
        assert_eq!(out.len(), 8 + 1 + 8);
        assert_eq!(out[8], 1);
        let mut slot = [0_u8; 8];
        slot.copy_from_slice(&out[9..]);
        assert!(f64::from_le_bytes(slot).is_nan());
    }
}

#[test]
fn test_masked_column_encodes_nulls() {
    let batch = ColumnBatch::new(
        vec![1, 2],
        vec![Column::with_mask(
            ColumnData::Int64(vec![9, 123]),
            vec![false, true],
        )],
    );
    let expected = Rows::default()
        .id(1)
        .fixed(&9_i64.to_le_bytes())
        .id(2)
        .null_fixed(8)
        .0;
    for strategy in STRATEGIES {
        let out = Rowdat1::new(strategy)
            .dump_columns(&spec(&[codes::LONGLONG]), &batch)
            .unwrap();
        assert_eq!(out, expected, "{strategy:?}");
    }
}

#[test]
fn test_empty_buffer_is_empty_batch() {
    for strategy in STRATEGIES {
        let codec = Rowdat1::new(strategy);
        assert!(codec.load_rows(&spec(&[codes::LONG]), &[]).unwrap().is_empty());
        assert!(codec.load_columns(&spec(&[codes::LONG]), &[]).unwrap().is_empty());
        let out = codec
            .dump_rows(&spec(&[codes::LONG]), &RowBatch::default())
            .unwrap();
        assert!(out.is_empty());
    }
}

#[test]
fn test_truncated_row_id() {
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).load_rows(&spec(&[codes::LONG]), &[1, 0, 0, 0, 0]);
        assert!(matches!(result, Err(CodecError::Truncated { .. })), "{strategy:?}");
    }
}

#[test]
fn test_truncated_fixed_value() {
    let data = Rows::default().id(1).raw(&[0, 1, 2]).0;
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).load_rows(&spec(&[codes::LONG]), &data);
        assert!(matches!(result, Err(CodecError::Truncated { .. })), "{strategy:?}");
    }
}

#[test]
fn test_length_prefix_past_end() {
    let data = Rows::default()
        .id(1)
        .raw(&[0])
        .raw(&100_i64.to_le_bytes())
        .raw(b"short")
        .0;
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).load_columns(&spec(&[codes::VARCHAR]), &data);
        assert!(matches!(result, Err(CodecError::Truncated { .. })), "{strategy:?}");
    }
}

#[test]
fn test_negative_length_prefix() {
    let data = Rows::default().id(1).raw(&[0]).raw(&(-4_i64).to_le_bytes()).0;
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).load_rows(&spec(&[codes::BLOB]), &data);
        assert!(
            matches!(result, Err(CodecError::NegativeLength(-4))),
            "{strategy:?}"
        );
    }
}

#[test]
fn test_invalid_utf8_text() {
    let data = Rows::default().id(1).bytes(&[0xff, 0xfe]).0;
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).load_rows(&spec(&[codes::VARCHAR]), &data);
        assert!(matches!(result, Err(CodecError::InvalidUtf8)), "{strategy:?}");
    }
}

#[test]
fn test_unknown_type_code() {
    let data = Rows::default().id(1).fixed(&[1]).0;
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).load_rows(&spec(&[99]), &data);
        assert!(matches!(result, Err(CodecError::UnknownType(99))), "{strategy:?}");
    }
}

#[test]
fn test_text_into_int_column_is_type_mismatch() {
    let batch = RowBatch::new(vec![1], vec![vec![Value::Text("x".into())]]);
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).dump_rows(&spec(&[codes::LONG]), &batch);
        assert!(matches!(result, Err(CodecError::TypeMismatch { .. })), "{strategy:?}");
    }
}

#[test]
fn test_row_arity_mismatch() {
    let batch = RowBatch::new(vec![1], vec![vec![Value::Int(1), Value::Int(2)]]);
    for strategy in STRATEGIES {
        let result = Rowdat1::new(strategy).dump_rows(&spec(&[codes::LONG]), &batch);
        assert!(
            matches!(result, Err(CodecError::ArityMismatch { expected: 1, got: 2 })),
            "{strategy:?}"
        );
    }
}

#[test]
fn test_mismatched_colspec_errors_or_misreads() {
    // Encoded as INT, decoded as SMALLINT.
    let data = Rows::default()
        .id(1)
        .fixed(&70_000_i32.to_le_bytes())
        .id(2)
        .fixed(&3_i32.to_le_bytes())
        .0;
    let expected = vec![vec![Value::Int(70_000)], vec![Value::Int(3)]];
    for strategy in STRATEGIES {
        match Rowdat1::new(strategy).load_rows(&spec(&[codes::SHORT]), &data) {
            Err(_) => {}
            Ok(batch) => assert_ne!(batch.rows, expected, "{strategy:?}"),
        }
    }
}

#[test]
fn test_strategies_agree_on_mixed_batch() {
    let colspec = spec(&[
        codes::TINY,
        -codes::SHORT,
        codes::INT24,
        -codes::LONGLONG,
        codes::FLOAT,
        codes::DOUBLE,
        codes::VARCHAR,
        -codes::BLOB,
    ]);
    let batch = RowBatch::new(
        vec![10, 11, 12],
        vec![
            vec![
                Value::Int(-1),
                Value::Int(65_535),
                Value::Int(-8_388_608),
                Value::UInt(u64::MAX),
                Value::Float(1.5),
                Value::Float(-2.25),
                Value::Text("a".into()),
                Value::Binary(vec![1, 2, 3]),
            ],
            vec![Value::Null; 8],
            vec![
                Value::Int(0),
                Value::Int(0),
                Value::Int(0),
                Value::UInt(0),
                Value::Float(0.0),
                Value::Float(0.0),
                Value::Text(String::new()),
                Value::Binary(Vec::new()),
            ],
        ],
    );
    let reference = Rowdat1::new(Strategy::Reference);
    let accelerated = Rowdat1::new(Strategy::Accelerated);

    let bytes = reference.dump_rows(&colspec, &batch).unwrap();
    assert_eq!(accelerated.dump_rows(&colspec, &batch).unwrap(), bytes);

    let rows_ref = reference.load_rows(&colspec, &bytes).unwrap();
    let rows_acc = accelerated.load_rows(&colspec, &bytes).unwrap();
    assert_eq!(rows_ref, rows_acc);
    assert_eq!(rows_ref, batch);

    let cols_ref = reference.load_columns(&colspec, &bytes).unwrap();
    let cols_acc = accelerated.load_columns(&colspec, &bytes).unwrap();
    // Null float slots hold NaN, so compare masks here and data via the bytes.
    assert_eq!(cols_ref.row_ids, cols_acc.row_ids);
    for (a, b) in cols_ref.columns.iter().zip(&cols_acc.columns) {
        assert_eq!(a.mask, b.mask);
        assert_eq!(a.data.kind_name(), b.data.kind_name());
    }

    let out_ref = reference.dump_columns(&colspec, &cols_ref).unwrap();
    let out_acc = accelerated.dump_columns(&colspec, &cols_acc).unwrap();
    assert_eq!(out_ref, bytes);
    assert_eq!(out_acc, bytes);
}
