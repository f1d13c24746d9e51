//! JSON codec: `{"data": [[row_id, v1, v2, ...], ...]}`.
//!
//! Nulls are JSON `null`; binary values travel as standard base64 strings.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::batch::{narrow_f32, ColumnBatch, RowBatch};
use crate::codec::{Codec, CodecError, JSON_CONTENT_TYPE};
use crate::dtypes::{column_types, ColumnSpec, ColumnType};
use crate::value::Value;

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    data: Vec<Vec<Json>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

fn decode_value(json: &Json, ty: ColumnType) -> Result<Value, CodecError> {
    if json.is_null() {
        return Ok(Value::Null);
    }
    let mismatch = || CodecError::TypeMismatch {
        expected: ty.sql_name(),
        got: match json {
            Json::Bool(_) => "boolean",
            Json::Number(_) => "number",
            Json::String(_) => "string",
            Json::Array(_) => "array",
            Json::Object(_) => "object",
            Json::Null => "null",
        },
    };
    let value = match ty {
        ColumnType::UInt64 => match json.as_u64() {
            Some(u) => Value::UInt(u),
            None => Value::Int(json.as_i64().ok_or_else(mismatch)?),
        },
        t if t.is_integer() => Value::Int(json.as_i64().ok_or_else(mismatch)?),
        ColumnType::Float32 | ColumnType::Float64 => {
            Value::Float(json.as_f64().ok_or_else(mismatch)?)
        }
        ColumnType::Text(_) => Value::Text(json.as_str().ok_or_else(mismatch)?.to_string()),
        ColumnType::Binary(_) => {
            Value::Binary(STANDARD.decode(json.as_str().ok_or_else(mismatch)?)?)
        }
        _ => return Err(mismatch()),
    };
    Ok(value)
}

/// JSON numbers are finite; a NaN would otherwise come back as `null`.
fn finite(x: f64) -> Result<Json, CodecError> {
    serde_json::Number::from_f64(x)
        .map(Json::Number)
        .ok_or(CodecError::NotFinite(x))
}

fn encode_value(value: &Value, ty: ColumnType) -> Result<Json, CodecError> {
    if value.is_null() {
        return Ok(Json::Null);
    }
    let json = match ty {
        t if t.is_unsigned() => Json::from(value.to_integer(t)? as u64),
        t if t.is_integer() => Json::from(value.to_integer(t)? as i64),
        ColumnType::Float32 => finite(f64::from(narrow_f32(value.to_float(ty)?)?))?,
        ColumnType::Float64 => finite(value.to_float(ty)?)?,
        ColumnType::Text(_) => match value {
            Value::Text(s) => Json::from(s.as_str()),
            other => {
                return Err(CodecError::TypeMismatch {
                    expected: ty.sql_name(),
                    got: other.kind_name(),
                })
            }
        },
        ColumnType::Binary(_) => match value.as_bytes() {
            Some(bytes) => Json::from(STANDARD.encode(bytes)),
            None => {
                return Err(CodecError::TypeMismatch {
                    expected: ty.sql_name(),
                    got: value.kind_name(),
                })
            }
        },
        _ => {
            return Err(CodecError::TypeMismatch {
                expected: ty.sql_name(),
                got: value.kind_name(),
            })
        }
    };
    Ok(json)
}

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn load_rows(&self, colspec: &[ColumnSpec], data: &[u8]) -> Result<RowBatch, CodecError> {
        let types = column_types(colspec)?;
        let envelope: Envelope = serde_json::from_slice(data)?;
        let mut batch = RowBatch::with_capacity(envelope.data.len());
        for entry in &envelope.data {
            let Some((row_id, values)) = entry.split_first() else {
                return Err(CodecError::Invalid("JSON row is missing its row id".into()));
            };
            let row_id = row_id
                .as_i64()
                .ok_or_else(|| CodecError::Invalid(format!("invalid row id: {row_id}")))?;
            if values.len() != types.len() {
                return Err(CodecError::ArityMismatch {
                    expected: types.len(),
                    got: values.len(),
                });
            }
            let row = values
                .iter()
                .zip(&types)
                .map(|(json, ty)| decode_value(json, *ty))
                .collect::<Result<Vec<_>, _>>()?;
            batch.push(row_id, row);
        }
        Ok(batch)
    }

    fn load_columns(
        &self,
        colspec: &[ColumnSpec],
        data: &[u8],
    ) -> Result<ColumnBatch, CodecError> {
        let types = column_types(colspec)?;
        let rows = self.load_rows(colspec, data)?;
        ColumnBatch::from_rows(&rows, &types, true)
    }

    fn dump_rows(&self, returns: &[ColumnSpec], batch: &RowBatch) -> Result<Vec<u8>, CodecError> {
        let types = column_types(returns)?;
        batch.validate()?;
        let mut data = Vec::with_capacity(batch.len());
        for (row_id, row) in batch.iter() {
            if row.len() != types.len() {
                return Err(CodecError::ArityMismatch {
                    expected: types.len(),
                    got: row.len(),
                });
            }
            let mut out = Vec::with_capacity(row.len() + 1);
            out.push(Json::from(row_id));
            for (value, ty) in row.iter().zip(&types) {
                out.push(encode_value(value, *ty)?);
            }
            data.push(out);
        }
        Ok(serde_json::to_vec(&Envelope { data })?)
    }

    fn dump_columns(
        &self,
        returns: &[ColumnSpec],
        batch: &ColumnBatch,
    ) -> Result<Vec<u8>, CodecError> {
        self.dump_rows(returns, &batch.to_rows()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtypes::codes;

    fn spec() -> Vec<ColumnSpec> {
        vec![
            ColumnSpec::new("n", codes::LONGLONG),
            ColumnSpec::new("s", codes::VARCHAR),
            ColumnSpec::new("b", -codes::BLOB),
        ]
    }

    #[test]
    fn test_binary_is_base64() {
        let batch = RowBatch::new(
            vec![7],
            vec![vec![Value::Int(1), Value::from("x"), Value::Binary(b"hi".to_vec())]],
        );
        let bytes = JsonCodec.dump_rows(&spec(), &batch).unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert_eq!(text, r#"{"data":[[7,1,"x","aGk="]]}"#);
        assert_eq!(JsonCodec.load_rows(&spec(), &bytes).unwrap(), batch);
    }

    #[test]
    fn test_nulls_and_masks() {
        let body = br#"{"data": [[1, null, "a", null], [2, 5, null, "AA=="]]}"#;
        let batch = JsonCodec.load_columns(&spec(), body).unwrap();
        assert_eq!(batch.row_ids, vec![1, 2]);
        assert_eq!(batch.columns[0].data.as_i64(), Some(&[0, 5][..]));
        assert_eq!(batch.columns[0].mask, Some(vec![true, false]));
        assert_eq!(batch.columns[1].mask, Some(vec![false, true]));
        assert_eq!(batch.columns[2].data.as_binary().unwrap()[1], vec![0]);
    }

    #[test]
    fn test_nan_is_rejected_not_nulled() {
        let spec = [ColumnSpec::new("d", codes::DOUBLE)];
        let batch = RowBatch::new(vec![1], vec![vec![Value::Float(f64::NAN)]]);
        assert!(matches!(
            JsonCodec.dump_rows(&spec, &batch),
            Err(CodecError::NotFinite(x)) if x.is_nan()
        ));

        let null = RowBatch::new(vec![1], vec![vec![Value::Null]]);
        let bytes = JsonCodec.dump_rows(&spec, &null).unwrap();
        assert_eq!(bytes, br#"{"data":[[1,null]]}"#);
    }

    #[test]
    fn test_masked_float_slot_still_dumps_null() {
        let spec = [ColumnSpec::new("d", codes::DOUBLE)];
        let body = br#"{"data": [[1, null], [2, 1.5]]}"#;
        let columns = JsonCodec.load_columns(&spec, body).unwrap();
        let bytes = JsonCodec.dump_columns(&spec, &columns).unwrap();
        assert_eq!(bytes, br#"{"data":[[1,null],[2,1.5]]}"#);
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let body = br#"{"data": [[1, 2]]}"#;
        assert!(matches!(
            JsonCodec.load_rows(&spec(), body),
            Err(CodecError::ArityMismatch {
                expected: 3,
                got: 1
            })
        ));
    }
}
