//! Arrow IPC file codec.
//!
//! The first column is the `Int64` row id; one column per spec entry follows
//! (`col0`, `col1`, ... when encoding). Validity bitmaps carry nulls. An empty
//! batch is an empty body in both directions.

use std::io::Cursor;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int64Array};
use arrow::compute::concat_batches;
use arrow::compute::kernels::cast::cast;
use arrow::datatypes::{DataType, Field, Int64Type, Schema};
use arrow::ipc::reader::FileReader;
use arrow::ipc::writer::FileWriter;
use arrow::record_batch::RecordBatch;

use crate::batch::arrow::{array_to_column, arrow_type, column_to_array};
use crate::batch::{ColumnBatch, RowBatch};
use crate::codec::{Codec, CodecError, ARROW_CONTENT_TYPE};
use crate::dtypes::{column_types, ColumnSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct ArrowCodec;

fn read_record_batch(data: &[u8]) -> Result<Option<RecordBatch>, CodecError> {
    if data.is_empty() {
        return Ok(None);
    }
    let reader = FileReader::try_new(Cursor::new(data), None)?;
    let schema = reader.schema();
    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    Ok(Some(concat_batches(&schema, &batches)?))
}

impl Codec for ArrowCodec {
    fn name(&self) -> &'static str {
        "arrow"
    }

    fn content_type(&self) -> &'static str {
        ARROW_CONTENT_TYPE
    }

    fn load_rows(&self, colspec: &[ColumnSpec], data: &[u8]) -> Result<RowBatch, CodecError> {
        self.load_columns(colspec, data)?.to_rows()
    }

    fn load_columns(
        &self,
        colspec: &[ColumnSpec],
        data: &[u8],
    ) -> Result<ColumnBatch, CodecError> {
        let types = column_types(colspec)?;
        let Some(batch) = read_record_batch(data)? else {
            return Ok(ColumnBatch::default());
        };
        if batch.num_columns() != types.len() + 1 {
            return Err(CodecError::ArityMismatch {
                expected: types.len() + 1,
                got: batch.num_columns(),
            });
        }
        let ids = cast(batch.column(0), &DataType::Int64)?;
        if ids.null_count() > 0 {
            return Err(CodecError::Invalid("row id column contains nulls".into()));
        }
        let row_ids = ids.as_primitive::<Int64Type>().values().to_vec();
        let columns = types
            .iter()
            .enumerate()
            .map(|(i, ty)| array_to_column(batch.column(i + 1).as_ref(), *ty))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ColumnBatch::new(row_ids, columns))
    }

    fn dump_rows(&self, returns: &[ColumnSpec], batch: &RowBatch) -> Result<Vec<u8>, CodecError> {
        let types = column_types(returns)?;
        self.dump_columns(returns, &ColumnBatch::from_rows(batch, &types, true)?)
    }

    fn dump_columns(
        &self,
        returns: &[ColumnSpec],
        batch: &ColumnBatch,
    ) -> Result<Vec<u8>, CodecError> {
        let types = column_types(returns)?;
        batch.validate()?;
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        if batch.columns.len() != types.len() {
            return Err(CodecError::ArityMismatch {
                expected: types.len(),
                got: batch.columns.len(),
            });
        }

        let mut fields = vec![Field::new("row_id", DataType::Int64, false)];
        let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(batch.row_ids.clone()))];
        for (i, (column, ty)) in batch.columns.iter().zip(&types).enumerate() {
            fields.push(Field::new(format!("col{i}"), arrow_type(*ty), true));
            arrays.push(column_to_array(&*column.conformed(*ty)?));
        }
        let schema = Arc::new(Schema::new(fields));
        let record = RecordBatch::try_new(schema.clone(), arrays)?;

        let mut writer = FileWriter::try_new(Vec::new(), &schema)?;
        writer.write(&record)?;
        writer.finish()?;
        Ok(writer.into_inner()?)
    }
}
