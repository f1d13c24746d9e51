//! # Function Registry
//!
//! Named endpoints and the dispatcher that routes a call to one of them.
//!
//! An [`Endpoint`] pairs a callable with its signature: input column spec,
//! output column spec, UDF/TVF kind. The callable's shape decides how the
//! payload is decoded:
//!
//! | Invocable | Data format | Input | Masks |
//! |-----------|-------------|-------|-------|
//! | `Row` | scalar | [`RowBatch`] | n/a (`Value::Null`) |
//! | `Vector` | vector | `&[ColumnData]` | dropped |
//! | `MaskedVector` | vector | `&[Column]` | passed |
//! | `Arrow` | arrow | `&[ArrayRef]` | validity bitmaps |
//!
//! The registry is filled at startup and shared read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::ArrayRef;
use serde::{Deserialize, Serialize};

use crate::batch::arrow::{array_to_column, column_to_array};
use crate::batch::{BatchShape, Column, ColumnBatch, ColumnData, Payload, RowBatch};
use crate::dtypes::ColumnSpec;
use crate::error::{DispatchError, ExtFuncResult, InvokeError};
use crate::value::Value;

pub type RowFn = Arc<dyn Fn(RowBatch) -> Result<RowBatch, InvokeError> + Send + Sync>;
pub type VectorFn = Arc<dyn Fn(&[ColumnData]) -> Result<ColumnData, InvokeError> + Send + Sync>;
pub type MaskedVectorFn = Arc<dyn Fn(&[Column]) -> Result<Column, InvokeError> + Send + Sync>;
pub type ArrowFn = Arc<dyn Fn(&[ArrayRef]) -> Result<ArrayRef, InvokeError> + Send + Sync>;

/// A registered callable in one of the supported call shapes.
#[derive(Clone)]
pub enum Invocable {
    /// Whole batch of rows in, rows out
    Row(RowFn),
    /// Dense vectors in, one dense vector out
    Vector(VectorFn),
    /// Vectors with null masks in, one masked vector out
    MaskedVector(MaskedVectorFn),
    /// Arrow arrays in, one Arrow array out
    Arrow(ArrowFn),
}

impl Invocable {
    fn kind(&self) -> &'static str {
        match self {
            Invocable::Row(_) => "row",
            Invocable::Vector(_) => "vector",
            Invocable::MaskedVector(_) => "masked_vector",
            Invocable::Arrow(_) => "arrow",
        }
    }
}

/// Payload representation an endpoint consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Scalar,
    Vector,
    Arrow,
}

impl DataFormat {
    pub fn shape(self) -> BatchShape {
        match self {
            DataFormat::Scalar => BatchShape::Rows,
            DataFormat::Vector | DataFormat::Arrow => BatchShape::Columns,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FunctionType {
    Udf,
    Tvf,
}

/// A named function and its signature.
#[derive(Clone)]
pub struct Endpoint {
    pub name: String,
    pub args: Vec<ColumnSpec>,
    pub returns: ColumnSpec,
    pub function_type: FunctionType,
    invocable: Invocable,
}

impl Endpoint {
    pub fn new(
        name: impl Into<String>,
        args: Vec<ColumnSpec>,
        returns: ColumnSpec,
        invocable: Invocable,
    ) -> Self {
        Endpoint {
            name: name.into(),
            args,
            returns,
            function_type: FunctionType::Udf,
            invocable,
        }
    }

    /// Batch-of-rows function.
    pub fn rows<F>(name: impl Into<String>, args: Vec<ColumnSpec>, returns: ColumnSpec, f: F) -> Self
    where
        F: Fn(RowBatch) -> Result<RowBatch, InvokeError> + Send + Sync + 'static,
    {
        Self::new(name, args, returns, Invocable::Row(Arc::new(f)))
    }

    /// Row-at-a-time scalar function; each input row yields one output value
    /// under the same row id.
    pub fn scalar<F>(name: impl Into<String>, args: Vec<ColumnSpec>, returns: ColumnSpec, f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        Self::rows(name, args, returns, move |batch: RowBatch| {
            let mut out = RowBatch::with_capacity(batch.len());
            for (row_id, row) in batch.iter() {
                out.push(row_id, vec![f(row)?]);
            }
            Ok(out)
        })
    }

    pub fn vectors<F>(name: impl Into<String>, args: Vec<ColumnSpec>, returns: ColumnSpec, f: F) -> Self
    where
        F: Fn(&[ColumnData]) -> Result<ColumnData, InvokeError> + Send + Sync + 'static,
    {
        Self::new(name, args, returns, Invocable::Vector(Arc::new(f)))
    }

    pub fn masked_vectors<F>(
        name: impl Into<String>,
        args: Vec<ColumnSpec>,
        returns: ColumnSpec,
        f: F,
    ) -> Self
    where
        F: Fn(&[Column]) -> Result<Column, InvokeError> + Send + Sync + 'static,
    {
        Self::new(name, args, returns, Invocable::MaskedVector(Arc::new(f)))
    }

    pub fn arrow<F>(name: impl Into<String>, args: Vec<ColumnSpec>, returns: ColumnSpec, f: F) -> Self
    where
        F: Fn(&[ArrayRef]) -> Result<ArrayRef, InvokeError> + Send + Sync + 'static,
    {
        Self::new(name, args, returns, Invocable::Arrow(Arc::new(f)))
    }

    /// Mark as a table-valued function.
    pub fn tvf(mut self) -> Self {
        self.function_type = FunctionType::Tvf;
        self
    }

    pub fn data_format(&self) -> DataFormat {
        match self.invocable {
            Invocable::Row(_) => DataFormat::Scalar,
            Invocable::Vector(_) | Invocable::MaskedVector(_) => DataFormat::Vector,
            Invocable::Arrow(_) => DataFormat::Arrow,
        }
    }

    pub fn include_null_masks(&self) -> bool {
        matches!(self.invocable, Invocable::MaskedVector(_) | Invocable::Arrow(_))
    }

    /// Shape the codec must decode into for this endpoint.
    pub fn input_shape(&self) -> BatchShape {
        self.data_format().shape()
    }

    /// Call the function on a decoded payload.
    ///
    /// Vector results are paired with the input row ids; a result of the
    /// wrong length surfaces when it is encoded.
    pub fn invoke(&self, payload: Payload) -> ExtFuncResult<Payload> {
        let mismatch = || DispatchError::ShapeMismatch {
            name: self.name.clone(),
            expected: self.input_shape().name(),
        };
        let result = match (&self.invocable, payload) {
            (Invocable::Row(f), Payload::Rows(batch)) => Payload::Rows(f(batch)?),
            (Invocable::Vector(f), Payload::Columns(batch)) => {
                let data: Vec<ColumnData> = batch.columns.into_iter().map(|c| c.data).collect();
                let out = f(&data)?;
                Payload::Columns(ColumnBatch::new(batch.row_ids, vec![Column::new(out)]))
            }
            (Invocable::MaskedVector(f), Payload::Columns(batch)) => {
                let out = f(&batch.columns)?;
                Payload::Columns(ColumnBatch::new(batch.row_ids, vec![out]))
            }
            (Invocable::Arrow(f), Payload::Columns(batch)) => {
                let arrays: Vec<ArrayRef> = batch.columns.iter().map(column_to_array).collect();
                let out = f(&arrays)?;
                let column = array_to_column(out.as_ref(), self.returns.column_type()?)?;
                Payload::Columns(ColumnBatch::new(batch.row_ids, vec![column.compact_mask()]))
            }
            _ => return Err(mismatch().into()),
        };
        Ok(result)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("returns", &self.returns)
            .field("function_type", &self.function_type)
            .field("invocable", &self.invocable.kind())
            .finish()
    }
}

/// Name → endpoint table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    endpoints: BTreeMap<String, Arc<Endpoint>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint. A later registration under the same name replaces
    /// the earlier one, which is returned.
    pub fn register(&mut self, endpoint: Endpoint) -> Option<Arc<Endpoint>> {
        let previous = self
            .endpoints
            .insert(endpoint.name.clone(), Arc::new(endpoint));
        if let Some(prev) = &previous {
            tracing::warn!(function = %prev.name, "endpoint_replaced");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Result<Arc<Endpoint>, DispatchError> {
        self.endpoints
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::NotFound(name.to_string()))
    }

    pub fn invoke(&self, name: &str, payload: Payload) -> ExtFuncResult<Payload> {
        self.get(name)?.invoke(payload)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Endpoint>> {
        self.endpoints.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
