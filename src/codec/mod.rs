//! # Codecs
//!
//! Wire encodings for row batches. Every codec implements [`Codec`]: decode a
//! byte buffer into rows or columns given the input column spec, and encode a
//! result back given the output column spec.
//!
//! | Format | Content type | Module |
//! |--------|--------------|--------|
//! | rowdat_1 | `application/octet-stream` | [`rowdat_1`] |
//! | JSON | `application/json` | [`json`] |
//! | Arrow IPC file | `application/vnd.apache.arrow.file` | [`arrow`] |
//!
//! [`Codecs`] resolves a `(content type, data version)` pair to a codec.

pub mod arrow;
pub mod error;
pub mod json;
pub mod rowdat_1;

pub use error::CodecError;
pub use rowdat_1::{Rowdat1, Strategy};

use std::collections::HashMap;
use std::fmt;
use std::slice;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::batch::{BatchShape, ColumnBatch, Payload, RowBatch};
use crate::dtypes::ColumnSpec;
use crate::error::{ExtFuncError, ExtFuncResult};

pub const ROWDAT_1_CONTENT_TYPE: &str = "application/octet-stream";
pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const ARROW_CONTENT_TYPE: &str = "application/vnd.apache.arrow.file";

/// The only data version currently defined.
pub const DATA_VERSION: &str = "1.0";

/// Load/dump contract shared by every wire format.
pub trait Codec: Send + Sync {
    /// Short format name for logs.
    fn name(&self) -> &'static str;

    /// MIME type of encoded payloads.
    fn content_type(&self) -> &'static str;

    fn load_rows(&self, colspec: &[ColumnSpec], data: &[u8]) -> Result<RowBatch, CodecError>;

    /// Decode into dense columns. Every column carries a mask.
    fn load_columns(&self, colspec: &[ColumnSpec], data: &[u8])
        -> Result<ColumnBatch, CodecError>;

    fn dump_rows(&self, returns: &[ColumnSpec], batch: &RowBatch) -> Result<Vec<u8>, CodecError>;

    /// Encode dense columns. A slot is null when its mask bit is set; a
    /// column without a mask has no nulls.
    fn dump_columns(
        &self,
        returns: &[ColumnSpec],
        batch: &ColumnBatch,
    ) -> Result<Vec<u8>, CodecError>;

    fn load(
        &self,
        shape: BatchShape,
        colspec: &[ColumnSpec],
        data: &[u8],
    ) -> Result<Payload, CodecError> {
        match shape {
            BatchShape::Rows => self.load_rows(colspec, data).map(Payload::Rows),
            BatchShape::Columns => self.load_columns(colspec, data).map(Payload::Columns),
        }
    }

    fn dump(&self, returns: &[ColumnSpec], payload: &Payload) -> Result<Vec<u8>, CodecError> {
        match payload {
            Payload::Rows(batch) => self.dump_rows(returns, batch),
            Payload::Columns(batch) => self.dump_columns(returns, batch),
        }
    }

    /// Convenience for the common single-output case.
    fn dump_single(&self, returns: &ColumnSpec, payload: &Payload) -> Result<Vec<u8>, CodecError> {
        self.dump(slice::from_ref(returns), payload)
    }
}

/// Wire format named in `CREATE FUNCTION ... FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WireFormat {
    #[default]
    #[serde(rename = "rowdat_1")]
    Rowdat1,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "arrow")]
    Arrow,
}

impl WireFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            WireFormat::Rowdat1 => ROWDAT_1_CONTENT_TYPE,
            WireFormat::Json => JSON_CONTENT_TYPE,
            WireFormat::Arrow => ARROW_CONTENT_TYPE,
        }
    }

    pub fn sql_name(self) -> &'static str {
        match self {
            WireFormat::Rowdat1 => "ROWDAT_1",
            WireFormat::Json => "JSON",
            WireFormat::Arrow => "ARROW",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// Codec table keyed by `(content type, data version)`.
#[derive(Clone)]
pub struct Codecs {
    by_key: HashMap<(String, String), Arc<dyn Codec>>,
}

impl Codecs {
    /// All built-in codecs for data version 1.0. `accelerated` picks the
    /// rowdat_1 strategy.
    pub fn new(accelerated: bool) -> Self {
        let strategy = if accelerated {
            Strategy::Accelerated
        } else {
            Strategy::Reference
        };
        let mut codecs = Codecs {
            by_key: HashMap::new(),
        };
        codecs.insert(DATA_VERSION, Arc::new(Rowdat1::new(strategy)));
        codecs.insert(DATA_VERSION, Arc::new(json::JsonCodec));
        codecs.insert(DATA_VERSION, Arc::new(arrow::ArrowCodec));
        codecs
    }

    pub fn insert(&mut self, version: &str, codec: Arc<dyn Codec>) {
        self.by_key
            .insert((codec.content_type().to_string(), version.to_string()), codec);
    }

    /// Exact-match lookup; there is no fallback between versions or types.
    pub fn lookup(&self, content_type: &str, version: &str) -> ExtFuncResult<Arc<dyn Codec>> {
        self.by_key
            .get(&(content_type.to_string(), version.to_string()))
            .cloned()
            .ok_or_else(|| ExtFuncError::UnsupportedFormat {
                content_type: content_type.to_string(),
                version: version.to_string(),
            })
    }

    pub fn for_format(&self, format: WireFormat, version: &str) -> ExtFuncResult<Arc<dyn Codec>> {
        self.lookup(format.content_type(), version)
    }
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.by_key.keys().collect();
        keys.sort();
        f.debug_struct("Codecs").field("keys", &keys).finish()
    }
}
