//! # extfunc
//!
//! External function server for a database engine. The engine ships batches
//! of rows to named user functions and reads back one result per row.
//!
//! ## Pipeline
//!
//! ```text
//! encoded batch (rowdat_1 | JSON | Arrow IPC)
//!     ↓
//! [Codec::load]          → RowBatch or ColumnBatch (per endpoint shape)
//!     ↓
//! [Registry::invoke]     → user function
//!     ↓
//! [Codec::dump]          → encoded result batch
//! ```
//!
//! ## Deployment modes
//!
//! ```text
//! remote      HTTP POST /invoke                        (http)
//! collocated  Unix socket control + shared input/output files (collocated)
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use extfunc::{codes, ColumnSpec, Endpoint, InvokeError, Registry, Value};
//!
//! let mut registry = Registry::new();
//! registry.register(Endpoint::scalar(
//!     "double",
//!     vec![ColumnSpec::new("x", codes::LONG)],
//!     ColumnSpec::new("", codes::LONG),
//!     |row| match row[0] {
//!         Value::Int(x) => x.checked_mul(2).map(Value::Int).ok_or_else(|| InvokeError::value("overflow")),
//!         _ => Ok(Value::Null),
//!     },
//! ));
//!
//! let state = Arc::new(extfunc::http::AppState::new(Arc::new(registry)));
//! extfunc::http::start_http_server(state, &extfunc::Config::default().http).await?;
//! ```

pub mod batch;
pub mod codec;
pub mod collocated;
pub mod config;
pub mod dtypes;
pub mod error;
pub mod http;
pub mod registry;
pub mod sql;
pub mod timer;
pub mod value;

pub use batch::{BatchShape, Column, ColumnBatch, ColumnBuffer, ColumnData, Payload, RowBatch};
pub use codec::{Codec, CodecError, Codecs, Rowdat1, Strategy, WireFormat};
pub use collocated::{CollocatedServer, ConnectionContext, ServerHandle};
pub use config::Config;
pub use dtypes::{codes, ColumnSpec, ColumnType};
pub use error::{DispatchError, ExtFuncError, ExtFuncResult, InvokeError, ProtocolError};
pub use registry::{DataFormat, Endpoint, FunctionType, Invocable, Registry};
pub use sql::{AppMode, SqlOptions};
pub use value::Value;
