//! Error Types
//!
//! Error taxonomy for the invocation engine:
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`ProtocolError`] | control channel, frame headers | connection aborted, no reply |
//! | [`DispatchError`] | registry lookup | status 500, connection closed |
//! | [`CodecError`] | rowdat_1 / JSON / Arrow codecs | value error, status 500 |
//! | [`InvokeError`] | the user function | status 500, connection closed |
//!
//! [`ExtFuncError`] wraps all of them for the front ends.

use std::io;
use thiserror::Error;

pub use crate::codec::CodecError;

/// Violations of the collocated control protocol.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// I/O error on the control socket
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// System call failure (recvmsg, mmap)
    #[error("System error: {0}")]
    Sys(#[from] nix::errno::Errno),

    /// Peer closed the socket or sent fewer bytes than announced
    #[error("Short read of {what}: expected {expected} bytes, got {got}")]
    ShortRead {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// A length field was negative
    #[error("Negative {what} in control message: {value}")]
    NegativeLength { what: &'static str, value: i64 },

    /// Announced function name is longer than any name we accept
    #[error("Function name length {length} exceeds limit of {limit} bytes")]
    NameTooLong { length: usize, limit: usize },

    /// The ancillary payload did not carry exactly two descriptors
    #[error("Expected 2 file descriptors, received {0}")]
    DescriptorCount(usize),

    /// The kernel truncated the ancillary payload
    #[error("Ancillary data was truncated")]
    ControlTruncated,

    /// Function name was not UTF-8
    #[error("Function name is not valid UTF-8")]
    InvalidName,

    /// A frame announced more bytes than the shared input file holds
    #[error("Frame length {length} exceeds input file size {file_size}")]
    FrameTooLarge { length: usize, file_size: u64 },

    /// Operation attempted in the wrong connection state
    #[error("Control channel is in state {found}, expected {expected}")]
    State {
        expected: &'static str,
        found: &'static str,
    },
}

/// Failures resolving a function name to an endpoint.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No endpoint registered under this name
    #[error("Function not found: {0}")]
    NotFound(String),

    /// The decoded payload does not have the shape the endpoint consumes
    #[error("Function '{name}' expects {expected} input")]
    ShapeMismatch { name: String, expected: &'static str },
}

/// Failures raised by a user function.
#[derive(Error, Debug)]
pub enum InvokeError {
    /// Invalid or out-of-range value computed by the function
    #[error("Value error: {0}")]
    Value(String),

    /// Any other failure inside the function
    #[error("{0}")]
    Failed(String),

    /// Codec helper used inside the function failed
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Arrow kernel failure inside an Arrow-backed function
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl InvokeError {
    pub fn value(message: impl Into<String>) -> Self {
        InvokeError::Value(message.into())
    }

    pub fn failed(message: impl Into<String>) -> Self {
        InvokeError::Failed(message.into())
    }
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum ExtFuncError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invocation error: {0}")]
    Invoke(#[from] InvokeError),

    /// No codec for a (content type, data version) pair
    #[error("Unsupported data format: content type '{content_type}', version '{version}'")]
    UnsupportedFormat {
        content_type: String,
        version: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("{0}")]
    Other(String),
}

impl ExtFuncError {
    /// Codec failures and value errors raised by functions.
    pub fn is_value_error(&self) -> bool {
        matches!(
            self,
            ExtFuncError::Codec(_)
                | ExtFuncError::Invoke(InvokeError::Value(_) | InvokeError::Codec(_))
        )
    }

    /// Full `a: b: c` rendering of the source chain, for logs.
    pub fn chain(&self) -> String {
        let mut out = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let next = err.to_string();
            if !out.ends_with(&next) {
                out.push_str(": ");
                out.push_str(&next);
            }
            source = err.source();
        }
        out
    }
}

/// Result type for engine operations
pub type ExtFuncResult<T> = Result<T, ExtFuncError>;
