//! # Collocated Mode
//!
//! Function server for a database engine on the same host. Each connection
//! on a Unix domain socket binds one function name and two shared files;
//! batches then move through the files while the socket carries only small
//! fixed-size headers.
//!
//! ## Wire protocol (little-endian)
//!
//! | Direction | Bytes | Content |
//! |-----------|-------|---------|
//! | → server | 16 | `version: i64`, `name_len: i64` |
//! | → server | name_len + SCM_RIGHTS | function name, `[fd_in, fd_out]` |
//! | → server | 8 | frame length (0 or EOF ends the connection) |
//! | ← server | 16 | `status: i64` (200/500), `response_size: i64` |
//!
//! ## Modules
//!
//! - [`control`]: handshake and header I/O state machine
//! - [`mmap`]: scoped mapping of the input file
//! - [`batch`]: the frame loop
//! - [`listener`]: accept loop, thread per connection

pub mod batch;
pub mod control;
pub mod listener;
pub mod mmap;

pub use batch::BatchChannel;
pub use control::{Binding, ControlChannel, ControlState};
pub use listener::{CollocatedServer, ServerHandle};
pub use mmap::MappedSegment;

use std::os::unix::net::UnixStream;
use std::sync::Arc;

use crate::codec::Codec;
use crate::error::ExtFuncResult;
use crate::registry::Registry;

pub const CONTROL_HEADER_LEN: usize = 16;
pub const FRAME_HEADER_LEN: usize = 8;
pub const STATUS_OK: i64 = 200;
pub const STATUS_ERROR: i64 = 500;

/// The output file is never shrunk below this size.
pub const MIN_OUTPUT_SIZE: usize = 128 * 1024;

/// Read-only state shared by every connection.
#[derive(Clone)]
pub struct ConnectionContext {
    pub registry: Arc<Registry>,
    pub codec: Arc<dyn Codec>,
    /// Emit `function_call_metrics` events
    pub metrics: bool,
}

impl ConnectionContext {
    pub fn new(registry: Arc<Registry>, codec: Arc<dyn Codec>) -> Self {
        ConnectionContext {
            registry,
            codec,
            metrics: true,
        }
    }
}

/// Run one connection to completion: handshake, then frames until the peer
/// stops. Returns the number of frames served.
pub fn serve_connection(stream: UnixStream, ctx: &ConnectionContext) -> ExtFuncResult<usize> {
    let mut control = ControlChannel::new(stream);
    let binding = control.handshake()?;
    tracing::debug!(
        function = %binding.function,
        version = binding.version,
        "connection_bound"
    );
    BatchChannel::new(control, binding, ctx).run()
}
