//! Unix-socket accept loop with one OS thread per connection.

use std::fs;
use std::io;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use socket2::{Domain, SockAddr, Socket, Type};

use super::{serve_connection, ConnectionContext};
use crate::error::ExtFuncError;

pub struct CollocatedServer {
    listener: UnixListener,
    path: PathBuf,
    ctx: Arc<ConnectionContext>,
    single_thread: bool,
    shutdown: Arc<AtomicBool>,
    next_id: AtomicU64,
}

/// Stops a running [`CollocatedServer`] from another thread.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
    path: PathBuf,
}

impl ServerHandle {
    /// Ask the accept loop to exit. Connections already running finish on
    /// their own.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        // Wake the blocking accept.
        let _ = UnixStream::connect(&self.path);
    }
}

fn remove_stale(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "stale_socket_removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

impl CollocatedServer {
    /// Bind and listen on `path`, removing a stale socket file first.
    /// `backlog` bounds connections waiting to be accepted.
    pub fn bind(path: impl AsRef<Path>, backlog: usize, ctx: ConnectionContext) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale(&path)?;

        let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
        socket.bind(&SockAddr::unix(&path)?)?;
        socket.listen(i32::try_from(backlog).unwrap_or(i32::MAX))?;
        let listener: UnixListener = socket.into();

        tracing::info!(path = %path.display(), backlog, "collocated_listening");
        Ok(CollocatedServer {
            listener,
            path,
            ctx: Arc::new(ctx),
            single_thread: false,
            shutdown: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(0),
        })
    }

    /// Join each connection's thread before accepting the next.
    pub fn single_thread(mut self, single_thread: bool) -> Self {
        self.single_thread = single_thread;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            shutdown: Arc::clone(&self.shutdown),
            path: self.path.clone(),
        }
    }

    /// Accept connections until [`ServerHandle::shutdown`] is called.
    pub fn run(&self) -> io::Result<()> {
        loop {
            let stream = match self.listener.accept() {
                Ok((stream, _)) => stream,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::ConnectionAborted => {
                    tracing::warn!(error = %e, "accept_failed");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            tracing::info!(connection = id, "connection_accepted");
            let ctx = Arc::clone(&self.ctx);
            let worker = thread::Builder::new()
                .name(format!("extfunc-conn-{id}"))
                .spawn(move || handle_connection(id, stream, &ctx))?;
            if self.single_thread && worker.join().is_err() {
                tracing::error!(connection = id, "connection_thread_panicked");
            }
        }
        tracing::info!(path = %self.path.display(), "collocated_stopped");
        Ok(())
    }
}

impl Drop for CollocatedServer {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "socket_cleanup_failed");
            }
        }
    }
}

fn handle_connection(id: u64, stream: UnixStream, ctx: &ConnectionContext) {
    match serve_connection(stream, ctx) {
        Ok(frames) => tracing::info!(connection = id, frames, "connection_closed"),
        Err(ExtFuncError::Protocol(e)) => {
            tracing::warn!(connection = id, error = %e, "protocol_violation");
        }
        Err(e) => tracing::info!(connection = id, error = %e, "connection_aborted"),
    }
}
