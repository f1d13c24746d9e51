//! Control channel of a collocated connection.
//!
//! ```text
//! AwaitingHeader
//!   -- 16 bytes: version i64, name_len i64 -->
//! AwaitingNameAndDescriptors
//!   -- one recvmsg: name bytes + SCM_RIGHTS [fd_in, fd_out] -->
//! Ready <--> ProcessingFrame      (8-byte frame header / 16-byte status)
//!   -- zero-length frame or EOF -->
//! Closed
//! ```
//!
//! The function name is not resolved here; an unknown name fails the first
//! frame instead.

use std::fs::File;
use std::io::{self, IoSliceMut, Read, Write};
use std::net::Shutdown;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;

use nix::cmsg_space;
use nix::errno::Errno;
use nix::sys::socket::{recvmsg, ControlMessageOwned, MsgFlags};

use super::{CONTROL_HEADER_LEN, FRAME_HEADER_LEN};
use crate::error::ProtocolError;

/// Upper bound on the announced function name length. Checked before the
/// name buffer is allocated.
pub const MAX_NAME_LEN: usize = 64 * 1024;

/// Most descriptors the kernel accepts in one message (`SCM_MAX_FD`). The
/// receive buffer holds this many so surplus descriptors arrive owned and
/// are closed, instead of being cut off by `MSG_CTRUNC`.
const MAX_PASSED_FDS: usize = 253;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    AwaitingHeader,
    AwaitingNameAndDescriptors { version: i64, name_len: usize },
    Ready,
    ProcessingFrame { length: usize },
    Closed,
}

impl ControlState {
    pub fn name(&self) -> &'static str {
        match self {
            ControlState::AwaitingHeader => "AwaitingHeader",
            ControlState::AwaitingNameAndDescriptors { .. } => "AwaitingNameAndDescriptors",
            ControlState::Ready => "Ready",
            ControlState::ProcessingFrame { .. } => "ProcessingFrame",
            ControlState::Closed => "Closed",
        }
    }
}

/// What a connection is bound to after the handshake.
#[derive(Debug)]
pub struct Binding {
    pub version: i64,
    pub function: String,
    /// Shared input file, mapped per frame
    pub input: File,
    /// Shared output file, rewritten per frame
    pub output: File,
}

#[derive(Debug)]
pub struct ControlChannel {
    stream: UnixStream,
    state: ControlState,
}

fn read_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0_u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    i64::from_le_bytes(buf)
}

impl ControlChannel {
    pub fn new(stream: UnixStream) -> Self {
        ControlChannel {
            stream,
            state: ControlState::AwaitingHeader,
        }
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    fn expect(&self, expected: &'static str, ok: bool) -> Result<(), ProtocolError> {
        if ok {
            Ok(())
        } else {
            Err(ProtocolError::State {
                expected,
                found: self.state.name(),
            })
        }
    }

    /// Fill `buf` unless the peer closes first; returns bytes read.
    fn read_full(&mut self, buf: &mut [u8]) -> Result<usize, ProtocolError> {
        let mut got = 0;
        while got < buf.len() {
            match self.stream.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(got)
    }

    /// Read the 16-byte `(version, name_len)` header.
    pub fn read_header(&mut self) -> Result<(i64, usize), ProtocolError> {
        self.expect("AwaitingHeader", self.state == ControlState::AwaitingHeader)?;
        let mut buf = [0_u8; CONTROL_HEADER_LEN];
        let got = self.read_full(&mut buf)?;
        if got != CONTROL_HEADER_LEN {
            return Err(ProtocolError::ShortRead {
                what: "control header",
                expected: CONTROL_HEADER_LEN,
                got,
            });
        }
        let version = read_i64(&buf[..8]);
        let raw_len = read_i64(&buf[8..]);
        let name_len = usize::try_from(raw_len).map_err(|_| ProtocolError::NegativeLength {
            what: "name length",
            value: raw_len,
        })?;
        if name_len > MAX_NAME_LEN {
            return Err(ProtocolError::NameTooLong {
                length: name_len,
                limit: MAX_NAME_LEN,
            });
        }
        self.state = ControlState::AwaitingNameAndDescriptors { version, name_len };
        Ok((version, name_len))
    }

    /// Receive the function name and both data descriptors in one
    /// `recvmsg`.
    ///
    /// Descriptors are owned as soon as they arrive, so any that came with a
    /// malformed message are closed when the error is returned.
    pub fn receive_binding(&mut self) -> Result<Binding, ProtocolError> {
        let ControlState::AwaitingNameAndDescriptors { version, name_len } = self.state else {
            return Err(ProtocolError::State {
                expected: "AwaitingNameAndDescriptors",
                found: self.state.name(),
            });
        };

        let mut name = vec![0_u8; name_len];
        let mut cmsg = cmsg_space!([RawFd; MAX_PASSED_FDS]);
        let (received, raw_fds) = {
            let mut iov = [IoSliceMut::new(&mut name)];
            let msg = recvmsg::<()>(
                self.stream.as_raw_fd(),
                &mut iov,
                Some(&mut cmsg),
                MsgFlags::MSG_CMSG_CLOEXEC,
            )?;
            let cmsgs = msg.cmsgs().map_err(|errno| match errno {
                Errno::ENOBUFS => ProtocolError::ControlTruncated,
                other => ProtocolError::Sys(other),
            })?;
            let mut raw_fds = Vec::new();
            for message in cmsgs {
                if let ControlMessageOwned::ScmRights(fds) = message {
                    raw_fds.extend(fds);
                }
            }
            (msg.bytes, raw_fds)
        };
        // SAFETY: SCM_RIGHTS installs fresh descriptors in this process that
        // nothing else owns.
        let mut fds: Vec<OwnedFd> = raw_fds
            .into_iter()
            .map(|fd| unsafe { OwnedFd::from_raw_fd(fd) })
            .collect();

        if received != name_len {
            return Err(ProtocolError::ShortRead {
                what: "function name",
                expected: name_len,
                got: received,
            });
        }
        if fds.len() != 2 {
            return Err(ProtocolError::DescriptorCount(fds.len()));
        }
        let function = String::from_utf8(name).map_err(|_| ProtocolError::InvalidName)?;
        let output = fds.pop().map(File::from);
        let input = fds.pop().map(File::from);
        let (Some(input), Some(output)) = (input, output) else {
            return Err(ProtocolError::DescriptorCount(0));
        };

        self.state = ControlState::Ready;
        Ok(Binding {
            version,
            function,
            input,
            output,
        })
    }

    /// Header plus binding.
    pub fn handshake(&mut self) -> Result<Binding, ProtocolError> {
        self.read_header()?;
        self.receive_binding()
    }

    /// Next frame length, or `None` when the peer ends the stream (EOF or a
    /// zero length).
    pub fn read_frame_length(&mut self) -> Result<Option<usize>, ProtocolError> {
        self.expect("Ready", self.state == ControlState::Ready)?;
        let mut buf = [0_u8; FRAME_HEADER_LEN];
        let got = self.read_full(&mut buf)?;
        if got == 0 {
            return Ok(None);
        }
        if got != FRAME_HEADER_LEN {
            return Err(ProtocolError::ShortRead {
                what: "frame header",
                expected: FRAME_HEADER_LEN,
                got,
            });
        }
        let raw = i64::from_le_bytes(buf);
        let length = usize::try_from(raw).map_err(|_| ProtocolError::NegativeLength {
            what: "frame length",
            value: raw,
        })?;
        if length == 0 {
            return Ok(None);
        }
        self.state = ControlState::ProcessingFrame { length };
        Ok(Some(length))
    }

    /// Report a frame's outcome as `(status, response_size)`.
    pub fn send_status(&mut self, status: i64, response_size: usize) -> Result<(), ProtocolError> {
        self.expect(
            "ProcessingFrame",
            matches!(self.state, ControlState::ProcessingFrame { .. }),
        )?;
        let mut buf = [0_u8; 16];
        buf[..8].copy_from_slice(&status.to_le_bytes());
        buf[8..].copy_from_slice(&(response_size as i64).to_le_bytes());
        self.stream.write_all(&buf)?;
        self.state = ControlState::Ready;
        Ok(())
    }

    /// Shut the socket down. The descriptor itself closes on drop.
    pub fn close(&mut self) {
        if self.state != ControlState::Closed {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.state = ControlState::Closed;
        }
    }
}
