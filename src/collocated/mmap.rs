//! Scoped shared-memory mapping of a frame's input file.

use std::ffi::c_void;
use std::fs::File;
use std::num::NonZeroUsize;
use std::ptr::NonNull;
use std::slice;

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};

use crate::error::ProtocolError;

/// Read-only `MAP_SHARED` view of the first `len` bytes of a file.
///
/// Unmapped on drop, so a frame's mapping never outlives the frame whatever
/// path processing takes.
#[derive(Debug)]
pub struct MappedSegment {
    ptr: Option<NonNull<c_void>>,
    len: usize,
}

impl MappedSegment {
    pub fn map(file: &File, length: usize) -> Result<Self, ProtocolError> {
        let file_size = file.metadata()?.len();
        if length as u64 > file_size {
            return Err(ProtocolError::FrameTooLarge { length, file_size });
        }
        let Some(len) = NonZeroUsize::new(length) else {
            return Ok(MappedSegment { ptr: None, len: 0 });
        };
        // SAFETY: a fresh read-only mapping at a kernel-chosen address; the
        // file is at least `length` bytes long and the mapping is released
        // only in `Drop`.
        let ptr = unsafe {
            mmap(
                None,
                len,
                ProtFlags::PROT_READ,
                MapFlags::MAP_SHARED,
                file,
                0,
            )
        }?;
        Ok(MappedSegment {
            ptr: Some(ptr),
            len: length,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        match self.ptr {
            // SAFETY: `ptr` maps `len` readable bytes for as long as `self`
            // lives; the returned slice borrows `self`.
            Some(ptr) => unsafe { slice::from_raw_parts(ptr.as_ptr().cast::<u8>(), self.len) },
            None => &[],
        }
    }
}

impl Drop for MappedSegment {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: `ptr`/`len` come from the successful `mmap` above and
            // no slice into the mapping can outlive `self`.
            if let Err(errno) = unsafe { munmap(ptr, self.len) } {
                tracing::warn!(error = %errno, len = self.len, "munmap_failed");
            }
        }
    }
}
