// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! MappedRegion - bounds-carrying view over mapped shared memory.
//!
//! Every copy into or out of the segment goes through [`MappedRegion::span`].
//! The view does not own the mapping; the platform backend that created it
//! keeps the mapping alive for as long as the view is reachable.

use std::ops::Range;
use std::ptr::NonNull;

use crate::error::TransferError;

/// Caller-visible bytes of a mapped segment.
#[derive(Debug)]
pub(crate) struct MappedRegion {
    /// Base of the mapping.
    ptr: NonNull<u8>,
    /// Number of caller-addressable bytes.
    len: usize,
}

impl MappedRegion {
    /// Wrap `len` bytes starting at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of `len` bytes for the whole
    /// lifetime of the returned view.
    pub(crate) unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self { ptr, len }
    }

    /// Validate `offset + len <= self.len` without overflow.
    pub fn span(&self, offset: usize, len: usize) -> Result<Range<usize>, TransferError> {
        match offset.checked_add(len) {
            Some(end) if end <= self.len => Ok(offset..end),
            _ => Err(TransferError::OutOfBounds {
                offset,
                len,
                size: self.len,
            }),
        }
    }

    /// Copy `data` into the region at `offset`. Nothing is written on error.
    pub fn copy_in(&self, offset: usize, data: &[u8]) -> Result<(), TransferError> {
        let range = self.span(offset, data.len())?;

        // SAFETY: range lies inside the mapping, and `data` is ordinary process
        // memory so it cannot overlap the shared segment.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(range.start),
                range.len(),
            );
        }

        Ok(())
    }

    /// Copy bytes at `offset` out into `buf`. `buf` is untouched on error.
    pub fn copy_out(&self, offset: usize, buf: &mut [u8]) -> Result<(), TransferError> {
        let range = self.span(offset, buf.len())?;

        // SAFETY: see copy_in.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(range.start),
                buf.as_mut_ptr(),
                range.len(),
            );
        }

        Ok(())
    }
}
