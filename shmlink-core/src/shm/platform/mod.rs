// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Platform segment backends.
//!
//! Each backend allocates-or-locates the OS shared memory object, maps it, and
//! allocates-or-locates the data-ready signal. Exactly one backend is compiled
//! per target and exported as [`NativeSegment`]:
//!
//! ```text
//! Unix:     ftok → shmget → shmat → sem_init (sem_t embedded at the tail)
//! Windows:  CreateFileMappingW → MapViewOfFile → CreateSemaphoreW (max 1)
//! ```
//!
//! Backends hold one guard per acquired resource. Guards are declared so that
//! dropping a backend releases the signal, then unmaps, then (creator only)
//! removes the backing object. The same guards unwind a half-built backend.

use crate::error::{SharedMemoryError, SignalError};
use crate::identifier::Identifier;
use crate::shm::region::MappedRegion;
use crate::translate::ErrorCode;

#[cfg(unix)]
mod sysv;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub(crate) use sysv::{is_already_exists, is_not_found, SysvSegment as NativeSegment};
#[cfg(windows)]
pub(crate) use windows::{is_already_exists, is_not_found, WindowsSegment as NativeSegment};

/// Capacity-1 "data ready" primitive.
///
/// Raising an already raised signal coalesces into the pending wakeup.
pub(crate) trait ReadySignal {
    /// Set the signal to "data ready".
    fn raise(&self) -> Result<(), SignalError>;

    /// Block until the signal is raised, then consume it.
    fn wait(&self) -> Result<(), SignalError>;
}

/// One OS shared memory object plus its signal, mapped into this process.
pub(crate) trait SegmentBackend: Sized + Send {
    type Signal: ReadySignal;

    /// Exclusively allocate, map, and initialize a fresh unset signal.
    fn create(identifier: &Identifier, byte_count: usize) -> Result<Self, SharedMemoryError>;

    /// Locate, map, and look up the creator's signal.
    fn attach(identifier: &Identifier, byte_count: usize) -> Result<Self, SharedMemoryError>;

    /// The caller-visible bytes.
    fn region(&self) -> &MappedRegion;

    fn signal(&self) -> &Self::Signal;
}

/// Most recent OS error code for the calling thread.
pub(crate) fn last_error() -> ErrorCode {
    #[cfg(unix)]
    {
        nix::errno::Errno::last_raw()
    }
    #[cfg(windows)]
    {
        // SAFETY: plain thread-local read
        unsafe { ::windows_sys::Win32::Foundation::GetLastError() }
    }
}
