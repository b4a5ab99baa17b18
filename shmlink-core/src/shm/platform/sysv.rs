// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! System V shared memory backend with an embedded process-shared `sem_t`.
//!
//! Backing layout (`signal_offset` is the byte count rounded up to the
//! alignment of `sem_t`):
//!
//! ```text
//! 0                byte_count   signal_offset          backing_size
//! ├── caller bytes ──┤── pad ──┤──── sem_t ────┤
//! ```

use std::ffi::CString;
use std::mem::{align_of, size_of};
use std::os::unix::ffi::OsStrExt;
use std::ptr::NonNull;

use nix::errno::Errno;

use super::{last_error, ReadySignal, SegmentBackend};
use crate::error::{SharedMemoryError, SignalError};
use crate::identifier::Identifier;
use crate::lifecycle::Mode;
use crate::shm::region::MappedRegion;
use crate::translate::{describe, ErrorCode};

/// Permission bits for new segments (read/write for everyone).
const SEGMENT_PERMISSIONS: libc::c_int = 0o666;

pub(crate) fn is_already_exists(code: ErrorCode) -> bool {
    code == libc::EEXIST
}

pub(crate) fn is_not_found(code: ErrorCode) -> bool {
    code == libc::ENOENT
}

/// Where the embedded signal sits and how big the OS object must be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub signal_offset: usize,
    pub backing_size: usize,
}

impl Layout {
    pub(crate) fn for_byte_count(byte_count: usize) -> Option<Self> {
        let signal_offset = byte_count.checked_next_multiple_of(align_of::<libc::sem_t>())?;
        let backing_size = signal_offset.checked_add(size_of::<libc::sem_t>())?;
        Some(Self {
            signal_offset,
            backing_size,
        })
    }
}

fn acquire_error(role: Mode, operation: &'static str, identifier: &Identifier) -> SharedMemoryError {
    let code = last_error();
    SharedMemoryError::Acquire {
        role,
        operation,
        identifier: identifier.to_string(),
        code,
        diagnostic: describe(code),
    }
}

fn derive_key(identifier: &Identifier, role: Mode) -> Result<libc::key_t, SharedMemoryError> {
    let path = CString::new(identifier.path().as_os_str().as_bytes()).map_err(|e| {
        SharedMemoryError::InvalidIdentifier {
            role,
            identifier: identifier.to_string(),
            reason: format!("path is not a valid C string: {}", e),
        }
    })?;

    // SAFETY: path is a valid NUL-terminated C string
    let key = unsafe { libc::ftok(path.as_ptr(), identifier.project_id()) };
    if key == -1 {
        return Err(acquire_error(role, "ftok", identifier));
    }

    Ok(key)
}

fn log_teardown_failure(role: Mode, operation: &'static str, code: ErrorCode) {
    tracing::error!(
        role = role.role(),
        operation,
        error = %describe(code),
        "Segment teardown step failed"
    );
}

/// Segment id from `shmget`. The creator marks it for removal on drop.
struct SegmentId {
    id: libc::c_int,
    role: Mode,
}

impl SegmentId {
    /// Size the segment was created with, from `IPC_STAT`.
    fn backing_size(&self, identifier: &Identifier) -> Result<usize, SharedMemoryError> {
        // SAFETY: shmid_ds is plain data and fully written by a successful IPC_STAT
        let mut ds: libc::shmid_ds = unsafe { std::mem::zeroed() };
        // SAFETY: id came from a successful shmget; ds is a valid out pointer
        if unsafe { libc::shmctl(self.id, libc::IPC_STAT, &mut ds) } == -1 {
            return Err(acquire_error(self.role, "shmctl(IPC_STAT)", identifier));
        }
        Ok(ds.shm_segsz as usize)
    }
}

impl Drop for SegmentId {
    fn drop(&mut self) {
        if !self.role.is_creator() {
            return;
        }

        // SAFETY: id came from a successful shmget
        let status = unsafe { libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut()) };
        if status == -1 {
            log_teardown_failure(self.role, "shmctl(IPC_RMID)", last_error());
        } else {
            tracing::debug!(role = self.role.role(), id = self.id, "Removed shared memory segment");
        }
    }
}

/// Address returned by `shmat`. Detached on drop.
struct Attachment {
    addr: NonNull<u8>,
    role: Mode,
}

impl Attachment {
    fn attach(segment: &SegmentId, identifier: &Identifier) -> Result<Self, SharedMemoryError> {
        // SAFETY: a null address lets the kernel pick the placement
        let addr = unsafe { libc::shmat(segment.id, std::ptr::null(), 0) };
        if addr == usize::MAX as *mut libc::c_void {
            return Err(acquire_error(segment.role, "shmat", identifier));
        }

        match NonNull::new(addr.cast::<u8>()) {
            Some(addr) => Ok(Self {
                addr,
                role: segment.role,
            }),
            None => Err(SharedMemoryError::Acquire {
                role: segment.role,
                operation: "shmat",
                identifier: identifier.to_string(),
                code: libc::EFAULT,
                diagnostic: describe(libc::EFAULT),
            }),
        }
    }

    /// Pointer to the embedded signal.
    fn signal_at(&self, layout: Layout) -> NonNull<libc::sem_t> {
        // SAFETY: signal_offset + size_of::<sem_t>() == backing_size, which is
        // the size the segment was created or looked up with.
        unsafe {
            NonNull::new_unchecked(
                self.addr
                    .as_ptr()
                    .add(layout.signal_offset)
                    .cast::<libc::sem_t>(),
            )
        }
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        // SAFETY: addr came from a successful shmat and is detached only here
        let status = unsafe { libc::shmdt(self.addr.as_ptr().cast::<libc::c_void>()) };
        if status == -1 {
            log_teardown_failure(self.role, "shmdt", last_error());
        }
    }
}

/// Process-shared `sem_t` living in the segment tail.
pub(crate) struct EmbeddedSemaphore {
    sem: NonNull<libc::sem_t>,
    role: Mode,
}

impl EmbeddedSemaphore {
    /// Initialize a fresh, unset semaphore. Creator only.
    fn init(sem: NonNull<libc::sem_t>, identifier: &Identifier) -> Result<Self, SharedMemoryError> {
        // SAFETY: sem points into our mapping; pshared = 1 because the memory
        // is shared between processes.
        let status = unsafe { libc::sem_init(sem.as_ptr(), 1, 0) };
        if status == -1 {
            return Err(acquire_error(Mode::Create, "sem_init", identifier));
        }

        Ok(Self {
            sem,
            role: Mode::Create,
        })
    }

    /// Refer to the creator's semaphore without initializing it.
    fn lookup(sem: NonNull<libc::sem_t>) -> Self {
        Self {
            sem,
            role: Mode::Attach,
        }
    }

    fn is_raised(&self) -> bool {
        let mut value: libc::c_int = 0;
        // SAFETY: sem is initialized by the creator
        let status = unsafe { libc::sem_getvalue(self.sem.as_ptr(), &mut value) };
        status == 0 && value > 0
    }
}

impl ReadySignal for EmbeddedSemaphore {
    fn raise(&self) -> Result<(), SignalError> {
        if self.is_raised() {
            tracing::debug!(role = self.role.role(), "Data-ready signal already raised");
            return Ok(());
        }

        // SAFETY: sem is initialized by the creator
        if unsafe { libc::sem_post(self.sem.as_ptr()) } == -1 {
            let code = last_error();
            return Err(SignalError::Raise {
                code,
                diagnostic: describe(code),
            });
        }

        Ok(())
    }

    fn wait(&self) -> Result<(), SignalError> {
        loop {
            // SAFETY: sem is initialized by the creator
            if unsafe { libc::sem_wait(self.sem.as_ptr()) } == 0 {
                return Ok(());
            }

            let errno = Errno::last();
            if errno == Errno::EINTR {
                continue;
            }

            let code = errno as ErrorCode;
            return Err(SignalError::Wait {
                code,
                diagnostic: describe(code),
            });
        }
    }
}

impl Drop for EmbeddedSemaphore {
    fn drop(&mut self) {
        if !self.role.is_creator() {
            return;
        }

        // SAFETY: initialized in init() and destroyed only here
        if unsafe { libc::sem_destroy(self.sem.as_ptr()) } == -1 {
            log_teardown_failure(self.role, "sem_destroy", last_error());
        }
    }
}

/// A System V segment mapped into this process.
pub(crate) struct SysvSegment {
    // Drop order: signal, mapping, segment id.
    signal: EmbeddedSemaphore,
    #[allow(dead_code)] // held for Drop
    attachment: Attachment,
    #[allow(dead_code)] // held for Drop
    segment: SegmentId,
    region: MappedRegion,
}

// SAFETY: the raw pointers refer to a process-wide mapping that stays valid
// until this value is dropped, regardless of which thread drops it.
unsafe impl Send for SysvSegment {}

impl SysvSegment {
    fn layout(role: Mode, byte_count: usize) -> Result<Layout, SharedMemoryError> {
        Layout::for_byte_count(byte_count).ok_or(SharedMemoryError::InvalidSize {
            role,
            size: byte_count,
            reason: "backing size overflows usize",
        })
    }

    fn finish(
        signal: EmbeddedSemaphore,
        attachment: Attachment,
        segment: SegmentId,
        byte_count: usize,
    ) -> Self {
        // SAFETY: the attachment maps at least byte_count bytes and outlives
        // the region because both are dropped together.
        let region = unsafe { MappedRegion::new(attachment.addr, byte_count) };
        Self {
            signal,
            attachment,
            segment,
            region,
        }
    }
}

impl SegmentBackend for SysvSegment {
    type Signal = EmbeddedSemaphore;

    fn create(identifier: &Identifier, byte_count: usize) -> Result<Self, SharedMemoryError> {
        let role = Mode::Create;
        let layout = Self::layout(role, byte_count)?;
        let key = derive_key(identifier, role)?;

        // SAFETY: plain syscall
        let id = unsafe {
            libc::shmget(
                key,
                layout.backing_size,
                libc::IPC_CREAT | libc::IPC_EXCL | SEGMENT_PERMISSIONS,
            )
        };
        if id == -1 {
            return Err(acquire_error(role, "shmget", identifier));
        }

        // From here on an early return drops the guards acquired so far.
        let segment = SegmentId { id, role };
        let attachment = Attachment::attach(&segment, identifier)?;
        let signal = EmbeddedSemaphore::init(attachment.signal_at(layout), identifier)?;

        tracing::debug!(
            identifier = %identifier,
            id,
            size = byte_count,
            backing_size = layout.backing_size,
            "Created shared memory segment"
        );

        Ok(Self::finish(signal, attachment, segment, byte_count))
    }

    fn attach(identifier: &Identifier, byte_count: usize) -> Result<Self, SharedMemoryError> {
        let role = Mode::Attach;
        let layout = Self::layout(role, byte_count)?;
        let key = derive_key(identifier, role)?;

        // SAFETY: plain syscall
        let id = unsafe { libc::shmget(key, layout.backing_size, SEGMENT_PERMISSIONS) };
        if id == -1 {
            return Err(acquire_error(role, "shmget", identifier));
        }

        let segment = SegmentId { id, role };

        // shmget accepts any size up to the real one; a smaller byte count
        // would put the signal inside the creator's caller bytes.
        let actual = segment.backing_size(identifier)?;
        if actual != layout.backing_size {
            tracing::debug!(
                identifier = %identifier,
                expected = layout.backing_size,
                actual,
                "Segment size does not match"
            );
            return Err(SharedMemoryError::InvalidSize {
                role,
                size: byte_count,
                reason: "size does not match the existing segment",
            });
        }

        let attachment = Attachment::attach(&segment, identifier)?;
        let signal = EmbeddedSemaphore::lookup(attachment.signal_at(layout));

        tracing::debug!(
            identifier = %identifier,
            id,
            size = byte_count,
            "Attached to shared memory segment"
        );

        Ok(Self::finish(signal, attachment, segment, byte_count))
    }

    fn region(&self) -> &MappedRegion {
        &self.region
    }

    fn signal(&self) -> &EmbeddedSemaphore {
        &self.signal
    }
}
