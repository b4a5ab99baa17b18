// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Named file mapping backend with a named semaphore (maximum count 1).
//!
//! The mapping is pagefile-backed and lives as long as any process holds a
//! handle to it, so "removal" for the creator is closing its handle.

use std::ptr::NonNull;

use windows_sys::Win32::Foundation::{
    CloseHandle, ERROR_ALREADY_EXISTS, ERROR_FILE_NOT_FOUND, ERROR_TOO_MANY_POSTS, HANDLE,
    INVALID_HANDLE_VALUE, WAIT_ABANDONED, WAIT_FAILED, WAIT_OBJECT_0, WAIT_TIMEOUT,
};
use windows_sys::Win32::System::Memory::{
    CreateFileMappingW, MapViewOfFile, OpenFileMappingW, UnmapViewOfFile, FILE_MAP_ALL_ACCESS,
    MEMORY_MAPPED_VIEW_ADDRESS, PAGE_READWRITE,
};
use windows_sys::Win32::System::Threading::{
    CreateSemaphoreW, OpenSemaphoreW, ReleaseSemaphore, WaitForSingleObject, INFINITE,
    SEMAPHORE_ALL_ACCESS,
};

use super::{last_error, ReadySignal, SegmentBackend};
use crate::error::{SharedMemoryError, SignalError};
use crate::identifier::Identifier;
use crate::lifecycle::Mode;
use crate::shm::region::MappedRegion;
use crate::translate::{describe, ErrorCode};

/// Suffix that turns a segment name into its semaphore name.
const SIGNAL_SUFFIX: &str = ".ready";

pub(crate) fn is_already_exists(code: ErrorCode) -> bool {
    code == ERROR_ALREADY_EXISTS
}

pub(crate) fn is_not_found(code: ErrorCode) -> bool {
    code == ERROR_FILE_NOT_FOUND
}

fn error_with_code(
    role: Mode,
    operation: &'static str,
    identifier: &Identifier,
    code: ErrorCode,
) -> SharedMemoryError {
    SharedMemoryError::Acquire {
        role,
        operation,
        identifier: identifier.to_string(),
        code,
        diagnostic: describe(code),
    }
}

fn acquire_error(role: Mode, operation: &'static str, identifier: &Identifier) -> SharedMemoryError {
    let code = last_error();
    error_with_code(role, operation, identifier, code)
}

/// NUL-terminated UTF-16 object name.
fn wide_name(
    name: &str,
    role: Mode,
    identifier: &Identifier,
) -> Result<Vec<u16>, SharedMemoryError> {
    if name.contains('\0') {
        return Err(SharedMemoryError::InvalidIdentifier {
            role,
            identifier: identifier.to_string(),
            reason: "name contains a NUL character".to_string(),
        });
    }
    Ok(name.encode_utf16().chain(std::iter::once(0)).collect())
}

fn log_teardown_failure(role: Mode, operation: &'static str, code: ErrorCode) {
    tracing::error!(
        role = role.role(),
        operation,
        error = %describe(code),
        "Segment teardown step failed"
    );
}

/// A kernel handle closed on drop.
struct OwnedHandle {
    handle: HANDLE,
    role: Mode,
    operation: &'static str,
}

impl Drop for OwnedHandle {
    fn drop(&mut self) {
        // SAFETY: handle came from a successful Create*/Open* call
        if unsafe { CloseHandle(self.handle) } == 0 {
            log_teardown_failure(self.role, self.operation, last_error());
        }
    }
}

/// A mapped view, unmapped on drop.
struct View {
    base: NonNull<u8>,
    role: Mode,
}

impl Drop for View {
    fn drop(&mut self) {
        let address = MEMORY_MAPPED_VIEW_ADDRESS {
            Value: self.base.as_ptr().cast(),
        };
        // SAFETY: base came from a successful MapViewOfFile
        if unsafe { UnmapViewOfFile(address) } == 0 {
            log_teardown_failure(self.role, "UnmapViewOfFile", last_error());
        }
    }
}

/// Named semaphore with a maximum count of one.
pub(crate) struct NamedSemaphore {
    handle: OwnedHandle,
}

impl ReadySignal for NamedSemaphore {
    fn raise(&self) -> Result<(), SignalError> {
        // SAFETY: handle is a live semaphore handle
        if unsafe { ReleaseSemaphore(self.handle.handle, 1, std::ptr::null_mut()) } != 0 {
            return Ok(());
        }

        let code = last_error();
        if code == ERROR_TOO_MANY_POSTS {
            tracing::debug!(
                role = self.handle.role.role(),
                "Data-ready signal already raised"
            );
            return Ok(());
        }

        Err(SignalError::Raise {
            code,
            diagnostic: describe(code),
        })
    }

    fn wait(&self) -> Result<(), SignalError> {
        // SAFETY: handle is a live semaphore handle
        let status = unsafe { WaitForSingleObject(self.handle.handle, INFINITE) };
        match status {
            WAIT_OBJECT_0 => Ok(()),
            WAIT_ABANDONED => Err(SignalError::Abandoned),
            WAIT_TIMEOUT => Err(SignalError::TimedOut),
            WAIT_FAILED => {
                let code = last_error();
                Err(SignalError::Wait {
                    code,
                    diagnostic: describe(code),
                })
            }
            other => Err(SignalError::Wait {
                code: other,
                diagnostic: format!("unexpected wait status {:#04X}", other),
            }),
        }
    }
}

/// A named file mapping mapped into this process.
pub(crate) struct WindowsSegment {
    // Drop order: semaphore handle, view, mapping handle.
    signal: NamedSemaphore,
    #[allow(dead_code)] // held for Drop
    view: View,
    #[allow(dead_code)] // held for Drop
    mapping: OwnedHandle,
    region: MappedRegion,
}

// SAFETY: kernel handles and the mapped view are process-wide and may be
// used and released from any thread.
unsafe impl Send for WindowsSegment {}

impl WindowsSegment {
    fn map(
        mapping: &OwnedHandle,
        identifier: &Identifier,
        byte_count: usize,
    ) -> Result<View, SharedMemoryError> {
        // SAFETY: mapping is a live file mapping handle
        let address =
            unsafe { MapViewOfFile(mapping.handle, FILE_MAP_ALL_ACCESS, 0, 0, byte_count) };
        match NonNull::new(address.Value.cast::<u8>()) {
            Some(base) => Ok(View {
                base,
                role: mapping.role,
            }),
            None => Err(acquire_error(mapping.role, "MapViewOfFile", identifier)),
        }
    }

    fn finish(signal: NamedSemaphore, view: View, mapping: OwnedHandle, byte_count: usize) -> Self {
        // SAFETY: the view maps byte_count bytes and is dropped with the region
        let region = unsafe { MappedRegion::new(view.base, byte_count) };
        Self {
            signal,
            view,
            mapping,
            region,
        }
    }
}

impl SegmentBackend for WindowsSegment {
    type Signal = NamedSemaphore;

    fn create(identifier: &Identifier, byte_count: usize) -> Result<Self, SharedMemoryError> {
        let role = Mode::Create;
        let name = wide_name(identifier.name(), role, identifier)?;
        let signal_name = wide_name(
            &format!("{}{}", identifier.name(), SIGNAL_SUFFIX),
            role,
            identifier,
        )?;
        let size = byte_count as u64;

        // SAFETY: name is NUL-terminated; INVALID_HANDLE_VALUE selects the pagefile
        let handle = unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                std::ptr::null(),
                PAGE_READWRITE,
                (size >> 32) as u32,
                size as u32,
                name.as_ptr(),
            )
        };
        if handle.is_null() {
            return Err(acquire_error(role, "CreateFileMappingW", identifier));
        }
        let existed = last_error() == ERROR_ALREADY_EXISTS;

        // From here on an early return drops the guards acquired so far.
        let mapping = OwnedHandle {
            handle,
            role,
            operation: "CloseHandle(file mapping)",
        };
        if existed {
            return Err(error_with_code(
                role,
                "CreateFileMappingW",
                identifier,
                ERROR_ALREADY_EXISTS,
            ));
        }

        let view = Self::map(&mapping, identifier, byte_count)?;

        // SAFETY: signal_name is NUL-terminated
        let handle = unsafe { CreateSemaphoreW(std::ptr::null(), 0, 1, signal_name.as_ptr()) };
        if handle.is_null() {
            return Err(acquire_error(role, "CreateSemaphoreW", identifier));
        }
        let existed = last_error() == ERROR_ALREADY_EXISTS;
        let signal = NamedSemaphore {
            handle: OwnedHandle {
                handle,
                role,
                operation: "CloseHandle(semaphore)",
            },
        };
        if existed {
            return Err(error_with_code(
                role,
                "CreateSemaphoreW",
                identifier,
                ERROR_ALREADY_EXISTS,
            ));
        }

        tracing::debug!(
            identifier = %identifier,
            size = byte_count,
            "Created shared memory segment"
        );

        Ok(Self::finish(signal, view, mapping, byte_count))
    }

    fn attach(identifier: &Identifier, byte_count: usize) -> Result<Self, SharedMemoryError> {
        let role = Mode::Attach;
        let name = wide_name(identifier.name(), role, identifier)?;
        let signal_name = wide_name(
            &format!("{}{}", identifier.name(), SIGNAL_SUFFIX),
            role,
            identifier,
        )?;

        // SAFETY: name is NUL-terminated
        let handle = unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, name.as_ptr()) };
        if handle.is_null() {
            return Err(acquire_error(role, "OpenFileMappingW", identifier));
        }
        let mapping = OwnedHandle {
            handle,
            role,
            operation: "CloseHandle(file mapping)",
        };

        let view = Self::map(&mapping, identifier, byte_count)?;

        // SAFETY: signal_name is NUL-terminated
        let handle = unsafe { OpenSemaphoreW(SEMAPHORE_ALL_ACCESS, 0, signal_name.as_ptr()) };
        if handle.is_null() {
            return Err(acquire_error(role, "OpenSemaphoreW", identifier));
        }
        let signal = NamedSemaphore {
            handle: OwnedHandle {
                handle,
                role,
                operation: "CloseHandle(semaphore)",
            },
        };

        tracing::debug!(
            identifier = %identifier,
            size = byte_count,
            "Attached to shared memory segment"
        );

        Ok(Self::finish(signal, view, mapping, byte_count))
    }

    fn region(&self) -> &MappedRegion {
        &self.region
    }

    fn signal(&self) -> &NamedSemaphore {
        &self.signal
    }
}
