// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! SharedMemory - one fixed-size segment shared by a creator and an attacher.
//!
//! The writer copies bytes in and raises the data-ready signal; the reader
//! blocks on the signal and copies bytes out. Bounds checks and the lifecycle
//! live here. Everything OS-specific sits behind `SegmentBackend`.

use crate::error::{SharedMemoryError, TransferError};
use crate::identifier::Identifier;
use crate::lifecycle::{Mode, SegmentLifecycle, SegmentState};
use crate::shm::platform::{NativeSegment, ReadySignal, SegmentBackend};

/// Byte count both demo processes agree on when nothing else is configured.
pub const DEFAULT_SEGMENT_SIZE: usize = 100;

/// A mapped shared memory segment plus its data-ready signal.
///
/// Dropping a `SharedMemory` releases the signal, unmaps the segment, and, for
/// the creator, removes the segment and the signal. Teardown failures are
/// logged and never returned.
pub struct SharedMemory {
    identifier: Identifier,
    byte_count: usize,
    lifecycle: SegmentLifecycle,
    backend: Option<NativeSegment>,
}

impl SharedMemory {
    /// Create or attach to the segment named by `identifier`.
    ///
    /// # Errors
    /// Returns SharedMemoryError if any platform step fails. Resources acquired
    /// before the failing step are released before returning.
    pub fn new(
        mode: Mode,
        identifier: Identifier,
        byte_count: usize,
    ) -> Result<Self, SharedMemoryError> {
        let mut lifecycle = SegmentLifecycle::new(mode);
        advance(&mut lifecycle, SegmentState::Constructing);

        if byte_count == 0 {
            advance(&mut lifecycle, SegmentState::Destroyed);
            return Err(SharedMemoryError::InvalidSize {
                role: mode,
                size: byte_count,
                reason: "size must be non-zero",
            });
        }

        let backend = match mode {
            Mode::Create => NativeSegment::create(&identifier, byte_count),
            Mode::Attach => NativeSegment::attach(&identifier, byte_count),
        };

        let backend = match backend {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(
                    role = mode.role(),
                    identifier = %identifier,
                    error = %e,
                    "Shared memory construction failed"
                );
                advance(&mut lifecycle, SegmentState::Destroyed);
                return Err(e);
            }
        };

        advance(&mut lifecycle, SegmentState::Ready);

        Ok(Self {
            identifier,
            byte_count,
            lifecycle,
            backend: Some(backend),
        })
    }

    /// Exclusively create the segment. Fails if it already exists.
    pub fn create(identifier: Identifier, byte_count: usize) -> Result<Self, SharedMemoryError> {
        Self::new(Mode::Create, identifier, byte_count)
    }

    /// Attach to a segment a creator has already set up.
    pub fn attach(identifier: Identifier, byte_count: usize) -> Result<Self, SharedMemoryError> {
        Self::new(Mode::Attach, identifier, byte_count)
    }

    /// Caller-visible size in bytes.
    pub fn size(&self) -> usize {
        self.byte_count
    }

    pub fn mode(&self) -> Mode {
        self.lifecycle.mode()
    }

    pub fn identifier(&self) -> &Identifier {
        &self.identifier
    }

    pub fn state(&self) -> SegmentState {
        self.lifecycle.state()
    }

    fn ready_backend(&self) -> Result<&NativeSegment, TransferError> {
        match &self.backend {
            Some(backend) if self.lifecycle.is_ready() => Ok(backend),
            _ => Err(TransferError::NotReady {
                state: self.lifecycle.state(),
            }),
        }
    }

    /// Copy `data` into the segment at `offset`, then raise the data-ready signal.
    ///
    /// Nothing is written if `offset + data.len()` exceeds [`size`](Self::size).
    /// If raising the signal fails the bytes are already in the segment, but
    /// the reader may never be woken; the call still reports the failure.
    pub fn write(&mut self, offset: usize, data: &[u8]) -> Result<(), TransferError> {
        let role = self.mode();
        let backend = self.ready_backend()?;

        backend.region().copy_in(offset, data)?;

        backend.signal().raise().map_err(|e| {
            tracing::warn!(role = role.role(), error = %e, "Wrote bytes but could not raise signal");
            TransferError::from(e)
        })
    }

    /// Block until data is ready, then copy `buf.len()` bytes at `offset` into `buf`.
    ///
    /// The range is checked before waiting. There is no timeout; only a
    /// `write` from the peer wakes this call.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), TransferError> {
        let backend = self.ready_backend()?;
        let region = backend.region();

        region.span(offset, buf.len())?;

        backend.signal().wait().map_err(|e| {
            tracing::warn!(role = self.mode().role(), error = %e, "Waiting for data failed");
            TransferError::from(e)
        })?;

        region.copy_out(offset, buf)
    }
}

impl Drop for SharedMemory {
    fn drop(&mut self) {
        advance(&mut self.lifecycle, SegmentState::Destroying);

        // Guards inside the backend release in order: signal, mapping, object
        drop(self.backend.take());

        advance(&mut self.lifecycle, SegmentState::Destroyed);

        tracing::debug!(
            role = self.mode().role(),
            identifier = %self.identifier,
            "Released shared memory segment"
        );
    }
}

impl std::fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedMemory")
            .field("identifier", &self.identifier)
            .field("mode", &self.mode())
            .field("byte_count", &self.byte_count)
            .field("state", &self.state())
            .finish()
    }
}

/// Transitions driven from here always follow the lifecycle graph.
fn advance(lifecycle: &mut SegmentLifecycle, target: SegmentState) {
    if let Err(e) = lifecycle.transition_to(target) {
        tracing::error!(error = %e, "Unexpected segment state transition");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn unused_identifier() -> Identifier {
        Identifier::new("/definitely/not/a/real/shmlink/path", 1)
    }

    #[cfg(windows)]
    fn unused_identifier() -> Identifier {
        Identifier::new("shmlink-unit-test-never-created")
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = SharedMemory::create(unused_identifier(), 0).unwrap_err();
        assert!(matches!(err, SharedMemoryError::InvalidSize { size: 0, .. }));
    }

    #[test]
    fn test_attach_without_creator_fails() {
        let err = SharedMemory::attach(unused_identifier(), DEFAULT_SEGMENT_SIZE).unwrap_err();
        assert!(matches!(err, SharedMemoryError::Acquire { role: Mode::Attach, .. }));
        assert!(err.is_not_found());
    }
}
