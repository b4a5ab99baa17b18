// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for shmlink.
//!
//! Construction failures and operational failures travel on separate channels:
//! [`SharedMemoryError`] means the segment could not even start, while
//! [`TransferError`] means a single `write`/`read` did not complete.
//! Teardown failures are never returned; they only show up in the logs.

use std::path::PathBuf;

use thiserror::Error;

use crate::lifecycle::{Mode, SegmentState};
use crate::translate::ErrorCode;

/// Top-level error type for configuration and CLI plumbing.
#[derive(Debug, Error)]
pub enum ShmLinkError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Memory Errors
    // =========================================================================
    #[error("Shared memory error: {0}")]
    SharedMemory(#[from] SharedMemoryError),

    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration field errors. Any of these prevents startup.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Segment size out of bounds: {size} bytes (min: {min}, max: {max})")]
    SizeOutOfBounds { size: usize, min: usize, max: usize },
}

/// Fatal construction failures. The instance is never handed out.
#[derive(Debug, Error)]
pub enum SharedMemoryError {
    #[error("{role}: invalid segment size {size} - {reason}")]
    InvalidSize {
        role: Mode,
        size: usize,
        reason: &'static str,
    },

    #[error("{role}: invalid identifier {identifier} - {reason}")]
    InvalidIdentifier {
        role: Mode,
        identifier: String,
        reason: String,
    },

    /// A platform call needed to acquire the segment or its signal failed.
    #[error("{role}: {operation} failed for {identifier}, {diagnostic}")]
    Acquire {
        role: Mode,
        operation: &'static str,
        identifier: String,
        code: ErrorCode,
        diagnostic: String,
    },
}

impl SharedMemoryError {
    /// The raw OS error code, if a platform call failed.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Acquire { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// The name of the platform operation that failed, if any.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Acquire { operation, .. } => Some(operation),
            _ => None,
        }
    }

    /// True when an exclusive create hit an object that is already live.
    pub fn is_already_exists(&self) -> bool {
        self.code()
            .is_some_and(crate::shm::platform::is_already_exists)
    }

    /// True when an attach found no object under the identifier.
    pub fn is_not_found(&self) -> bool {
        self.code().is_some_and(crate::shm::platform::is_not_found)
    }
}

/// Failures of the data-ready signal.
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("raising the data-ready signal failed: {diagnostic}")]
    Raise { code: ErrorCode, diagnostic: String },

    #[error("waiting on the data-ready signal failed: {diagnostic}")]
    Wait { code: ErrorCode, diagnostic: String },

    #[error("the data-ready signal was abandoned")]
    Abandoned,

    #[error("waiting on the data-ready signal timed out")]
    TimedOut,
}

/// Non-fatal `write`/`read` failures. The caller may retry.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("range {offset}..{offset}+{len} exceeds segment size {size}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("segment is {state}, transfers need Ready")]
    NotReady { state: SegmentState },

    /// For `write` the bytes are already in the segment when this is returned.
    #[error(transparent)]
    Signal(#[from] SignalError),
}

/// Message rendering for an OS error code failed.
#[derive(Debug, Error)]
#[error("could not render a message for error code {code:#04X}: {reason}")]
pub struct TranslationError {
    pub code: ErrorCode,
    pub reason: String,
}

/// State transition errors for the segment lifecycle.
#[derive(Debug, Error)]
pub enum StateTransitionError {
    #[error("{role}: cannot transition from {from} to {to}")]
    InvalidTransition {
        role: Mode,
        from: &'static str,
        to: &'static str,
    },

    #[error("{role}: segment is in terminal state {state}")]
    TerminalState { role: Mode, state: &'static str },
}

/// Result type alias using ShmLinkError.
pub type ShmLinkResult<T> = Result<T, ShmLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_display() {
        let err = TransferError::OutOfBounds {
            offset: 90,
            len: 20,
            size: 100,
        };
        let text = err.to_string();
        assert!(text.contains("90"));
        assert!(text.contains("100"));
    }

    #[test]
    fn test_acquire_error_names_role_and_operation() {
        let err = SharedMemoryError::Acquire {
            role: Mode::Attach,
            operation: "shmget",
            identifier: "/tmp:65".to_string(),
            code: 2,
            diagnostic: "error code: 0x02 message: No such file or directory".to_string(),
        };
        let text = err.to_string();
        assert!(text.starts_with("attacher: shmget failed"));
        assert_eq!(err.code(), Some(2));
        assert_eq!(err.operation(), Some("shmget"));
    }

    #[test]
    fn test_error_chain() {
        let validation_err = ValidationError::SizeOutOfBounds {
            size: 0,
            min: 1,
            max: 10,
        };
        let err: ShmLinkError = validation_err.into();
        assert!(matches!(err, ShmLinkError::Validation(_)));

        let transfer: ShmLinkError = TransferError::Signal(SignalError::Abandoned).into();
        assert!(matches!(transfer, ShmLinkError::Transfer(_)));
    }

    #[test]
    fn test_invalid_size_has_no_code() {
        let err = SharedMemoryError::InvalidSize {
            role: Mode::Create,
            size: 0,
            reason: "size must be non-zero",
        };
        assert_eq!(err.code(), None);
        assert!(!err.is_already_exists());
        assert!(!err.is_not_found());
    }
}
