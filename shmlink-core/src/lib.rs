// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! shmlink Core Library
//!
//! A single fixed-size shared memory segment shared by exactly two processes,
//! a creator and an attacher, with a data-ready handshake between them.
//! Provides identifier resolution, the segment lifecycle, error translation,
//! and configuration parsing.

pub mod config;
pub mod error;
pub mod identifier;
pub mod lifecycle;
pub mod shm;
pub mod translate;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, SegmentConfig};
pub use error::{
    SharedMemoryError, ShmLinkError, ShmLinkResult, SignalError, TransferError, ValidationError,
};
pub use identifier::Identifier;
pub use lifecycle::{Mode, SegmentState};
pub use shm::{SharedMemory, DEFAULT_SEGMENT_SIZE};
