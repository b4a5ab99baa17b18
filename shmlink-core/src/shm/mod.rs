// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared Memory IPC module.
//!
//! One fixed-size segment shared by a creator and an attacher, gated by a
//! capacity-1 data-ready signal.

pub(crate) mod platform;
mod region;
mod segment;

pub use segment::{SharedMemory, DEFAULT_SEGMENT_SIZE};
