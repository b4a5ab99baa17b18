// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmlink send` command - Attacher side of the demo.

use shmlink_core::{Config, SharedMemory, ShmLinkResult};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

pub fn execute(config: &Config) -> ShmLinkResult<()> {
    println!("Shared memory client started.");

    let segment = &config.segment;
    let mut memory = SharedMemory::attach(segment.identifier(), segment.size)?;

    let payload = alphabet_payload(memory.size());
    println!("Client about to write: {}", String::from_utf8_lossy(&payload));

    memory.write(0, &payload)?;
    tracing::debug!(bytes = payload.len(), "Wrote payload and raised data-ready");

    Ok(())
}

/// `len` bytes of the lowercase alphabet, repeated.
pub fn alphabet_payload(len: usize) -> Vec<u8> {
    ALPHABET.iter().copied().cycle().take(len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphabet_payload_wraps() {
        let payload = alphabet_payload(100);
        assert_eq!(payload.len(), 100);
        assert_eq!(&payload[..26], ALPHABET);
        assert_eq!(&payload[26..30], b"abcd");
        assert_eq!(payload[99], b'v');
    }
}
