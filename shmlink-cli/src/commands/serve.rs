// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `shmlink serve` command - Creator side of the demo.
//!
//! Creates the segment, blocks until the attacher writes, then prints the
//! received bytes with every even-indexed letter uppercased, reversed.

use shmlink_core::{Config, SharedMemory, ShmLinkResult};

pub fn execute(config: &Config) -> ShmLinkResult<()> {
    println!("Shared memory server started");

    let segment = &config.segment;
    let memory = SharedMemory::create(segment.identifier(), segment.size)?;
    tracing::info!(
        identifier = %memory.identifier(),
        size = memory.size(),
        "Waiting for the client to write"
    );

    let mut buffer = vec![0u8; memory.size()];
    memory.read(0, &mut buffer)?;

    let result = shout_and_reverse(&buffer);
    println!("Server got result: {}", String::from_utf8_lossy(&result));

    Ok(())
}

/// Uppercase even-indexed ASCII letters, then reverse the whole buffer.
pub fn shout_and_reverse(input: &[u8]) -> Vec<u8> {
    input
        .iter()
        .enumerate()
        .map(|(i, b)| if i % 2 == 0 { b.to_ascii_uppercase() } else { *b })
        .rev()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shout_and_reverse_small() {
        assert_eq!(shout_and_reverse(b"abcde"), b"EdCbA".to_vec());
        assert_eq!(shout_and_reverse(b""), Vec::<u8>::new());
    }

    #[test]
    fn test_shout_and_reverse_matches_two_pass_reference() {
        let input = crate::commands::send::alphabet_payload(100);

        let mut reference = input.clone();
        for (i, b) in reference.iter_mut().enumerate() {
            if i % 2 == 0 {
                b.make_ascii_uppercase();
            }
        }
        reference.reverse();

        assert_eq!(shout_and_reverse(&input), reference);
    }

    #[test]
    fn test_non_letters_pass_through() {
        assert_eq!(shout_and_reverse(b"1-2"), b"2-1".to_vec());
    }
}
