// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! End-to-end tests for the creator/attacher handshake.
//!
//! Both roles live in this process with separate mappings of the same System V
//! segment, which exercises the same kernel objects two processes would share.
//! Every test keys its segment off its own temporary file so tests can run in
//! parallel.

#![cfg(unix)]

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use shmlink_core::{
    Identifier, Mode, SegmentState, SharedMemory, SharedMemoryError, TransferError,
    DEFAULT_SEGMENT_SIZE,
};
use tempfile::NamedTempFile;

/// How long a blocked reader is given to prove it stays blocked.
const BLOCK_WINDOW: Duration = Duration::from_millis(300);

/// How long a woken reader is given to finish.
const WAKE_TIMEOUT: Duration = Duration::from_secs(5);

fn unique_identifier() -> (NamedTempFile, Identifier) {
    let key_file = NamedTempFile::new().expect("Failed to create key file");
    let identifier = Identifier::new(key_file.path(), 65);
    (key_file, identifier)
}

fn alphabet(len: usize) -> Vec<u8> {
    (b'a'..=b'z').cycle().take(len).collect()
}

/// Uppercase every even-indexed byte, then reverse.
fn reference_transform(input: &[u8]) -> Vec<u8> {
    let mut out: Vec<u8> = input
        .iter()
        .enumerate()
        .map(|(i, b)| if i % 2 == 0 { b.to_ascii_uppercase() } else { *b })
        .collect();
    out.reverse();
    out
}

#[test]
fn test_alphabet_round_trip() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let mut attacher = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap();
    assert_eq!(creator.size(), 100);
    assert_eq!(attacher.mode(), Mode::Attach);

    let sent = alphabet(DEFAULT_SEGMENT_SIZE);
    assert_eq!(&sent[..3], b"abc");
    assert_eq!(sent[26], b'a');

    attacher.write(0, &sent).unwrap();

    let mut received = vec![0u8; DEFAULT_SEGMENT_SIZE];
    creator.read(0, &mut received).unwrap();
    assert_eq!(received, sent);
}

#[test]
fn test_reader_transformation_matches_reference() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let mut attacher = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap();

    let sent = alphabet(DEFAULT_SEGMENT_SIZE);
    attacher.write(0, &sent).unwrap();

    let mut received = vec![0u8; DEFAULT_SEGMENT_SIZE];
    creator.read(0, &mut received).unwrap();

    let transformed = reference_transform(&received);
    assert_eq!(transformed.len(), 100);
    // Index 99 ('v') is odd and lands first; index 0 ('a') is even and lands last
    assert_eq!(transformed[0], b'v');
    assert_eq!(transformed[99], b'A');
    assert_eq!(transformed, reference_transform(&sent));
}

#[test]
fn test_every_valid_range_round_trips() {
    let (_key_file, identifier) = unique_identifier();
    let size = 64;

    let creator = SharedMemory::create(identifier.clone(), size).unwrap();
    let mut attacher = SharedMemory::attach(identifier, size).unwrap();

    for offset in [0usize, 1, 7, 31, 63, 64] {
        for len in [0usize, 1, 8, 33] {
            if offset + len > size {
                continue;
            }
            let data: Vec<u8> = (0..len).map(|i| (offset * 31 + i) as u8).collect();
            attacher.write(offset, &data).unwrap();

            let mut out = vec![0xAAu8; len];
            creator.read(offset, &mut out).unwrap();
            assert_eq!(out, data, "offset {} len {}", offset, len);
        }
    }
}

#[test]
fn test_out_of_bounds_is_a_no_op() {
    let (_key_file, identifier) = unique_identifier();
    let size = 32;

    let creator = SharedMemory::create(identifier.clone(), size).unwrap();
    let mut attacher = SharedMemory::attach(identifier, size).unwrap();

    let baseline = vec![b'x'; size];
    attacher.write(0, &baseline).unwrap();

    let err = attacher.write(30, b"abc").unwrap_err();
    assert!(matches!(
        err,
        TransferError::OutOfBounds {
            offset: 30,
            len: 3,
            size: 32
        }
    ));
    assert!(attacher.write(usize::MAX, b"a").is_err());

    // The read is rejected before it consumes the pending signal
    let mut untouched = [0u8; 8];
    assert!(creator.read(28, &mut untouched).is_err());
    assert_eq!(untouched, [0u8; 8]);

    let mut out = vec![0u8; size];
    creator.read(0, &mut out).unwrap();
    assert_eq!(out, baseline);
}

#[test]
fn test_second_create_fails() {
    let (_key_file, identifier) = unique_identifier();

    let _creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let err = SharedMemory::create(identifier, DEFAULT_SEGMENT_SIZE).unwrap_err();

    assert!(matches!(
        err,
        SharedMemoryError::Acquire {
            role: Mode::Create,
            operation: "shmget",
            ..
        }
    ));
    assert!(err.is_already_exists());
}

#[test]
fn test_attach_without_live_creator_fails() {
    let (_key_file, identifier) = unique_identifier();

    let err = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap_err();
    assert!(matches!(
        err,
        SharedMemoryError::Acquire {
            role: Mode::Attach,
            operation: "shmget",
            ..
        }
    ));
    assert!(err.is_not_found());
}

#[test]
fn test_create_again_after_creator_dropped() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    drop(creator);

    // Backing object is gone, so attach fails and create succeeds
    assert!(SharedMemory::attach(identifier.clone(), DEFAULT_SEGMENT_SIZE).is_err());
    let again = SharedMemory::create(identifier, DEFAULT_SEGMENT_SIZE).unwrap();
    assert_eq!(again.state(), SegmentState::Ready);
}

#[test]
fn test_attacher_drop_leaves_segment_alive() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    drop(SharedMemory::attach(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap());

    let mut attacher = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap();
    attacher.write(0, b"still here").unwrap();

    let mut out = [0u8; 10];
    creator.read(0, &mut out).unwrap();
    assert_eq!(&out, b"still here");
}

#[test]
fn test_attach_with_smaller_size_fails() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let err = SharedMemory::attach(identifier.clone(), 50).unwrap_err();
    assert!(matches!(
        err,
        SharedMemoryError::InvalidSize {
            role: Mode::Attach,
            size: 50,
            ..
        }
    ));

    // The creator's signal was not touched, so a matching attacher still wakes it
    let mut attacher = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap();
    let sent = alphabet(DEFAULT_SEGMENT_SIZE);
    attacher.write(0, &sent).unwrap();

    let mut out = vec![0u8; DEFAULT_SEGMENT_SIZE];
    creator.read(0, &mut out).unwrap();
    assert_eq!(out, sent);
}

#[test]
fn test_attach_with_larger_size_fails() {
    let (_key_file, identifier) = unique_identifier();

    let _creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let err = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE * 4).unwrap_err();
    assert_eq!(err.operation(), Some("shmget"));
}

#[test]
fn test_failed_construction_leaks_nothing() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    assert!(SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).is_err());
    assert!(SharedMemory::attach(identifier.clone(), 50).is_err());
    drop(creator);

    // Nothing the failed attempts acquired keeps the key alive
    assert!(SharedMemory::attach(identifier.clone(), DEFAULT_SEGMENT_SIZE)
        .unwrap_err()
        .is_not_found());
    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let mut attacher = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap();
    attacher.write(0, b"fresh").unwrap();

    let mut out = [0u8; 5];
    creator.read(0, &mut out).unwrap();
    assert_eq!(&out, b"fresh");
}

#[test]
fn test_read_blocks_until_write() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), DEFAULT_SEGMENT_SIZE).unwrap();
    let mut attacher = SharedMemory::attach(identifier, DEFAULT_SEGMENT_SIZE).unwrap();

    let (tx, rx) = mpsc::channel();
    let reader = thread::spawn(move || {
        let mut out = vec![0u8; DEFAULT_SEGMENT_SIZE];
        let result = creator.read(0, &mut out);
        tx.send((result.is_ok(), out)).unwrap();
        creator
    });

    assert!(
        matches!(rx.recv_timeout(BLOCK_WINDOW), Err(mpsc::RecvTimeoutError::Timeout)),
        "read returned before any write"
    );

    let sent = alphabet(DEFAULT_SEGMENT_SIZE);
    attacher.write(0, &sent).unwrap();

    let (ok, out) = rx.recv_timeout(WAKE_TIMEOUT).expect("reader was not woken");
    assert!(ok);
    assert_eq!(out, sent);

    drop(reader.join().unwrap());
}

#[test]
fn test_repeated_writes_coalesce_into_one_wakeup() {
    let (_key_file, identifier) = unique_identifier();

    let creator = SharedMemory::create(identifier.clone(), 4).unwrap();
    let mut attacher = SharedMemory::attach(identifier, 4).unwrap();

    attacher.write(0, b"one!").unwrap();
    attacher.write(0, b"two!").unwrap();

    let mut out = [0u8; 4];
    creator.read(0, &mut out).unwrap();
    assert_eq!(&out, b"two!");

    // Only one wakeup was pending, so a second read blocks
    let (tx, rx) = mpsc::channel();
    let reader = thread::spawn(move || {
        let mut out = [0u8; 4];
        let ok = creator.read(0, &mut out).is_ok();
        tx.send((ok, out)).unwrap();
        creator
    });
    assert!(matches!(
        rx.recv_timeout(BLOCK_WINDOW),
        Err(mpsc::RecvTimeoutError::Timeout)
    ));

    attacher.write(0, b"tri!").unwrap();
    let (ok, out) = rx.recv_timeout(WAKE_TIMEOUT).expect("reader was not woken");
    assert!(ok);
    assert_eq!(&out, b"tri!");
    drop(reader.join().unwrap());
}

#[test]
fn test_missing_key_path_fails_construction() {
    let identifier = Identifier::new("/definitely/not/a/real/shmlink/key", 65);
    let err = SharedMemory::create(identifier, DEFAULT_SEGMENT_SIZE).unwrap_err();
    assert_eq!(err.operation(), Some("ftok"));
    assert!(err.to_string().starts_with("creator: ftok failed"));
}
