//! Fuzz target for the per-packet pipeline.
//!
//! The first byte picks the link type; the rest is the frame.

#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use deeppacket_core::io::RawPacket;
use deeppacket_core::{CaptureSession, MemorySink};

const LINK_TYPES: [u16; 4] = [1, 101, 113, 276];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, frame)) = data.split_first() else {
        return;
    };

    let raw = RawPacket {
        frame_number: 1,
        timestamp_ns: 1_700_000_000_000_000_000,
        captured_len: frame.len() as u32,
        original_len: frame.len() as u32,
        link_type: LINK_TYPES[selector as usize % LINK_TYPES.len()],
        data: Bytes::copy_from_slice(frame),
    };

    let mut session = CaptureSession::new();
    let mut sink = MemorySink::new();
    session.process_raw(&raw, &mut sink);
    assert!(sink.len() <= 1);
});
