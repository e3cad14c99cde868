//! Fuzz target for capture file parsing.
//!
//! Covers magic detection, global and record headers, and the dissector
//! run over whatever frames come out.

#![no_main]

use libfuzzer_sys::fuzz_target;
use deeppacket_core::dissect;
use deeppacket_core::io::{GenericPcapReader, PcapFormat};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if let Ok(format) = PcapFormat::detect(data) {
        if let Ok(mut reader) = GenericPcapReader::with_format(Cursor::new(data), format) {
            while let Ok(Some(packet)) = reader.next_packet() {
                let _ = dissect(&packet);
            }
        }
    }
});
