//! Fuzz target for HTTP/2 frame reading and two-frame reassembly.

#![no_main]

use libfuzzer_sys::fuzz_target;
use deeppacket_core::http2::FrameReader;
use deeppacket_core::{FrameReassembler, HeaderTableStore};
use std::net::{IpAddr, Ipv4Addr};

fuzz_target!(|data: &[u8]| {
    let mut reader = FrameReader::new(data);
    while let Ok(Some(_frame)) = reader.next_frame() {}

    let store = HeaderTableStore::new();
    let reassembler = FrameReassembler::new(&store);
    let client = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    let server = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
    let _ = reassembler.reassemble(data, client, server);
    let _ = reassembler.reassemble(data, server, client);
});
