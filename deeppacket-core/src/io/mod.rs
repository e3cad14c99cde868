//! Capture file I/O.
//!
//! Reading is split in two layers:
//! - [`Decompressor`] turns a gzip/zstd/plain byte source into a plain
//!   byte stream, with [`peek`] to sniff magic bytes without consuming them
//! - [`GenericPcapReader`] walks legacy pcap or pcapng blocks from any
//!   `Read` source and yields [`RawPacket`]s in capture order
//!
//! ## Compression Support
//!
//! - Gzip (.gz) - always enabled
//! - Zstd (.zst) - `compress-zstd` feature

mod decompress;
mod pcap_stream;

use bytes::Bytes;

pub use decompress::{peek, Compression, Decompressor, Replayed};
pub use pcap_stream::{GenericPcapReader, PcapFormat};

/// One frame as stored in the capture file.
#[derive(Debug, Clone)]
pub struct RawPacket {
    /// Frame number (1-indexed, per file)
    pub frame_number: u64,
    /// Timestamp in nanoseconds since Unix epoch
    pub timestamp_ns: i64,
    /// Captured length (may be less than original)
    pub captured_len: u32,
    /// Original packet length on the wire
    pub original_len: u32,
    /// Link type of the interface the frame was captured on
    pub link_type: u16,
    /// Frame bytes starting at the link-layer header
    pub data: Bytes,
}
