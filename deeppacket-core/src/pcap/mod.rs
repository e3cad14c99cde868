//! Capture file reading.
//!
//! The main types are:
//! - [`PcapReader`] - File-based reader with automatic compression handling
//! - [`crate::io::RawPacket`] - Raw frame data (re-exported from io module)

mod reader;

pub use reader::{count_packets, PcapReader};
