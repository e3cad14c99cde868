//! Generic PCAP/PCAPNG reader over any Read source.
//!
//! Built on the `pcap_parser` crate. The reader yields frames in file order
//! and numbers them from 1.
//!
//! ## Usage
//!
//! ```ignore
//! use std::fs::File;
//!
//! let file = File::open("capture.pcap")?;
//! let mut reader = GenericPcapReader::with_format(file, PcapFormat::LegacyLeMicro)?;
//! while let Some(packet) = reader.next_packet()? {
//!     println!("{} bytes", packet.data.len());
//! }
//! ```

use std::fmt;
use std::io::{BufReader, Read};

use bytes::Bytes;
use pcap_parser::pcapng::Block;
use pcap_parser::traits::PcapReaderIterator;
use pcap_parser::{LegacyPcapReader, PcapBlockOwned, PcapNGReader};

use crate::error::{Error, PcapError};
use crate::io::RawPacket;

/// Buffer size for pcap_parser readers (256KB).
const BUFFER_SIZE: usize = 262144;

/// Link type assumed until a header says otherwise.
const DEFAULT_LINK_TYPE: u32 = 1;

/// Format of the PCAP file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcapFormat {
    /// Classic PCAP (little-endian, microseconds)
    LegacyLeMicro,
    /// Classic PCAP (big-endian, microseconds)
    LegacyBeMicro,
    /// Classic PCAP (little-endian, nanoseconds)
    LegacyLeNano,
    /// Classic PCAP (big-endian, nanoseconds)
    LegacyBeNano,
    /// PCAPNG format
    PcapNg,
}

impl PcapFormat {
    /// Detect PCAP format from magic bytes.
    pub fn detect(data: &[u8]) -> Result<Self, Error> {
        if data.len() < 4 {
            return Err(Error::Pcap(PcapError::InvalidFormat {
                reason: "Data too small for PCAP magic".into(),
            }));
        }

        let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);

        match magic {
            0xa1b2c3d4 => Ok(PcapFormat::LegacyLeMicro),
            0xd4c3b2a1 => Ok(PcapFormat::LegacyBeMicro),
            0xa1b23c4d => Ok(PcapFormat::LegacyLeNano),
            0x4d3cb2a1 => Ok(PcapFormat::LegacyBeNano),
            0x0a0d0d0a => Ok(PcapFormat::PcapNg),
            _ => Err(Error::Pcap(PcapError::InvalidFormat {
                reason: format!("Unknown PCAP magic: 0x{:08x}", magic),
            })),
        }
    }

    /// Whether this is a PCAPNG format.
    pub fn is_pcapng(&self) -> bool {
        matches!(self, PcapFormat::PcapNg)
    }

    /// Whether legacy timestamps carry nanoseconds instead of microseconds.
    pub fn is_nanosecond(&self) -> bool {
        matches!(self, PcapFormat::LegacyLeNano | PcapFormat::LegacyBeNano)
    }
}

/// Per-interface state of a pcapng section.
#[derive(Debug, Clone, Copy)]
struct Interface {
    link_type: u32,
    /// Timestamp units per second
    units_per_sec: u64,
    /// Seconds added to every timestamp
    offset_secs: i64,
}

impl Interface {
    fn new(link_type: u32, tsresol: u8, offset_secs: i64) -> Self {
        let exp = u32::from(tsresol & 0x7f);
        let units_per_sec = if tsresol & 0x80 != 0 {
            1u64.checked_shl(exp).unwrap_or(1_000_000)
        } else {
            10u64.checked_pow(exp).unwrap_or(1_000_000)
        };
        Self {
            link_type,
            units_per_sec: units_per_sec.max(1),
            offset_secs,
        }
    }

    fn timestamp_ns(&self, ts_high: u32, ts_low: u32) -> i64 {
        let units = (u128::from(ts_high) << 32) | u128::from(ts_low);
        let ns = units * 1_000_000_000 / u128::from(self.units_per_sec);
        let ns = i64::try_from(ns).unwrap_or(i64::MAX);
        ns.saturating_add(self.offset_secs.saturating_mul(1_000_000_000))
    }
}

/// Generic PCAP/PCAPNG reader over any Read source.
pub struct GenericPcapReader<R: Read> {
    blocks: Blocks<R>,
    state: StreamState,
}

enum Blocks<R: Read> {
    Legacy(LegacyPcapReader<BufReader<R>>),
    Ng(PcapNGReader<BufReader<R>>),
}

/// What the blocks seen so far say about the packets still to come.
#[derive(Debug)]
struct StreamState {
    frames: u64,
    link_type: u32,
    nanosecond: bool,
    /// pcapng interfaces of the current section, by id
    interfaces: Vec<Interface>,
}

impl<R: Read> GenericPcapReader<R> {
    /// Create a reader with known format.
    ///
    /// Use [`PcapFormat::detect`] on the first four (decompressed) bytes to
    /// determine the format before calling this.
    pub fn with_format(source: R, format: PcapFormat) -> Result<Self, Error> {
        let source = BufReader::with_capacity(BUFFER_SIZE, source);
        let blocks = if format.is_pcapng() {
            Blocks::Ng(PcapNGReader::new(BUFFER_SIZE, source).map_err(malformed)?)
        } else {
            Blocks::Legacy(LegacyPcapReader::new(BUFFER_SIZE, source).map_err(malformed)?)
        };

        Ok(GenericPcapReader {
            blocks,
            state: StreamState {
                frames: 0,
                link_type: DEFAULT_LINK_TYPE,
                nanosecond: format.is_nanosecond(),
                interfaces: Vec::new(),
            },
        })
    }

    /// Link type of the most recently described interface.
    pub fn link_type(&self) -> u32 {
        self.state.link_type
    }

    /// Frames read so far.
    pub fn frame_count(&self) -> u64 {
        self.state.frames
    }

    /// Read the next packet, or `Ok(None)` at end of file.
    pub fn next_packet(&mut self) -> Result<Option<RawPacket>, Error> {
        match &mut self.blocks {
            Blocks::Legacy(reader) => pump(reader, &mut self.state),
            Blocks::Ng(reader) => pump(reader, &mut self.state),
        }
    }
}

/// Pull blocks until one of them is a packet.
fn pump<P: PcapReaderIterator>(
    reader: &mut P,
    state: &mut StreamState,
) -> Result<Option<RawPacket>, Error> {
    use pcap_parser::PcapError as ParserError;

    loop {
        match reader.next() {
            Ok((offset, block)) => {
                let packet = state.absorb(block);
                reader.consume(offset);
                if packet.is_some() {
                    return Ok(packet);
                }
            }
            Err(ParserError::Eof) => return Ok(None),
            Err(ParserError::Incomplete(_)) => reader.refill().map_err(malformed)?,
            Err(e) => return Err(malformed(e)),
        }
    }
}

fn malformed(e: impl fmt::Display) -> Error {
    Error::Pcap(PcapError::InvalidFormat {
        reason: format!("malformed capture: {e}"),
    })
}

impl StreamState {
    /// Update the state from one block, returning it if it carries a frame.
    fn absorb(&mut self, block: PcapBlockOwned<'_>) -> Option<RawPacket> {
        match block {
            PcapBlockOwned::LegacyHeader(header) => {
                self.link_type = header.network.0 as u32;
                self.nanosecond = header.is_nanosecond_precision();
                None
            }
            PcapBlockOwned::Legacy(packet) => {
                let fraction = i64::from(packet.ts_usec);
                let fraction_ns = if self.nanosecond { fraction } else { fraction * 1_000 };
                let timestamp_ns = i64::from(packet.ts_sec) * 1_000_000_000 + fraction_ns;
                Some(self.frame(
                    timestamp_ns,
                    packet.caplen,
                    packet.origlen,
                    self.link_type,
                    packet.data,
                ))
            }
            PcapBlockOwned::NG(Block::SectionHeader(_)) => {
                // Interface ids restart with every section
                self.interfaces.clear();
                None
            }
            PcapBlockOwned::NG(Block::InterfaceDescription(idb)) => {
                self.link_type = idb.linktype.0 as u32;
                self.interfaces
                    .push(Interface::new(self.link_type, idb.if_tsresol, idb.if_tsoffset));
                None
            }
            PcapBlockOwned::NG(Block::EnhancedPacket(epb)) => {
                let iface = self
                    .interfaces
                    .get(epb.if_id as usize)
                    .copied()
                    .unwrap_or_else(|| Interface::new(self.link_type, 6, 0));
                let caplen = (epb.caplen as usize).min(epb.data.len());
                Some(self.frame(
                    iface.timestamp_ns(epb.ts_high, epb.ts_low),
                    epb.caplen,
                    epb.origlen,
                    iface.link_type,
                    &epb.data[..caplen],
                ))
            }
            PcapBlockOwned::NG(Block::SimplePacket(spb)) => {
                // Simple packets have no timestamp and belong to interface 0
                let link_type = self.interfaces.first().map_or(self.link_type, |i| i.link_type);
                Some(self.frame(0, spb.data.len() as u32, spb.origlen, link_type, spb.data))
            }
            _ => None,
        }
    }

    fn frame(
        &mut self,
        timestamp_ns: i64,
        captured_len: u32,
        original_len: u32,
        link_type: u32,
        data: &[u8],
    ) -> RawPacket {
        self.frames += 1;
        RawPacket {
            frame_number: self.frames,
            timestamp_ns,
            captured_len,
            original_len,
            link_type: link_type as u16,
            data: Bytes::copy_from_slice(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detect_formats() {
        assert_eq!(
            PcapFormat::detect(&[0xd4, 0xc3, 0xb2, 0xa1]).unwrap(),
            PcapFormat::LegacyLeMicro
        );
        assert_eq!(
            PcapFormat::detect(&[0xa1, 0xb2, 0xc3, 0xd4]).unwrap(),
            PcapFormat::LegacyBeMicro
        );
        assert_eq!(
            PcapFormat::detect(&[0x4d, 0x3c, 0xb2, 0xa1]).unwrap(),
            PcapFormat::LegacyLeNano
        );
        assert_eq!(
            PcapFormat::detect(&[0x0a, 0x0d, 0x0d, 0x0a]).unwrap(),
            PcapFormat::PcapNg
        );
        assert!(PcapFormat::detect(&[0x00, 0x01, 0x02, 0x03]).is_err());
        assert!(PcapFormat::detect(&[0x0a]).is_err());
    }

    #[test]
    fn test_interface_resolution() {
        // Default microseconds
        let us = Interface::new(1, 6, 0);
        assert_eq!(us.timestamp_ns(0, 1_500_000), 1_500_000_000);

        // Nanoseconds
        let ns = Interface::new(1, 9, 0);
        assert_eq!(ns.timestamp_ns(0, 42), 42);

        // Binary resolution 2^-10 with an offset of 10 seconds
        let bin = Interface::new(1, 0x80 | 10, 10);
        assert_eq!(bin.timestamp_ns(0, 1024), 11_000_000_000);
    }

    #[test]
    fn test_read_legacy_frames() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0xd4, 0xc3, 0xb2, 0xa1]); // Magic (little endian)
        data.extend_from_slice(&[0x02, 0x00, 0x04, 0x00]); // Version 2.4
        data.extend_from_slice(&[0u8; 8]); // Thiszone + sigfigs
        data.extend_from_slice(&65535u32.to_le_bytes()); // Snaplen
        data.extend_from_slice(&101u32.to_le_bytes()); // Raw IP

        for (sec, payload) in [(10u32, &[0x45u8, 0x00][..]), (11, &[0x60, 0x00, 0x00][..])] {
            data.extend_from_slice(&sec.to_le_bytes());
            data.extend_from_slice(&250u32.to_le_bytes());
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(payload);
        }

        let mut reader =
            GenericPcapReader::with_format(Cursor::new(data), PcapFormat::LegacyLeMicro).unwrap();

        let first = reader.next_packet().unwrap().unwrap();
        assert_eq!(first.frame_number, 1);
        assert_eq!(first.link_type, 101);
        assert_eq!(first.timestamp_ns, 10_000_250_000);
        assert_eq!(&first.data[..], &[0x45, 0x00]);

        let second = reader.next_packet().unwrap().unwrap();
        assert_eq!(second.frame_number, 2);
        assert_eq!(second.data.len(), 3);

        assert!(reader.next_packet().unwrap().is_none());
        assert_eq!(reader.frame_count(), 2);
    }
}
