//! # deeppacket-core
//!
//! Packet classification, stateful HTTP/2 header decoding and record
//! normalization.
//!
//! Captured frames are dissected down to their application payload,
//! classified onto exactly one protocol path, decoded, and flattened into
//! ordered key/value [`Record`]s that every protocol shares.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use deeppacket_core::prelude::*;
//!
//! let mut session = CaptureSession::new();
//! let mut sink = MemorySink::new();
//! session.process_file("capture.pcap.gz", &mut sink).unwrap();
//!
//! for stored in sink.records() {
//!     println!("{} {}", stored.envelope.protocol, stored.record.len());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        deeppacket-core                              |
//! +---------------------------------------------------------------------+
//! |  io/, pcap/     - pcap/pcapng reading, gzip/zstd decompression      |
//! |  packet/        - link/network/transport dissection                 |
//! |  classify       - protocol routing rules                            |
//! |  protocol/      - SIP+SDP, DNS, RTP, RTCP, Diameter decoders        |
//! |  header_table   - per-connection HPACK state                        |
//! |  http2/         - frame parsing and two-frame reassembly            |
//! |  record, payload - flat records, DATA payload heuristics            |
//! |  session, sink  - ordered processing and record output              |
//! |  config, error  - pipeline settings and error types                 |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Crate Features
//!
//! - `default` - Zstd decompression enabled
//! - `compress-zstd` - Zstd decompression support (gzip is always on)

pub mod classify;
pub mod config;
pub mod error;
pub mod header_table;
pub mod http2;
pub mod io;
pub mod packet;
pub mod payload;
pub mod pcap;
pub mod prelude;
pub mod protocol;
pub mod record;
pub mod session;
pub mod sink;

pub use classify::{classify, Classification, DiscardReason, ProtocolKind};
pub use config::{PipelineConfig, TimeWindow};
pub use error::{ConfigError, Error, PcapError, ProtocolError, Result};
pub use header_table::{ConnectionKey, HeaderTable, HeaderTableStore, HpackError};
pub use http2::{FrameError, FrameReassembler};
pub use io::RawPacket;
pub use packet::{dissect, CapturedPacket};
pub use pcap::PcapReader;
pub use protocol::{NativeMessage, Normalize};
pub use record::{FieldWriter, HexCase, Record};
pub use session::{CaptureSession, PacketOutcome, SessionStats};
pub use sink::{Envelope, JsonLinesSink, MemorySink, RecordSink, StoredRecord};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
