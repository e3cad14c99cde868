//! Capture sessions.
//!
//! A [`CaptureSession`] drives packets through the pipeline strictly in
//! capture order:
//!
//! ```text
//! RawPacket -> dissect -> classify -> decode / reassemble -> normalize -> sink
//! ```
//!
//! The session owns the [`HeaderTableStore`], so HTTP/2 decompression state
//! carries over from one file to the next within a run. Nothing that goes
//! wrong inside a single packet stops the run: unclassifiable packets are
//! discarded and decoder failures are counted and skipped.

use std::collections::BTreeMap;
use std::path::Path;

use crate::classify::{classify, Classification, DiscardReason, ProtocolKind};
use crate::config::TimeWindow;
use crate::error::{Error, ProtocolError};
use crate::header_table::HeaderTableStore;
use crate::http2::FrameReassembler;
use crate::io::RawPacket;
use crate::packet::{dissect, CapturedPacket};
use crate::pcap::PcapReader;
use crate::protocol::{NativeMessage, Normalize};
use crate::record::Record;
use crate::sink::{Envelope, RecordSink};

/// Counters accumulated over a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Packets read from capture files
    pub packets: u64,
    /// Packets outside the time window
    pub filtered: u64,
    pub discarded: BTreeMap<DiscardReason, u64>,
    /// Packets routed to each protocol path
    pub routed: BTreeMap<ProtocolKind, u64>,
    /// Records emitted for each protocol path
    pub records: BTreeMap<ProtocolKind, u64>,
    /// Routed packets whose decoder rejected the payload
    pub decode_failures: u64,
    /// Routed packets that decoded to nothing (HTTP/2 only)
    pub empty: u64,
    pub files: u64,
}

impl SessionStats {
    pub fn total_records(&self) -> u64 {
        self.records.values().sum()
    }

    pub fn total_discarded(&self) -> u64 {
        self.discarded.values().sum()
    }
}

/// Outcome of one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketOutcome {
    Emitted(ProtocolKind),
    Filtered,
    Discarded(DiscardReason),
    DecodeFailed(ProtocolKind),
    Empty(ProtocolKind),
}

/// One run over one or more capture files.
#[derive(Debug, Default)]
pub struct CaptureSession {
    header_tables: HeaderTableStore,
    window: TimeWindow,
    stats: SessionStats,
}

impl CaptureSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only packets whose time of day falls in `window` are processed.
    pub fn with_window(window: TimeWindow) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn header_tables(&self) -> &HeaderTableStore {
        &self.header_tables
    }

    /// Process every packet of one capture file.
    ///
    /// Returns the number of packets read. Only errors opening or reading
    /// the file are returned; packets already emitted stay in the sink.
    pub fn process_file(
        &mut self,
        path: impl AsRef<Path>,
        sink: &mut dyn RecordSink,
    ) -> Result<u64, Error> {
        self.process_file_with_progress(path, sink, |_| {})
    }

    /// Like [`process_file`](Self::process_file), calling `on_packet` with
    /// the running frame count after each packet.
    pub fn process_file_with_progress(
        &mut self,
        path: impl AsRef<Path>,
        sink: &mut dyn RecordSink,
        mut on_packet: impl FnMut(u64),
    ) -> Result<u64, Error> {
        let path = path.as_ref();
        let mut reader = PcapReader::open(path)?;
        tracing::info!(path = %path.display(), link_type = reader.link_type(), "processing capture");

        while let Some(raw) = reader.next_packet()? {
            self.process_raw(&raw, sink);
            on_packet(raw.frame_number);
        }

        self.stats.files += 1;
        let frames = reader.frame_count();
        tracing::info!(path = %path.display(), frames, "capture done");
        Ok(frames)
    }

    /// Dissect and process one frame as read from a capture file.
    pub fn process_raw(&mut self, raw: &RawPacket, sink: &mut dyn RecordSink) -> PacketOutcome {
        self.process_packet(&dissect(raw), sink)
    }

    /// Classify, decode and normalize one packet, emitting at most one
    /// record.
    pub fn process_packet(
        &mut self,
        packet: &CapturedPacket,
        sink: &mut dyn RecordSink,
    ) -> PacketOutcome {
        self.stats.packets += 1;
        let outcome = self.route(packet, sink);

        match outcome {
            PacketOutcome::Emitted(kind) => *self.stats.records.entry(kind).or_default() += 1,
            PacketOutcome::Filtered => self.stats.filtered += 1,
            PacketOutcome::Discarded(reason) => {
                *self.stats.discarded.entry(reason).or_default() += 1
            }
            PacketOutcome::DecodeFailed(_) => self.stats.decode_failures += 1,
            PacketOutcome::Empty(_) => self.stats.empty += 1,
        }
        outcome
    }

    fn route(&mut self, packet: &CapturedPacket, sink: &mut dyn RecordSink) -> PacketOutcome {
        if !self.window.contains(&packet.timestamp) {
            return PacketOutcome::Filtered;
        }

        let (kind, payload) = match classify(packet) {
            Classification::Route { kind, payload } => (kind, payload),
            Classification::Discard(reason) => {
                tracing::trace!(frame = packet.frame_number, %reason, "packet discarded");
                return PacketOutcome::Discarded(reason);
            }
        };
        // Routing implies a network layer
        let Some(network) = packet.network else {
            return PacketOutcome::Discarded(DiscardReason::NoNetworkLayer);
        };
        *self.stats.routed.entry(kind).or_default() += 1;

        let record = match self.decode(kind, payload, packet) {
            Ok(Some(record)) => record,
            Ok(None) => return PacketOutcome::Empty(kind),
            Err(e) => {
                tracing::trace!(frame = packet.frame_number, %kind, error = %e, "decoder rejected payload");
                return PacketOutcome::DecodeFailed(kind);
            }
        };

        sink.insert(
            Envelope {
                src: network.src,
                dst: network.dst,
                protocol: kind.tag(),
                timestamp: packet.timestamp,
                frame_number: packet.frame_number,
            },
            record,
        );
        PacketOutcome::Emitted(kind)
    }

    fn decode(
        &self,
        kind: ProtocolKind,
        payload: &[u8],
        packet: &CapturedPacket,
    ) -> Result<Option<Record>, ProtocolError> {
        if kind == ProtocolKind::HttpFrame {
            let Some(network) = packet.network else {
                return Ok(None);
            };
            return Ok(FrameReassembler::new(&self.header_tables).reassemble(
                payload,
                network.src,
                network.dst,
            ));
        }

        NativeMessage::decode(kind, payload)
            .transpose()
            .map(|message| message.map(|m| m.normalize()))
    }
}
