//! RTCP compound packet decoding.
//!
//! Covers RFC 3550 reports, SDES, BYE and APP, RFC 4585 transport and
//! payload-specific feedback (NACK, PLI, SLI), RFC 5104 FIR, RFC 6051 RRR,
//! RFC 8888 congestion control feedback, REMB and the RFC 3611 extended
//! report block headers. Packet types and feedback formats outside that set
//! decode to [`RtcpPacket::Unknown`] instead of failing.

use smallvec::SmallVec;

use super::reader::Reader;
use super::Normalize;
use crate::error::ProtocolError;
use crate::record::{FieldWriter, HexCase};

const PROTOCOL: &str = "RTCP";
const HEADER_LEN: usize = 4;

/// RTCP packet types.
pub mod packet_type {
    pub const SENDER_REPORT: u8 = 200;
    pub const RECEIVER_REPORT: u8 = 201;
    pub const SOURCE_DESCRIPTION: u8 = 202;
    pub const GOODBYE: u8 = 203;
    pub const APPLICATION_DEFINED: u8 = 204;
    pub const TRANSPORT_FEEDBACK: u8 = 205;
    pub const PAYLOAD_FEEDBACK: u8 = 206;
    pub const EXTENDED_REPORT: u8 = 207;
}

/// Feedback message formats (the header count field).
mod format {
    pub const NACK: u8 = 1;
    pub const RRR: u8 = 5;
    pub const CCFB: u8 = 11;

    pub const PLI: u8 = 1;
    pub const SLI: u8 = 2;
    pub const FIR: u8 = 4;
    pub const AFB: u8 = 15;
}

/// Decoded compound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtcpCompound {
    pub packets: Vec<RtcpPacket>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtcpPacket {
    SenderReport {
        ssrc: u32,
        ntp_time: u64,
        rtp_time: u32,
        packet_count: u32,
        octet_count: u32,
        reports: Vec<ReceptionReport>,
        profile_extensions: Vec<u8>,
    },
    ReceiverReport {
        ssrc: u32,
        reports: Vec<ReceptionReport>,
        profile_extensions: Vec<u8>,
    },
    SourceDescription {
        chunks: Vec<SdesChunk>,
    },
    Goodbye {
        sources: SmallVec<[u32; 4]>,
        reason: String,
    },
    ApplicationDefined {
        sub_type: u8,
        ssrc: u32,
        name: String,
        data: Vec<u8>,
    },
    TransportLayerNack {
        sender_ssrc: u32,
        media_ssrc: u32,
        nacks: Vec<NackPair>,
    },
    RapidResynchronizationRequest {
        sender_ssrc: u32,
        media_ssrc: u32,
    },
    CcFeedbackReport {
        sender_ssrc: u32,
        report_blocks: Vec<CcfbReportBlock>,
        report_timestamp: u32,
    },
    PictureLossIndication {
        sender_ssrc: u32,
        media_ssrc: u32,
    },
    SliceLossIndication {
        sender_ssrc: u32,
        media_ssrc: u32,
        entries: Vec<SliEntry>,
    },
    FullIntraRequest {
        sender_ssrc: u32,
        media_ssrc: u32,
        entries: Vec<FirEntry>,
    },
    ReceiverEstimatedMaximumBitrate {
        sender_ssrc: u32,
        /// Bits per second, `mantissa << exponent`
        bitrate: u128,
        ssrcs: SmallVec<[u32; 4]>,
    },
    ExtendedReport {
        sender_ssrc: u32,
        blocks: Vec<XrBlock>,
    },
    Unknown {
        packet_type: u8,
        format: u8,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceptionReport {
    pub ssrc: u32,
    pub fraction_lost: u8,
    pub total_lost: u32,
    pub last_sequence_number: u32,
    pub jitter: u32,
    pub last_sender_report: u32,
    pub delay: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesChunk {
    pub source: u32,
    pub items: Vec<SdesItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdesItem {
    pub item_type: u8,
    pub text: String,
}

/// Name of an SDES item type.
pub fn sdes_type_name(item_type: u8) -> &'static str {
    match item_type {
        0 => "END",
        1 => "CNAME",
        2 => "NAME",
        3 => "EMAIL",
        4 => "PHONE",
        5 => "LOC",
        6 => "TOOL",
        7 => "NOTE",
        8 => "PRIV",
        _ => "UNKNOWN",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NackPair {
    pub packet_id: u16,
    pub lost_mask: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SliEntry {
    pub first: u16,
    pub number: u16,
    pub picture: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirEntry {
    pub ssrc: u32,
    pub sequence_number: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CcfbReportBlock {
    pub media_ssrc: u32,
    pub begin_sequence: u16,
    pub metrics: Vec<CcfbMetric>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcfbMetric {
    pub received: bool,
    pub ecn: u8,
    pub arrival_time_offset: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrBlock {
    pub block_type: u8,
    /// Length in 32-bit words, as on the wire
    pub length: u16,
}

impl XrBlock {
    pub fn type_name(&self) -> String {
        let name = match self.block_type {
            1 => "LossRLE",
            2 => "DuplicateRLE",
            3 => "PacketReceiptTimes",
            4 => "ReceiverReferenceTime",
            5 => "DLRR",
            6 => "StatisticsSummary",
            7 => "VoIPMetrics",
            other => return format!("Unknown({other})"),
        };
        name.to_string()
    }
}

/// Decode every packet of a compound RTCP payload.
///
/// One malformed packet fails the whole payload.
pub fn parse(data: &[u8]) -> Result<RtcpCompound, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::too_short(PROTOCOL, HEADER_LEN, 0));
    }

    let mut packets = Vec::new();
    let mut offset = 0;
    while offset < data.len() {
        let (packet, consumed) = parse_packet(&data[offset..])?;
        packets.push(packet);
        offset += consumed;
    }
    Ok(RtcpCompound { packets })
}

/// Decode one packet, returning it and the bytes it occupied.
fn parse_packet(data: &[u8]) -> Result<(RtcpPacket, usize), ProtocolError> {
    let mut header = Reader::new(PROTOCOL, data);
    let b0 = header.u8()?;
    let pt = header.u8()?;
    let length_words = header.u16()?;

    let version = b0 >> 6;
    if version != 2 {
        return Err(ProtocolError::invalid(
            PROTOCOL,
            "version",
            format!("expected 2, got {version}"),
        ));
    }
    let padded = b0 & 0x20 != 0;
    let count = b0 & 0x1f;

    let total = (length_words as usize + 1) * 4;
    if total > data.len() {
        return Err(ProtocolError::too_short(PROTOCOL, total, data.len()));
    }

    let mut body = &data[HEADER_LEN..total];
    if padded {
        let pad = body.last().copied().unwrap_or(0) as usize;
        if pad == 0 || pad > body.len() {
            return Err(ProtocolError::invalid(
                PROTOCOL,
                "padding",
                format!("{pad} bytes of padding in a {}-byte body", body.len()),
            ));
        }
        body = &body[..body.len() - pad];
    }

    let mut r = Reader::new(PROTOCOL, body);
    let packet = match pt {
        packet_type::SENDER_REPORT => {
            let ssrc = r.u32()?;
            let ntp_time = r.u64()?;
            let rtp_time = r.u32()?;
            let packet_count = r.u32()?;
            let octet_count = r.u32()?;
            let reports = read_reports(&mut r, count)?;
            RtcpPacket::SenderReport {
                ssrc,
                ntp_time,
                rtp_time,
                packet_count,
                octet_count,
                reports,
                profile_extensions: r.rest().to_vec(),
            }
        }
        packet_type::RECEIVER_REPORT => {
            let ssrc = r.u32()?;
            let reports = read_reports(&mut r, count)?;
            RtcpPacket::ReceiverReport {
                ssrc,
                reports,
                profile_extensions: r.rest().to_vec(),
            }
        }
        packet_type::SOURCE_DESCRIPTION => RtcpPacket::SourceDescription {
            chunks: read_sdes_chunks(&mut r, count)?,
        },
        packet_type::GOODBYE => {
            let mut sources = SmallVec::new();
            for _ in 0..count {
                sources.push(r.u32()?);
            }
            let reason = if r.is_empty() {
                String::new()
            } else {
                let len = r.u8()? as usize;
                String::from_utf8_lossy(r.take(len)?).into_owned()
            };
            RtcpPacket::Goodbye { sources, reason }
        }
        packet_type::APPLICATION_DEFINED => RtcpPacket::ApplicationDefined {
            sub_type: count,
            ssrc: r.u32()?,
            name: String::from_utf8_lossy(r.take(4)?).into_owned(),
            data: r.rest().to_vec(),
        },
        packet_type::TRANSPORT_FEEDBACK => parse_transport_feedback(&mut r, count)?,
        packet_type::PAYLOAD_FEEDBACK => parse_payload_feedback(&mut r, count)?,
        packet_type::EXTENDED_REPORT => {
            let sender_ssrc = r.u32()?;
            let mut blocks = Vec::new();
            while !r.is_empty() {
                let block_type = r.u8()?;
                r.skip(1)?;
                let length = r.u16()?;
                r.skip(length as usize * 4)?;
                blocks.push(XrBlock { block_type, length });
            }
            RtcpPacket::ExtendedReport {
                sender_ssrc,
                blocks,
            }
        }
        other => RtcpPacket::Unknown {
            packet_type: other,
            format: count,
        },
    };

    Ok((packet, total))
}

fn read_reports(r: &mut Reader<'_>, count: u8) -> Result<Vec<ReceptionReport>, ProtocolError> {
    let mut reports = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let ssrc = r.u32()?;
        let fraction_lost = r.u8()?;
        let total_lost = r.u24()?;
        reports.push(ReceptionReport {
            ssrc,
            fraction_lost,
            total_lost,
            last_sequence_number: r.u32()?,
            jitter: r.u32()?,
            last_sender_report: r.u32()?,
            delay: r.u32()?,
        });
    }
    Ok(reports)
}

fn read_sdes_chunks(r: &mut Reader<'_>, count: u8) -> Result<Vec<SdesChunk>, ProtocolError> {
    let mut chunks = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let start = r.position();
        let source = r.u32()?;
        let mut items = Vec::new();
        loop {
            let item_type = r.u8()?;
            if item_type == 0 {
                // END, then pad the chunk to a 32-bit boundary
                let used = r.position() - start;
                r.skip((4 - used % 4) % 4)?;
                break;
            }
            let len = r.u8()? as usize;
            items.push(SdesItem {
                item_type,
                text: String::from_utf8_lossy(r.take(len)?).into_owned(),
            });
        }
        chunks.push(SdesChunk { source, items });
    }
    Ok(chunks)
}

fn parse_transport_feedback(r: &mut Reader<'_>, fmt: u8) -> Result<RtcpPacket, ProtocolError> {
    let sender_ssrc = r.u32()?;

    if fmt == format::CCFB {
        // RFC 8888 has no media SSRC word; report blocks follow directly and
        // the report timestamp closes the packet.
        let blocks_len = r.remaining().checked_sub(4).ok_or_else(|| {
            ProtocolError::invalid(PROTOCOL, "report timestamp", "missing")
        })?;
        let mut blocks = Reader::new(PROTOCOL, r.take(blocks_len)?);
        let report_timestamp = r.u32()?;

        let mut report_blocks = Vec::new();
        while !blocks.is_empty() {
            let media_ssrc = blocks.u32()?;
            let begin_sequence = blocks.u16()?;
            let num_reports = blocks.u16()?;
            let mut metrics = Vec::with_capacity(num_reports as usize);
            for _ in 0..num_reports {
                let word = blocks.u16()?;
                metrics.push(CcfbMetric {
                    received: word & 0x8000 != 0,
                    ecn: ((word >> 13) & 0x03) as u8,
                    arrival_time_offset: word & 0x1fff,
                });
            }
            if num_reports % 2 == 1 {
                blocks.skip(2)?;
            }
            report_blocks.push(CcfbReportBlock {
                media_ssrc,
                begin_sequence,
                metrics,
            });
        }
        return Ok(RtcpPacket::CcFeedbackReport {
            sender_ssrc,
            report_blocks,
            report_timestamp,
        });
    }

    let media_ssrc = r.u32()?;
    Ok(match fmt {
        format::NACK => {
            let mut nacks = Vec::new();
            while !r.is_empty() {
                nacks.push(NackPair {
                    packet_id: r.u16()?,
                    lost_mask: r.u16()?,
                });
            }
            RtcpPacket::TransportLayerNack {
                sender_ssrc,
                media_ssrc,
                nacks,
            }
        }
        format::RRR => RtcpPacket::RapidResynchronizationRequest {
            sender_ssrc,
            media_ssrc,
        },
        other => RtcpPacket::Unknown {
            packet_type: packet_type::TRANSPORT_FEEDBACK,
            format: other,
        },
    })
}

fn parse_payload_feedback(r: &mut Reader<'_>, fmt: u8) -> Result<RtcpPacket, ProtocolError> {
    let sender_ssrc = r.u32()?;
    let media_ssrc = r.u32()?;

    Ok(match fmt {
        format::PLI => RtcpPacket::PictureLossIndication {
            sender_ssrc,
            media_ssrc,
        },
        format::SLI => {
            let mut entries = Vec::new();
            while !r.is_empty() {
                let word = r.u32()?;
                entries.push(SliEntry {
                    first: (word >> 19) as u16,
                    number: ((word >> 6) & 0x1fff) as u16,
                    picture: (word & 0x3f) as u8,
                });
            }
            RtcpPacket::SliceLossIndication {
                sender_ssrc,
                media_ssrc,
                entries,
            }
        }
        format::FIR => {
            let mut entries = Vec::new();
            while !r.is_empty() {
                let ssrc = r.u32()?;
                let sequence_number = r.u8()?;
                r.skip(3)?;
                entries.push(FirEntry {
                    ssrc,
                    sequence_number,
                });
            }
            RtcpPacket::FullIntraRequest {
                sender_ssrc,
                media_ssrc,
                entries,
            }
        }
        format::AFB if r.rest().starts_with(b"REMB") => {
            r.skip(4)?;
            let num_ssrc = r.u8()?;
            let packed = r.u24()?;
            let exponent = packed >> 18;
            let mantissa = packed & 0x3ffff;
            let mut ssrcs = SmallVec::new();
            for _ in 0..num_ssrc {
                ssrcs.push(r.u32()?);
            }
            RtcpPacket::ReceiverEstimatedMaximumBitrate {
                sender_ssrc,
                bitrate: (mantissa as u128) << exponent,
                ssrcs,
            }
        }
        other => RtcpPacket::Unknown {
            packet_type: packet_type::PAYLOAD_FEEDBACK,
            format: other,
        },
    })
}

fn join<T, I, F>(items: I, separator: &str, f: F) -> String
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> String,
{
    items.into_iter().map(f).collect::<Vec<_>>().join(separator)
}

fn put_reports(w: &mut FieldWriter<'_>, reports: &[ReceptionReport]) {
    w.each("Report", reports, |rw, report| {
        rw.put("SSRC", report.ssrc);
        rw.put("FractionLost", report.fraction_lost);
        rw.put("TotalLost", report.total_lost);
        rw.put("LastSequenceNumber", report.last_sequence_number);
        rw.put("Jitter", report.jitter);
        rw.put("LastSenderReport", report.last_sender_report);
        rw.put("Delay", report.delay);
    });
}

impl Normalize for RtcpPacket {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        match self {
            RtcpPacket::SenderReport {
                ssrc,
                ntp_time,
                rtp_time,
                packet_count,
                octet_count,
                reports,
                profile_extensions,
            } => {
                w.put("MessageType", "SenderReport");
                w.put("SSRC", ssrc);
                w.put("NTPTime", ntp_time);
                w.put("RTPTime", rtp_time);
                w.put("PacketCount", packet_count);
                w.put("OctetCount", octet_count);
                put_reports(w, reports);
                w.put_hex("ProfileExtensions", profile_extensions, HexCase::Upper);
            }
            RtcpPacket::ReceiverReport {
                ssrc,
                reports,
                profile_extensions,
            } => {
                w.put("MessageType", "ReceiverReport");
                w.put("SSRC", ssrc);
                put_reports(w, reports);
                w.put_hex("ProfileExtensions", profile_extensions, HexCase::Upper);
            }
            RtcpPacket::SourceDescription { chunks } => {
                w.put("MessageType", "SourceDescription");
                w.each("Chunk", chunks, |cw, chunk| {
                    cw.put("Source", chunk.source);
                    cw.each("Item", &chunk.items, |iw, item| {
                        iw.put("Type", sdes_type_name(item.item_type));
                        iw.put("Text", &item.text);
                    });
                });
            }
            RtcpPacket::Goodbye { sources, reason } => {
                w.put("MessageType", "Goodbye");
                w.put("Sources", join(sources, ", ", u32::to_string));
                w.put("Reason", reason);
            }
            RtcpPacket::ApplicationDefined {
                sub_type,
                ssrc,
                name,
                data,
            } => {
                w.put("MessageType", "ApplicationDefined");
                w.put("SubType", sub_type);
                w.put("SSRC", ssrc);
                w.put("Name", name);
                w.put_hex("Data", data, HexCase::Upper);
            }
            RtcpPacket::TransportLayerNack {
                sender_ssrc,
                media_ssrc,
                nacks,
            } => {
                w.put("MessageType", "TransportLayerNack");
                w.put("SenderSSRC", sender_ssrc);
                w.put("MediaSSRC", media_ssrc);
                w.put(
                    "NackPairs",
                    join(nacks, ", ", |n| {
                        format!("{{PacketID: {}, LostMask: {}}}", n.packet_id, n.lost_mask)
                    }),
                );
            }
            RtcpPacket::RapidResynchronizationRequest {
                sender_ssrc,
                media_ssrc,
            } => {
                w.put("MessageType", "RapidResynchronizationRequest");
                w.put("SenderSSRC", sender_ssrc);
                w.put("MediaSSRC", media_ssrc);
            }
            RtcpPacket::CcFeedbackReport {
                sender_ssrc,
                report_blocks,
                report_timestamp,
            } => {
                w.put("MessageType", "CCFeedbackReport");
                w.put("SenderSSRC", sender_ssrc);
                w.put("ReportTimestamp", report_timestamp);
                w.each("ReportBlock", report_blocks, |bw, block| {
                    bw.put("MediaSSRC", block.media_ssrc);
                    bw.put("BeginSequence", block.begin_sequence);
                    bw.each("MetricBlock", &block.metrics, |mw, metric| {
                        mw.put("Received", metric.received);
                        mw.put("ECN", metric.ecn);
                        mw.put("ArrivalTimeOffset", metric.arrival_time_offset);
                    });
                });
            }
            RtcpPacket::PictureLossIndication {
                sender_ssrc,
                media_ssrc,
            } => {
                w.put("MessageType", "PictureLossIndication");
                w.put("SenderSSRC", sender_ssrc);
                w.put("MediaSSRC", media_ssrc);
            }
            RtcpPacket::SliceLossIndication {
                sender_ssrc,
                media_ssrc,
                entries,
            } => {
                w.put("MessageType", "SliceLossIndication");
                w.put("SenderSSRC", sender_ssrc);
                w.put("MediaSSRC", media_ssrc);
                w.put(
                    "SLIEntries",
                    join(entries, ", ", |e| {
                        format!(
                            "{{First: {}, Number: {}, Picture: {}}}",
                            e.first, e.number, e.picture
                        )
                    }),
                );
            }
            RtcpPacket::FullIntraRequest {
                sender_ssrc,
                media_ssrc,
                entries,
            } => {
                w.put("MessageType", "FullIntraRequest");
                w.put("SenderSSRC", sender_ssrc);
                w.put("MediaSSRC", media_ssrc);
                w.put(
                    "FIREntries",
                    join(entries, ", ", |e| {
                        format!("{{SSRC: {}, SequenceNumber: {}}}", e.ssrc, e.sequence_number)
                    }),
                );
            }
            RtcpPacket::ReceiverEstimatedMaximumBitrate {
                sender_ssrc,
                bitrate,
                ssrcs,
            } => {
                w.put("MessageType", "ReceiverEstimatedMaximumBitrate");
                w.put("SenderSSRC", sender_ssrc);
                w.put("Bitrate", bitrate);
                w.put("SSRCs", join(ssrcs, ", ", u32::to_string));
            }
            RtcpPacket::ExtendedReport {
                sender_ssrc,
                blocks,
            } => {
                w.put("MessageType", "ExtendedReport");
                w.put("SenderSSRC", sender_ssrc);
                w.put("ReportBlockTypes", join(blocks, ", ", XrBlock::type_name));
                w.each("ReportBlock", blocks, |bw, block| {
                    bw.put("Type", block.block_type);
                    bw.put("Length", block.length);
                });
            }
            RtcpPacket::Unknown {
                packet_type,
                format,
            } => {
                w.put("MessageType", "Unknown");
                w.put("Type", packet_type);
                w.put("Format", format);
            }
        }
    }
}

impl Normalize for RtcpCompound {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        w.each("RTCPMessage", &self.packets, |pw, packet| {
            packet.normalize_into(pw)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// RTCP header plus body, length field derived from the body.
    fn packet(count: u8, pt: u8, body: &[u8]) -> Vec<u8> {
        assert_eq!(body.len() % 4, 0);
        let mut out = vec![0x80 | count, pt];
        out.extend_from_slice(&((body.len() / 4) as u16).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_be_bytes()).collect()
    }

    #[test]
    fn test_compound_sr_and_sdes() {
        let mut sr_body = words(&[0x1111, 0xaaaa_bbbb, 0xcccc_dddd, 160, 5, 800]);
        sr_body.extend(words(&[0x2222, 0x0a00_0003, 1000, 20, 0x5555, 0x10]));
        let mut data = packet(1, packet_type::SENDER_REPORT, &sr_body);

        let mut sdes_body = words(&[0x1111]);
        sdes_body.extend_from_slice(&[1, 4, b'u', b's', b'e', b'r', 0, 0]);
        data.extend(packet(1, packet_type::SOURCE_DESCRIPTION, &sdes_body));

        let compound = parse(&data).unwrap();
        assert_eq!(compound.packets.len(), 2);

        let record = compound.normalize();
        assert_eq!(record.get("RTCPMessage_1_MessageType"), Some("SenderReport"));
        assert_eq!(record.get("RTCPMessage_1_SSRC"), Some("4369"));
        assert_eq!(
            record.get("RTCPMessage_1_NTPTime"),
            Some(0xaaaa_bbbb_cccc_ddddu64.to_string().as_str())
        );
        assert_eq!(record.get("RTCPMessage_1_Report_1_FractionLost"), Some("10"));
        assert_eq!(record.get("RTCPMessage_1_Report_1_TotalLost"), Some("3"));
        assert_eq!(record.get("RTCPMessage_1_ProfileExtensions"), Some(""));
        assert_eq!(record.get("RTCPMessage_2_MessageType"), Some("SourceDescription"));
        assert_eq!(record.get("RTCPMessage_2_Chunk_1_Item_1_Type"), Some("CNAME"));
        assert_eq!(record.get("RTCPMessage_2_Chunk_1_Item_1_Text"), Some("user"));
    }

    #[test]
    fn test_goodbye_and_app() {
        let mut bye_body = words(&[1, 2]);
        bye_body.extend_from_slice(&[3, b'b', b'y', b'e']);
        let mut data = packet(2, packet_type::GOODBYE, &bye_body);

        let mut app_body = words(&[9]);
        app_body.extend_from_slice(b"TEST");
        app_body.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        data.extend(packet(3, packet_type::APPLICATION_DEFINED, &app_body));

        let record = parse(&data).unwrap().normalize();
        assert_eq!(record.get("RTCPMessage_1_Sources"), Some("1, 2"));
        assert_eq!(record.get("RTCPMessage_1_Reason"), Some("bye"));
        assert_eq!(record.get("RTCPMessage_2_SubType"), Some("3"));
        assert_eq!(record.get("RTCPMessage_2_Name"), Some("TEST"));
        assert_eq!(record.get("RTCPMessage_2_Data"), Some("DEADBEEF"));
    }

    #[test]
    fn test_feedback_messages() {
        let mut nack_body = words(&[1, 2]);
        nack_body.extend_from_slice(&[0x00, 0x64, 0x00, 0x03]);
        let mut data = packet(format::NACK, packet_type::TRANSPORT_FEEDBACK, &nack_body);

        let mut remb_body = words(&[1, 0]);
        remb_body.extend_from_slice(b"REMB");
        // One SSRC, exponent 2, mantissa 1000
        remb_body.extend_from_slice(&[1, 0x08, 0x03, 0xe8]);
        remb_body.extend(words(&[42]));
        data.extend(packet(format::AFB, packet_type::PAYLOAD_FEEDBACK, &remb_body));

        let mut fir_body = words(&[1, 0, 7]);
        fir_body.extend_from_slice(&[5, 0, 0, 0]);
        data.extend(packet(format::FIR, packet_type::PAYLOAD_FEEDBACK, &fir_body));

        let record = parse(&data).unwrap().normalize();
        assert_eq!(record.get("RTCPMessage_1_MessageType"), Some("TransportLayerNack"));
        assert_eq!(record.get("RTCPMessage_1_NackPairs"), Some("{PacketID: 100, LostMask: 3}"));
        assert_eq!(
            record.get("RTCPMessage_2_MessageType"),
            Some("ReceiverEstimatedMaximumBitrate")
        );
        assert_eq!(record.get("RTCPMessage_2_Bitrate"), Some("4000"));
        assert_eq!(record.get("RTCPMessage_2_SSRCs"), Some("42"));
        assert_eq!(record.get("RTCPMessage_3_FIREntries"), Some("{SSRC: 7, SequenceNumber: 5}"));
    }

    #[test]
    fn test_cc_feedback_report() {
        let mut body = words(&[1, 0xabcd]);
        body.extend_from_slice(&[0x00, 0x10, 0x00, 0x03]); // begin 16, 3 reports
        body.extend_from_slice(&[0x80, 0x05, 0xc0, 0x00, 0x00, 0x00, 0x00, 0x00]);
        body.extend(words(&[0x1234]));
        let data = packet(format::CCFB, packet_type::TRANSPORT_FEEDBACK, &body);

        let record = parse(&data).unwrap().normalize();
        assert_eq!(record.get("RTCPMessage_1_MessageType"), Some("CCFeedbackReport"));
        assert_eq!(record.get("RTCPMessage_1_ReportTimestamp"), Some("4660"));
        assert_eq!(record.get("RTCPMessage_1_ReportBlock_1_MediaSSRC"), Some("43981"));
        assert_eq!(record.get("RTCPMessage_1_ReportBlock_1_BeginSequence"), Some("16"));
        assert_eq!(
            record.get("RTCPMessage_1_ReportBlock_1_MetricBlock_1_Received"),
            Some("true")
        );
        assert_eq!(
            record.get("RTCPMessage_1_ReportBlock_1_MetricBlock_1_ArrivalTimeOffset"),
            Some("5")
        );
        assert_eq!(record.get("RTCPMessage_1_ReportBlock_1_MetricBlock_2_ECN"), Some("2"));
        assert_eq!(
            record.get("RTCPMessage_1_ReportBlock_1_MetricBlock_3_Received"),
            Some("false")
        );
    }

    #[test]
    fn test_extended_report_blocks() {
        let mut body = words(&[0x99]);
        body.extend_from_slice(&[4, 0, 0, 2]);
        body.extend(words(&[1, 2]));
        body.extend_from_slice(&[42, 0, 0, 0]);
        let record = parse(&packet(0, packet_type::EXTENDED_REPORT, &body))
            .unwrap()
            .normalize();

        assert_eq!(
            record.get("RTCPMessage_1_ReportBlockTypes"),
            Some("ReceiverReferenceTime, Unknown(42)")
        );
        assert_eq!(record.get("RTCPMessage_1_ReportBlock_1_Length"), Some("2"));
        assert_eq!(record.get("RTCPMessage_1_ReportBlock_2_Type"), Some("42"));
    }

    #[test]
    fn test_unknown_packet_type() {
        let record = parse(&packet(3, 195, &words(&[0]))).unwrap().normalize();
        assert_eq!(record.get("RTCPMessage_1_MessageType"), Some("Unknown"));
        assert_eq!(record.get("RTCPMessage_1_Type"), Some("195"));
        assert_eq!(record.get("RTCPMessage_1_Format"), Some("3"));

        // Transport-wide CC is not decoded
        let record = parse(&packet(15, packet_type::TRANSPORT_FEEDBACK, &words(&[1, 2])))
            .unwrap()
            .normalize();
        assert_eq!(record.get("RTCPMessage_1_MessageType"), Some("Unknown"));
    }

    #[test]
    fn test_padding_is_honored() {
        let mut data = vec![0xa0, packet_type::RECEIVER_REPORT, 0x00, 0x02];
        data.extend(words(&[0x77]));
        data.extend_from_slice(&[0, 0, 0, 4]);
        let record = parse(&data).unwrap().normalize();
        assert_eq!(record.get("RTCPMessage_1_SSRC"), Some("119"));
        assert_eq!(record.get("RTCPMessage_1_ProfileExtensions"), Some(""));
    }

    #[test]
    fn test_malformed_fails_whole_payload() {
        let mut data = packet(0, packet_type::RECEIVER_REPORT, &words(&[1]));
        // Second packet claims more bytes than present
        data.extend_from_slice(&[0x80, packet_type::RECEIVER_REPORT, 0x00, 0x05]);
        assert!(parse(&data).is_err());

        assert!(parse(&[]).is_err());
        assert!(parse(&[0x40, 200, 0, 0]).is_err());
        // Report count exceeds the body
        assert!(parse(&packet(2, packet_type::RECEIVER_REPORT, &words(&[1]))).is_err());
    }
}
