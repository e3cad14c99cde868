//! Frame dissection down to the application payload.
//!
//! Link and network headers are read with `etherparse` header slices; SCTP
//! chunks and the link encapsulations etherparse does not cover are walked
//! by hand. Dissection never fails: a layer that cannot be read is simply
//! absent from the resulting [`CapturedPacket`].

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::ops::Range;

use chrono::DateTime;
use etherparse::{Ethernet2HeaderSlice, Ipv4HeaderSlice, Ipv6HeaderSlice, TcpHeaderSlice, UdpHeaderSlice};

use super::{
    ApplicationKind, ApplicationLayer, CapturedPacket, NetworkLayer, TransportKind, TransportLayer,
};
use crate::io::RawPacket;

/// Well-known ports the dissector and classifier key on.
pub mod ports {
    pub const DNS: u16 = 53;
    pub const SIP: u16 = 5060;
    pub const SIP_TLS: u16 = 5061;
    pub const DIAMETER: u16 = 3868;
    /// Alternate Diameter port seen on SCTP deployments
    pub const DIAMETER_SCTP_ALT: u16 = 1677;
}

mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const IPV6: u16 = 0x86DD;
    pub const VLAN: u16 = 0x8100;
    pub const QINQ: u16 = 0x88A8;
    pub const QINQ_LEGACY: u16 = 0x9100;
}

mod ip_protocol {
    pub const HOP_BY_HOP: u8 = 0;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
    pub const ROUTING: u8 = 43;
    pub const FRAGMENT: u8 = 44;
    pub const AH: u8 = 51;
    pub const DESTINATION: u8 = 60;
    pub const SCTP: u8 = 132;
}

/// Capture link types understood by the dissector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    /// BSD loopback, host byte order family
    Null,
    Ethernet,
    /// Raw IP, version taken from the first nibble
    Raw,
    /// OpenBSD loopback, network byte order family
    Loop,
    LinuxSll,
    LinuxSll2,
    Ipv4,
    Ipv6,
    Other(u16),
}

impl From<u16> for LinkType {
    fn from(v: u16) -> Self {
        match v {
            0 => LinkType::Null,
            1 => LinkType::Ethernet,
            12 | 14 | 101 => LinkType::Raw,
            108 => LinkType::Loop,
            113 => LinkType::LinuxSll,
            228 => LinkType::Ipv4,
            229 => LinkType::Ipv6,
            276 => LinkType::LinuxSll2,
            other => LinkType::Other(other),
        }
    }
}

/// Dissect one raw frame.
pub fn dissect(raw: &RawPacket) -> CapturedPacket {
    let mut packet = CapturedPacket {
        frame_number: raw.frame_number,
        timestamp: DateTime::from_timestamp_nanos(raw.timestamp_ns),
        network: None,
        transport: None,
        application: None,
    };

    let data = raw.data.as_ref();
    let link_type = LinkType::from(raw.link_type);
    let Some((ethertype, l3_start)) = link_layer(link_type, data) else {
        tracing::trace!(frame = raw.frame_number, ?link_type, "no network layer");
        return packet;
    };

    let Some(net) = network_layer(ethertype, data, l3_start) else {
        return packet;
    };
    packet.network = Some(net.addrs);

    let Some(protocol) = net.protocol else {
        return packet;
    };
    let Some((transport, mut payload)) = transport_layer(protocol, data, net.payload) else {
        return packet;
    };
    packet.transport = Some(transport);

    let bytes = &data[payload.clone()];
    let kind = application_kind(&transport, bytes);
    if kind == ApplicationKind::Dns && transport.kind == TransportKind::Tcp {
        payload = strip_tcp_length_prefix(bytes, payload);
    }

    if !payload.is_empty() {
        packet.application = Some(ApplicationLayer {
            kind,
            payload: raw.data.slice(payload),
        });
    }

    packet
}

/// Returns the ethertype of the network layer and where it starts.
fn link_layer(link_type: LinkType, data: &[u8]) -> Option<(u16, usize)> {
    match link_type {
        LinkType::Ethernet => {
            let eth = Ethernet2HeaderSlice::from_slice(data).ok()?;
            let mut ethertype = eth.ether_type().0;
            let mut offset = eth.slice().len();
            while matches!(
                ethertype,
                ethertype::VLAN | ethertype::QINQ | ethertype::QINQ_LEGACY
            ) {
                let tag = data.get(offset..offset + 4)?;
                ethertype = u16::from_be_bytes([tag[2], tag[3]]);
                offset += 4;
            }
            Some((ethertype, offset))
        }
        LinkType::LinuxSll => {
            let header = data.get(..16)?;
            Some((u16::from_be_bytes([header[14], header[15]]), 16))
        }
        LinkType::LinuxSll2 => {
            let header = data.get(..20)?;
            Some((u16::from_be_bytes([header[0], header[1]]), 20))
        }
        LinkType::Raw => version_ethertype(*data.first()?).map(|et| (et, 0)),
        LinkType::Ipv4 => Some((ethertype::IPV4, 0)),
        LinkType::Ipv6 => Some((ethertype::IPV6, 0)),
        LinkType::Null | LinkType::Loop => {
            let family = data.get(..4)?;
            let family = if link_type == LinkType::Loop {
                u32::from_be_bytes([family[0], family[1], family[2], family[3]])
            } else {
                let le = u32::from_le_bytes([family[0], family[1], family[2], family[3]]);
                if le > 0xffff {
                    le.swap_bytes()
                } else {
                    le
                }
            };
            match family {
                2 => Some((ethertype::IPV4, 4)),
                24 | 28 | 30 => Some((ethertype::IPV6, 4)),
                _ => None,
            }
        }
        LinkType::Other(_) => None,
    }
}

fn version_ethertype(first: u8) -> Option<u16> {
    match first >> 4 {
        4 => Some(ethertype::IPV4),
        6 => Some(ethertype::IPV6),
        _ => None,
    }
}

struct Network {
    addrs: NetworkLayer,
    /// Transport protocol, `None` for non-first fragments
    protocol: Option<u8>,
    payload: Range<usize>,
}

fn network_layer(ethertype: u16, data: &[u8], start: usize) -> Option<Network> {
    let l3 = data.get(start..)?;
    match ethertype {
        ethertype::IPV4 => {
            let ipv4 = Ipv4HeaderSlice::from_slice(l3).ok()?;
            let header_len = ipv4.slice().len();
            // Trailing link padding is not part of the datagram
            let end = start + (ipv4.total_len() as usize).min(l3.len());
            let fragment_offset = u16::from_be_bytes([l3[6], l3[7]]) & 0x1fff;

            Some(Network {
                addrs: NetworkLayer {
                    src: IpAddr::V4(Ipv4Addr::from(ipv4.source())),
                    dst: IpAddr::V4(Ipv4Addr::from(ipv4.destination())),
                },
                protocol: (fragment_offset == 0).then(|| ipv4.protocol().0),
                payload: (start + header_len).min(end)..end,
            })
        }
        ethertype::IPV6 => {
            let ipv6 = Ipv6HeaderSlice::from_slice(l3).ok()?;
            let header_len = ipv6.slice().len();
            let available = l3.len() - header_len;
            let payload_len = match ipv6.payload_length() as usize {
                // Jumbogram or unset length: take what was captured
                0 => available,
                n => n.min(available),
            };
            let body_start = start + header_len;
            let end = body_start + payload_len;
            let (protocol, skipped) = skip_extension_headers(ipv6.next_header().0, &data[body_start..end]);

            Some(Network {
                addrs: NetworkLayer {
                    src: IpAddr::V6(Ipv6Addr::from(ipv6.source())),
                    dst: IpAddr::V6(Ipv6Addr::from(ipv6.destination())),
                },
                protocol,
                payload: body_start + skipped..end,
            })
        }
        _ => None,
    }
}

/// Walk IPv6 extension headers.
///
/// Returns the upper-layer protocol (`None` for non-first fragments or a
/// truncated chain) and the number of bytes skipped.
fn skip_extension_headers(first: u8, data: &[u8]) -> (Option<u8>, usize) {
    let mut next = first;
    let mut offset = 0;

    loop {
        let header = &data[offset.min(data.len())..];
        match next {
            ip_protocol::HOP_BY_HOP | ip_protocol::ROUTING | ip_protocol::DESTINATION => {
                if header.len() < 2 {
                    return (None, offset);
                }
                let len = (header[1] as usize + 1) * 8;
                if header.len() < len {
                    return (None, offset);
                }
                next = header[0];
                offset += len;
            }
            ip_protocol::FRAGMENT => {
                if header.len() < 8 {
                    return (None, offset);
                }
                let fragment_offset = u16::from_be_bytes([header[2], header[3]]) >> 3;
                if fragment_offset != 0 {
                    return (None, offset);
                }
                next = header[0];
                offset += 8;
            }
            ip_protocol::AH => {
                if header.len() < 2 {
                    return (None, offset);
                }
                let len = (header[1] as usize + 2) * 4;
                if header.len() < len {
                    return (None, offset);
                }
                next = header[0];
                offset += len;
            }
            other => return (Some(other), offset),
        }
    }
}

fn transport_layer(
    protocol: u8,
    data: &[u8],
    range: Range<usize>,
) -> Option<(TransportLayer, Range<usize>)> {
    let segment = data.get(range.clone())?;
    match protocol {
        ip_protocol::TCP => {
            let tcp = TcpHeaderSlice::from_slice(segment).ok()?;
            let header_len = tcp.slice().len();
            Some((
                TransportLayer {
                    kind: TransportKind::Tcp,
                    src_port: tcp.source_port(),
                    dst_port: tcp.destination_port(),
                },
                range.start + header_len..range.end,
            ))
        }
        ip_protocol::UDP => {
            let udp = UdpHeaderSlice::from_slice(segment).ok()?;
            let length = udp.length() as usize;
            let end = if length >= 8 {
                (range.start + length).min(range.end)
            } else {
                range.end
            };
            Some((
                TransportLayer {
                    kind: TransportKind::Udp,
                    src_port: udp.source_port(),
                    dst_port: udp.destination_port(),
                },
                range.start + 8..end,
            ))
        }
        ip_protocol::SCTP => {
            let (layer, data_chunk) = sctp_layer(segment)?;
            let payload = match data_chunk {
                Some(chunk) => range.start + chunk.start..range.start + chunk.end,
                None => range.end..range.end,
            };
            Some((layer, payload))
        }
        _ => None,
    }
}

/// SCTP chunk types.
mod sctp_chunk {
    pub const DATA: u8 = 0;
}

const SCTP_COMMON_HEADER: usize = 12;
const SCTP_DATA_HEADER: usize = 16;

/// Read the SCTP common header and locate the user data of the first DATA
/// chunk (relative to `segment`).
fn sctp_layer(segment: &[u8]) -> Option<(TransportLayer, Option<Range<usize>>)> {
    let header = segment.get(..SCTP_COMMON_HEADER)?;
    let layer = TransportLayer {
        kind: TransportKind::Sctp,
        src_port: u16::from_be_bytes([header[0], header[1]]),
        dst_port: u16::from_be_bytes([header[2], header[3]]),
    };

    let mut offset = SCTP_COMMON_HEADER;
    while offset + 4 <= segment.len() {
        let chunk_type = segment[offset];
        let chunk_len = u16::from_be_bytes([segment[offset + 2], segment[offset + 3]]) as usize;
        if chunk_len < 4 || offset + chunk_len > segment.len() {
            break;
        }
        if chunk_type == sctp_chunk::DATA && chunk_len >= SCTP_DATA_HEADER {
            return Some((layer, Some(offset + SCTP_DATA_HEADER..offset + chunk_len)));
        }
        // Chunks are padded to 4 bytes
        offset += (chunk_len + 3) & !3;
    }

    Some((layer, None))
}

fn application_kind(transport: &TransportLayer, payload: &[u8]) -> ApplicationKind {
    if payload.is_empty() {
        return ApplicationKind::Raw;
    }
    let stream_or_datagram = matches!(transport.kind, TransportKind::Tcp | TransportKind::Udp);

    if stream_or_datagram
        && transport.has_any_port(&[ports::SIP, ports::SIP_TLS])
        && looks_like_sip(payload)
    {
        return ApplicationKind::Sip;
    }
    if transport.kind == TransportKind::Udp && looks_like_rtp(transport, payload) {
        return ApplicationKind::Rtp;
    }
    if stream_or_datagram && transport.has_port(ports::DNS) {
        return ApplicationKind::Dns;
    }
    ApplicationKind::Raw
}

/// First line is a SIP request or status line.
fn looks_like_sip(payload: &[u8]) -> bool {
    let head = &payload[..payload.len().min(1024)];
    let line_end = head.iter().position(|&b| b == b'\n').unwrap_or(head.len());
    let line = head[..line_end].strip_suffix(b"\r").unwrap_or(&head[..line_end]);
    line.starts_with(b"SIP/2.0 ") || line.ends_with(b" SIP/2.0")
}

/// RTP version 2 header outside the RTCP payload type range, on dynamic
/// ports that no other decoder owns.
fn looks_like_rtp(transport: &TransportLayer, payload: &[u8]) -> bool {
    const RTP_HEADER: usize = 12;

    if transport.src_port < 1024 || transport.dst_port < 1024 {
        return false;
    }
    if transport.has_any_port(&[
        ports::SIP,
        ports::SIP_TLS,
        ports::DIAMETER,
        ports::DIAMETER_SCTP_ALT,
    ]) {
        return false;
    }
    if payload.len() < RTP_HEADER || payload[0] >> 6 != 2 {
        return false;
    }
    // Payload types 64-95 collide with RTCP packet types
    if (64..=95).contains(&(payload[1] & 0x7f)) {
        return false;
    }
    let csrc_count = (payload[0] & 0x0f) as usize;
    let mut header_len = RTP_HEADER + 4 * csrc_count;
    if payload[0] & 0x10 != 0 {
        let Some(ext) = payload.get(header_len..header_len + 4) else {
            return false;
        };
        header_len += 4 + 4 * u16::from_be_bytes([ext[2], ext[3]]) as usize;
    }
    header_len <= payload.len()
}

/// DNS over TCP carries a two-byte length prefix.
fn strip_tcp_length_prefix(bytes: &[u8], range: Range<usize>) -> Range<usize> {
    if bytes.len() >= 2 {
        let declared = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        if declared > 0 && declared <= bytes.len() - 2 {
            return range.start + 2..range.start + 2 + declared;
        }
    }
    range
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::test_utils::*;

    #[test]
    fn test_link_type_from_u16() {
        assert_eq!(LinkType::from(1), LinkType::Ethernet);
        assert_eq!(LinkType::from(101), LinkType::Raw);
        assert_eq!(LinkType::from(113), LinkType::LinuxSll);
        assert_eq!(LinkType::from(999), LinkType::Other(999));
    }

    #[test]
    fn test_dissect_udp() {
        let frame = udp_frame([10, 0, 0, 1], [10, 0, 0, 2], 40000, 9000, b"hello");
        let packet = dissect(&raw_packet(1, 1, frame));

        let net = packet.network.unwrap();
        assert_eq!(net.src, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(net.dst, "10.0.0.2".parse::<IpAddr>().unwrap());

        let transport = packet.transport.unwrap();
        assert_eq!(transport.kind, TransportKind::Udp);
        assert_eq!(transport.src_port, 40000);
        assert_eq!(transport.dst_port, 9000);

        assert_eq!(packet.application_kind(), Some(ApplicationKind::Raw));
        assert_eq!(packet.payload(), b"hello");
    }

    #[test]
    fn test_dissect_strips_ethernet_padding() {
        let mut frame = udp_frame([10, 0, 0, 1], [10, 0, 0, 2], 40000, 9000, b"hi");
        frame.extend_from_slice(&[0u8; 16]);
        let packet = dissect(&raw_packet(1, 1, frame));
        assert_eq!(packet.payload(), b"hi");
    }

    #[test]
    fn test_dissect_vlan_tagged() {
        let udp = UdpBuilder::new().dst_port(9000).payload(b"x".to_vec()).build();
        let ip = Ipv4Builder::new().udp().payload(udp).build();
        let frame = EthernetBuilder::new().vlan(100).payload(ip).build();

        let packet = dissect(&raw_packet(1, 1, frame));
        assert!(packet.network.is_some());
        assert_eq!(packet.payload(), b"x");
    }

    #[test]
    fn test_dissect_raw_ipv6_tcp() {
        let tcp = TcpBuilder::new().dst_port(8080).payload(b"data".to_vec()).build();
        let ip = Ipv6Builder::new().next_header(6).payload(tcp).build();

        let packet = dissect(&raw_packet(1, 101, ip));
        let net = packet.network.unwrap();
        assert_eq!(net.src, "fe80::1".parse::<IpAddr>().unwrap());
        assert_eq!(packet.transport.unwrap().kind, TransportKind::Tcp);
        assert_eq!(packet.payload(), b"data");
    }

    #[test]
    fn test_dissect_sctp_first_data_chunk() {
        let sctp = SctpBuilder::new()
            .with_sack()
            .src_port(5000)
            .dst_port(3868)
            .payload(vec![1, 2, 3, 4, 5])
            .build();
        let ip = Ipv4Builder::new().sctp().payload(sctp).build();
        let frame = EthernetBuilder::new().payload(ip).build();

        let packet = dissect(&raw_packet(1, 1, frame));
        let transport = packet.transport.unwrap();
        assert_eq!(transport.kind, TransportKind::Sctp);
        assert!(transport.has_port(3868));
        assert_eq!(packet.payload(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_dissect_non_first_fragment_has_no_transport() {
        let udp = UdpBuilder::new().payload(b"frag".to_vec()).build();
        let ip = Ipv4Builder::new().udp().fragment_offset(10).payload(udp).build();
        let frame = EthernetBuilder::new().payload(ip).build();

        let packet = dissect(&raw_packet(1, 1, frame));
        assert!(packet.network.is_some());
        assert!(packet.transport.is_none());
        assert!(packet.application.is_none());
    }

    #[test]
    fn test_dissect_sip_and_dns_tagging() {
        let sip = b"OPTIONS sip:a@b SIP/2.0\r\n\r\n";
        let packet = dissect(&raw_packet(1, 1, udp_frame([1, 1, 1, 1], [2, 2, 2, 2], 5060, 5060, sip)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Sip));

        let not_sip = b"\x00\x01binary";
        let packet = dissect(&raw_packet(1, 1, udp_frame([1, 1, 1, 1], [2, 2, 2, 2], 5060, 5060, not_sip)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Raw));

        let dns = [0u8; 12];
        let packet = dissect(&raw_packet(1, 1, udp_frame([1, 1, 1, 1], [2, 2, 2, 2], 40000, 53, &dns)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Dns));
    }

    #[test]
    fn test_dissect_dns_over_tcp_strips_prefix() {
        let mut payload = vec![0x00, 0x0c];
        payload.extend_from_slice(&[0xab; 12]);
        let packet = dissect(&raw_packet(1, 1, tcp_frame([1, 1, 1, 1], [2, 2, 2, 2], 40000, 53, &payload)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Dns));
        assert_eq!(packet.payload(), &[0xab; 12]);
    }

    #[test]
    fn test_rtp_heuristic() {
        let mut rtp = vec![0x80, 0x00, 0x00, 0x01];
        rtp.extend_from_slice(&[0u8; 8]);
        rtp.extend_from_slice(b"voice");
        let packet = dissect(&raw_packet(1, 1, udp_frame([1, 1, 1, 1], [2, 2, 2, 2], 20000, 20002, &rtp)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Rtp));

        // Receiver report (PT 201) is not RTP
        let mut rtcp = vec![0x80, 201, 0x00, 0x01];
        rtcp.extend_from_slice(&[0u8; 4]);
        let packet = dissect(&raw_packet(1, 1, udp_frame([1, 1, 1, 1], [2, 2, 2, 2], 20001, 20003, &rtcp)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Raw));

        // Well-known low port
        let packet = dissect(&raw_packet(1, 1, udp_frame([1, 1, 1, 1], [2, 2, 2, 2], 123, 20002, &rtp)));
        assert_eq!(packet.application_kind(), Some(ApplicationKind::Raw));
    }

    #[test]
    fn test_dissect_unknown_link_type() {
        let packet = dissect(&raw_packet(3, 999, vec![0u8; 64]));
        assert_eq!(packet.frame_number, 3);
        assert!(packet.network.is_none());
    }

    #[test]
    fn test_dissect_linux_sll() {
        let udp = UdpBuilder::new().dst_port(9000).payload(b"sll".to_vec()).build();
        let ip = Ipv4Builder::new().udp().payload(udp).build();
        let mut frame = vec![0u8; 14];
        frame.extend_from_slice(&0x0800u16.to_be_bytes());
        frame.extend_from_slice(&ip);

        let packet = dissect(&raw_packet(1, 113, frame));
        assert_eq!(packet.payload(), b"sll");
    }
}
