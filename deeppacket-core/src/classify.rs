//! Packet classification.
//!
//! [`classify`] picks the one protocol path that owns a dissected packet's
//! payload, or discards the packet. Rules are tried in a fixed order and
//! the first match wins:
//!
//! | # | Condition | Result |
//! |---|-----------|--------|
//! | 1 | no network layer, or both addresses unspecified | discard |
//! | 2 | application layer tagged SIP | SIP |
//! | 3 | application layer tagged RTP | RTP |
//! | 4 | application layer tagged DNS | DNS |
//! | 5 | UDP with a payload | RTCP |
//! | 6 | SCTP on 3868 or 1677 with a payload | Diameter |
//! | 7 | TCP on 3868 with a payload | Diameter |
//! | 8 | any other payload | HTTP/2 frames |
//! | 9 | otherwise | discard |

use std::fmt;

use crate::packet::{ports, ApplicationKind, CapturedPacket, TransportKind};

/// Protocol paths a packet can be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProtocolKind {
    Sip,
    Dns,
    Rtp,
    Rtcp,
    Diameter,
    HttpFrame,
    Unrecognized,
}

impl ProtocolKind {
    /// Protocol tag written on emitted records.
    pub fn tag(&self) -> &'static str {
        match self {
            ProtocolKind::Sip => "sip",
            ProtocolKind::Dns => "dns",
            ProtocolKind::Rtp => "rtp",
            ProtocolKind::Rtcp => "rtcp",
            ProtocolKind::Diameter => "diameter",
            ProtocolKind::HttpFrame => "http",
            ProtocolKind::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Why a packet produced no route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscardReason {
    NoNetworkLayer,
    /// Source and destination are both `0.0.0.0` or `::`
    UnspecifiedAddresses,
    NoPayload,
}

impl DiscardReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscardReason::NoNetworkLayer => "no network layer",
            DiscardReason::UnspecifiedAddresses => "unspecified addresses",
            DiscardReason::NoPayload => "no payload",
        }
    }
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing decision for one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'a> {
    Route {
        kind: ProtocolKind,
        payload: &'a [u8],
    },
    Discard(DiscardReason),
}

impl Classification<'_> {
    /// The routed kind, or [`ProtocolKind::Unrecognized`] for a discard.
    pub fn kind(&self) -> ProtocolKind {
        match self {
            Classification::Route { kind, .. } => *kind,
            Classification::Discard(_) => ProtocolKind::Unrecognized,
        }
    }
}

/// Decide which protocol path owns `packet`.
pub fn classify(packet: &CapturedPacket) -> Classification<'_> {
    let Some(network) = packet.network else {
        return Classification::Discard(DiscardReason::NoNetworkLayer);
    };
    if network.is_unspecified_pair() {
        return Classification::Discard(DiscardReason::UnspecifiedAddresses);
    }

    let payload = packet.payload();
    let route = |kind| Classification::Route { kind, payload };

    match packet.application_kind() {
        Some(ApplicationKind::Sip) => return route(ProtocolKind::Sip),
        Some(ApplicationKind::Rtp) => return route(ProtocolKind::Rtp),
        Some(ApplicationKind::Dns) => return route(ProtocolKind::Dns),
        Some(ApplicationKind::Raw) | None => {}
    }

    if payload.is_empty() {
        return Classification::Discard(DiscardReason::NoPayload);
    }

    match packet.transport {
        Some(t) if t.kind == TransportKind::Udp => route(ProtocolKind::Rtcp),
        Some(t)
            if t.kind == TransportKind::Sctp
                && t.has_any_port(&[ports::DIAMETER, ports::DIAMETER_SCTP_ALT]) =>
        {
            route(ProtocolKind::Diameter)
        }
        Some(t) if t.kind == TransportKind::Tcp && t.has_port(ports::DIAMETER) => {
            route(ProtocolKind::Diameter)
        }
        _ => route(ProtocolKind::HttpFrame),
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use bytes::Bytes;
    use chrono::DateTime;

    use super::*;
    use crate::packet::test_utils::*;
    use crate::packet::{dissect, ApplicationLayer, NetworkLayer, TransportLayer};

    const A: [u8; 4] = [10, 0, 0, 1];
    const B: [u8; 4] = [10, 0, 0, 2];

    fn kind_of(frame: Vec<u8>) -> ProtocolKind {
        classify(&dissect(&raw_packet(1, 1, frame))).kind()
    }

    fn bare_packet(
        network: Option<NetworkLayer>,
        transport: Option<TransportLayer>,
        application: Option<ApplicationLayer>,
    ) -> CapturedPacket {
        CapturedPacket {
            frame_number: 1,
            timestamp: DateTime::from_timestamp_nanos(0),
            network,
            transport,
            application,
        }
    }

    fn rtp_payload() -> Vec<u8> {
        let mut rtp = vec![0x80, 0x00, 0x00, 0x01];
        rtp.extend_from_slice(&[0u8; 8]);
        rtp.extend_from_slice(b"voice");
        rtp
    }

    #[test]
    fn test_no_network_layer_discarded() {
        let packet = bare_packet(None, None, None);
        assert_eq!(
            classify(&packet),
            Classification::Discard(DiscardReason::NoNetworkLayer)
        );
    }

    #[test]
    fn test_unspecified_addresses_discarded() {
        let app = ApplicationLayer {
            kind: ApplicationKind::Raw,
            payload: Bytes::from_static(b"data"),
        };
        let v4 = NetworkLayer {
            src: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dst: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };
        let v6 = NetworkLayer {
            src: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            dst: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        for network in [v4, v6] {
            let packet = bare_packet(Some(network), None, Some(app.clone()));
            assert_eq!(
                classify(&packet),
                Classification::Discard(DiscardReason::UnspecifiedAddresses)
            );
        }

        // Only one side unspecified still routes
        let half = NetworkLayer {
            src: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            dst: IpAddr::V4(Ipv4Addr::new(255, 255, 255, 255)),
        };
        let packet = bare_packet(Some(half), None, Some(app));
        assert_eq!(classify(&packet).kind(), ProtocolKind::HttpFrame);
    }

    #[test]
    fn test_tagged_application_layers() {
        let sip = b"REGISTER sip:example.com SIP/2.0\r\n\r\n";
        assert_eq!(kind_of(udp_frame(A, B, 5060, 5060, sip)), ProtocolKind::Sip);
        assert_eq!(kind_of(tcp_frame(A, B, 40000, 5061, sip)), ProtocolKind::Sip);
        assert_eq!(
            kind_of(udp_frame(A, B, 40000, 53, &[0u8; 12])),
            ProtocolKind::Dns
        );
        assert_eq!(
            kind_of(udp_frame(A, B, 16384, 16386, &rtp_payload())),
            ProtocolKind::Rtp
        );
    }

    #[test]
    fn test_sip_wins_over_later_rules() {
        // A SIP-tagged layer routes to SIP even when the transport is UDP
        let payload = Bytes::from_static(b"SIP/2.0 200 OK\r\n\r\n");
        let packet = bare_packet(
            Some(NetworkLayer {
                src: IpAddr::from(A),
                dst: IpAddr::from(B),
            }),
            Some(TransportLayer {
                kind: TransportKind::Udp,
                src_port: 5060,
                dst_port: 5060,
            }),
            Some(ApplicationLayer {
                kind: ApplicationKind::Sip,
                payload: payload.clone(),
            }),
        );
        assert_eq!(
            classify(&packet),
            Classification::Route {
                kind: ProtocolKind::Sip,
                payload: &payload,
            }
        );
    }

    #[test]
    fn test_udp_payload_is_rtcp_on_any_port() {
        let rr = [0x80, 201, 0x00, 0x01, 0x00, 0x00, 0x00, 0x07];
        assert_eq!(kind_of(udp_frame(A, B, 9, 9, &rr)), ProtocolKind::Rtcp);
        assert_eq!(kind_of(udp_frame(A, B, 40001, 40001, b"?")), ProtocolKind::Rtcp);
    }

    #[test]
    fn test_empty_payload_discarded() {
        let packet = dissect(&raw_packet(1, 1, udp_frame(A, B, 40000, 40002, b"")));
        assert_eq!(
            classify(&packet),
            Classification::Discard(DiscardReason::NoPayload)
        );
        assert_eq!(kind_of(tcp_frame(A, B, 40000, 3868, b"")), ProtocolKind::Unrecognized);
    }

    #[test]
    fn test_sctp_diameter_ports() {
        let avp = [0x01, 0x00, 0x00, 0x14];
        assert_eq!(kind_of(sctp_frame(A, B, 3868, 40000, &avp)), ProtocolKind::Diameter);
        assert_eq!(kind_of(sctp_frame(A, B, 40000, 1677, &avp)), ProtocolKind::Diameter);
        assert_eq!(kind_of(sctp_frame(A, B, 40000, 2905, &avp)), ProtocolKind::HttpFrame);
    }

    #[test]
    fn test_tcp_diameter_port() {
        let avp = [0x01, 0x00, 0x00, 0x14];
        assert_eq!(kind_of(tcp_frame(A, B, 3868, 40000, &avp)), ProtocolKind::Diameter);
        // 1677 is only a Diameter port on SCTP
        assert_eq!(kind_of(tcp_frame(A, B, 1677, 40000, &avp)), ProtocolKind::HttpFrame);
    }

    #[test]
    fn test_other_tcp_payload_is_http_frame() {
        let frame = tcp_frame(A, B, 50000, 8080, &[0, 0, 0, 4, 0, 0, 0, 0, 0]);
        let packet = dissect(&raw_packet(1, 1, frame));
        assert_eq!(
            classify(&packet),
            Classification::Route {
                kind: ProtocolKind::HttpFrame,
                payload: &[0, 0, 0, 4, 0, 0, 0, 0, 0],
            }
        );
    }

    #[test]
    fn test_tags() {
        let tags: Vec<_> = [
            ProtocolKind::Sip,
            ProtocolKind::Dns,
            ProtocolKind::Rtp,
            ProtocolKind::Rtcp,
            ProtocolKind::Diameter,
            ProtocolKind::HttpFrame,
        ]
        .iter()
        .map(ProtocolKind::tag)
        .collect();
        assert_eq!(tags, vec!["sip", "dns", "rtp", "rtcp", "diameter", "http"]);
    }
}
