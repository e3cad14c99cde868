//! Native protocol decoders and their record normalizers.
//!
//! Each decoder is a pure function from payload bytes to a protocol-native
//! structure that fails on malformed input. Every native structure
//! implements [`Normalize`], which flattens it into a [`Record`].
//!
//! ## Supported Protocols
//!
//! | Protocol | Decoder | Tag |
//! |----------|---------|-----|
//! | SIP (+ SDP body) | [`sip::parse`] | `sip` |
//! | DNS | [`dns::parse`] | `dns` |
//! | RTP | [`rtp::parse`] | `rtp` |
//! | RTCP (compound) | [`rtcp::parse`] | `rtcp` |
//! | Diameter | [`diameter::parse`] | `diameter` |
//!
//! HTTP/2 frames are not decoded here; they go through
//! [`crate::http2::FrameReassembler`].

pub mod diameter;
pub mod dns;
mod reader;
pub mod rtcp;
pub mod rtp;
pub mod sdp;
pub mod sip;

use crate::classify::ProtocolKind;
use crate::error::ProtocolError;
use crate::record::{FieldWriter, Record};

/// Flattening of a native structure into record fields.
pub trait Normalize {
    /// Write this value's fields through `w`.
    fn normalize_into(&self, w: &mut FieldWriter<'_>);

    /// Normalize into a fresh record.
    fn normalize(&self) -> Record {
        let mut record = Record::new();
        self.normalize_into(&mut FieldWriter::new(&mut record));
        record
    }
}

/// The closed set of natively decoded messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeMessage {
    Sip(sip::SipMessage),
    Dns(dns::DnsMessage),
    Rtp(rtp::RtpPacket),
    Rtcp(rtcp::RtcpCompound),
    Diameter(diameter::DiameterMessage),
}

impl NativeMessage {
    /// Decode `payload` with the decoder for `kind`.
    ///
    /// Returns `None` for kinds without a native decoder.
    pub fn decode(kind: ProtocolKind, payload: &[u8]) -> Option<Result<Self, ProtocolError>> {
        let decoded = match kind {
            ProtocolKind::Sip => sip::parse(payload).map(NativeMessage::Sip),
            ProtocolKind::Dns => dns::parse(payload).map(NativeMessage::Dns),
            ProtocolKind::Rtp => rtp::parse(payload).map(NativeMessage::Rtp),
            ProtocolKind::Rtcp => rtcp::parse(payload).map(NativeMessage::Rtcp),
            ProtocolKind::Diameter => diameter::parse(payload).map(NativeMessage::Diameter),
            ProtocolKind::HttpFrame | ProtocolKind::Unrecognized => return None,
        };
        Some(decoded)
    }

    pub fn kind(&self) -> ProtocolKind {
        match self {
            NativeMessage::Sip(_) => ProtocolKind::Sip,
            NativeMessage::Dns(_) => ProtocolKind::Dns,
            NativeMessage::Rtp(_) => ProtocolKind::Rtp,
            NativeMessage::Rtcp(_) => ProtocolKind::Rtcp,
            NativeMessage::Diameter(_) => ProtocolKind::Diameter,
        }
    }
}

impl Normalize for NativeMessage {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        match self {
            NativeMessage::Sip(msg) => msg.normalize_into(w),
            NativeMessage::Dns(msg) => msg.normalize_into(w),
            NativeMessage::Rtp(pkt) => pkt.normalize_into(w),
            NativeMessage::Rtcp(compound) => compound.normalize_into(w),
            NativeMessage::Diameter(msg) => msg.normalize_into(w),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_dispatch() {
        let rtcp = [0x80, 201, 0x00, 0x01, 0x00, 0x00, 0x00, 0x07];
        let msg = NativeMessage::decode(ProtocolKind::Rtcp, &rtcp)
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind(), ProtocolKind::Rtcp);

        assert!(NativeMessage::decode(ProtocolKind::HttpFrame, b"x").is_none());
        assert!(NativeMessage::decode(ProtocolKind::Dns, b"short")
            .unwrap()
            .is_err());
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let rtcp = [0x80, 201, 0x00, 0x01, 0x00, 0x00, 0x00, 0x07];
        let msg = NativeMessage::decode(ProtocolKind::Rtcp, &rtcp)
            .unwrap()
            .unwrap();

        let first = msg.normalize();
        let second = msg.normalize();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.get("RTCPMessage_1_SSRC"), Some("7"));
    }
}
