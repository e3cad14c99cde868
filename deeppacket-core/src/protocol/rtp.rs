//! RTP packet decoding (RFC 3550).

use smallvec::SmallVec;

use super::reader::Reader;
use super::Normalize;
use crate::error::ProtocolError;
use crate::record::{FieldWriter, HexCase};

const PROTOCOL: &str = "RTP";

/// RTP blobs render in lowercase.
const HEX_CASE: HexCase = HexCase::Lower;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub csrc: SmallVec<[u32; 4]>,
    pub extension_header: Option<ExtensionHeader>,
    /// Payload with padding removed
    pub payload: Vec<u8>,
    /// Header bytes, extension included
    pub contents: Vec<u8>,
}

/// RFC 3550 §5.3.1 header extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionHeader {
    pub id: u16,
    /// Length in 32-bit words, as on the wire
    pub length: u16,
    pub data: Vec<u8>,
}

pub fn parse(data: &[u8]) -> Result<RtpPacket, ProtocolError> {
    let mut r = Reader::new(PROTOCOL, data);
    let b0 = r.u8()?;
    let b1 = r.u8()?;

    let version = b0 >> 6;
    if version != 2 {
        return Err(ProtocolError::invalid(
            PROTOCOL,
            "version",
            format!("expected 2, got {version}"),
        ));
    }
    let padding = b0 & 0x20 != 0;
    let extension = b0 & 0x10 != 0;
    let csrc_count = b0 & 0x0f;

    let sequence_number = r.u16()?;
    let timestamp = r.u32()?;
    let ssrc = r.u32()?;

    let mut csrc = SmallVec::new();
    for _ in 0..csrc_count {
        csrc.push(r.u32()?);
    }

    let extension_header = if extension {
        let id = r.u16()?;
        let length = r.u16()?;
        let data = r.take(length as usize * 4)?.to_vec();
        Some(ExtensionHeader { id, length, data })
    } else {
        None
    };

    let contents = data[..r.position()].to_vec();
    let mut payload = r.rest();
    if padding {
        let pad = payload.last().copied().unwrap_or(0) as usize;
        if pad == 0 || pad > payload.len() {
            return Err(ProtocolError::invalid(
                PROTOCOL,
                "padding",
                format!("{pad} bytes of padding in a {}-byte payload", payload.len()),
            ));
        }
        payload = &payload[..payload.len() - pad];
    }

    Ok(RtpPacket {
        version,
        padding,
        extension,
        csrc_count,
        marker: b1 & 0x80 != 0,
        payload_type: b1 & 0x7f,
        sequence_number,
        timestamp,
        ssrc,
        csrc,
        extension_header,
        payload: payload.to_vec(),
        contents,
    })
}

impl Normalize for RtpPacket {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        w.put("Version", self.version);
        w.put("Padding", self.padding);
        w.put("Extension", self.extension);
        w.put("CC", self.csrc_count);
        w.put("Marker", self.marker);
        w.put("PayloadType", self.payload_type);
        w.put("SequenceNumber", self.sequence_number);
        w.put("Timestamp", self.timestamp);
        w.put("Ssrc", self.ssrc);
        w.put(
            "Csrc",
            self.csrc
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        );

        let (id, length, data) = match &self.extension_header {
            Some(ext) => (ext.id, ext.length, ext.data.as_slice()),
            None => (0, 0, &[][..]),
        };
        w.put("ExtensionHeaderID", id);
        w.put("ExtensionHeaderLength", length);
        w.put_hex("ExtensionHeader", data, HEX_CASE);
        w.put_hex("Payload", &self.payload, HEX_CASE);
        w.put_hex("Contents", &self.contents, HEX_CASE);
    }
}
