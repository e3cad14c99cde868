//! Diameter message decoding (RFC 6733).
//!
//! The header and AVP framing are decoded for every message. AVPs and
//! commands found in the built-in [`dictionary`] additionally get a name,
//! a data type and a typed value, and dictionary `Grouped` AVPs are decoded
//! recursively.

pub mod dictionary;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, SecondsFormat};

use self::dictionary::AvpDataType;
use super::reader::Reader;
use super::Normalize;
use crate::error::ProtocolError;
use crate::record::{hex, FieldWriter, HexCase};

const PROTOCOL: &str = "Diameter";
const HEADER_LEN: usize = 20;
const AVP_HEADER_LEN: usize = 8;
const VENDOR_ID_LEN: usize = 4;
const MAX_GROUP_DEPTH: usize = 16;

/// Seconds between the NTP epoch (1900) and the Unix epoch.
const NTP_UNIX_OFFSET: i64 = 2_208_988_800;

/// Command flag bits.
pub mod command_flags {
    pub const REQUEST: u8 = 0x80;
    pub const PROXIABLE: u8 = 0x40;
    pub const ERROR: u8 = 0x20;
    pub const RETRANSMITTED: u8 = 0x10;
}

/// AVP flag bits.
pub mod avp_flags {
    pub const VENDOR: u8 = 0x80;
    pub const MANDATORY: u8 = 0x40;
    pub const PROTECTED: u8 = 0x20;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiameterMessage {
    pub version: u8,
    pub length: u32,
    pub flags: u8,
    pub command_code: u32,
    pub application_id: u32,
    pub hop_by_hop_id: u32,
    pub end_to_end_id: u32,
    pub avps: Vec<Avp>,
}

impl DiameterMessage {
    pub fn is_request(&self) -> bool {
        self.flags & command_flags::REQUEST != 0
    }

    pub fn is_proxiable(&self) -> bool {
        self.flags & command_flags::PROXIABLE != 0
    }

    pub fn is_error(&self) -> bool {
        self.flags & command_flags::ERROR != 0
    }

    pub fn is_potentially_retransmitted(&self) -> bool {
        self.flags & command_flags::RETRANSMITTED != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avp {
    pub code: u32,
    pub flags: u8,
    pub vendor_id: Option<u32>,
    /// Header plus data, without padding
    pub length: u32,
    pub data: Vec<u8>,
    /// Decoded members of a dictionary `Grouped` AVP
    pub children: Vec<Avp>,
}

impl Avp {
    pub fn is_vendor_specific(&self) -> bool {
        self.flags & avp_flags::VENDOR != 0
    }

    pub fn is_mandatory(&self) -> bool {
        self.flags & avp_flags::MANDATORY != 0
    }

    pub fn is_protected(&self) -> bool {
        self.flags & avp_flags::PROTECTED != 0
    }

    pub fn padded_length(&self) -> u32 {
        (self.length + 3) & !3
    }

    pub fn definition(&self) -> Option<&'static dictionary::AvpDefinition> {
        dictionary::avp(self.vendor_id.unwrap_or(0), self.code)
    }

    /// Value rendered according to the dictionary data type.
    ///
    /// `None` for unknown AVPs, grouped AVPs and data that does not fit its
    /// type.
    pub fn typed_value(&self) -> Option<String> {
        let data = self.data.as_slice();
        Some(match self.definition()?.data_type {
            AvpDataType::Grouped => return None,
            AvpDataType::OctetString => hex(data, HexCase::Upper),
            AvpDataType::Integer32 => i32::from_be_bytes(data.try_into().ok()?).to_string(),
            AvpDataType::Integer64 => i64::from_be_bytes(data.try_into().ok()?).to_string(),
            AvpDataType::Unsigned32 | AvpDataType::Enumerated => {
                u32::from_be_bytes(data.try_into().ok()?).to_string()
            }
            AvpDataType::Unsigned64 => u64::from_be_bytes(data.try_into().ok()?).to_string(),
            AvpDataType::Float32 => f32::from_be_bytes(data.try_into().ok()?).to_string(),
            AvpDataType::Float64 => f64::from_be_bytes(data.try_into().ok()?).to_string(),
            AvpDataType::Utf8String
            | AvpDataType::DiameterIdentity
            | AvpDataType::DiameterUri => std::str::from_utf8(data).ok()?.to_string(),
            AvpDataType::Address => address(data)?.to_string(),
            AvpDataType::Time => {
                let ntp = u32::from_be_bytes(data.try_into().ok()?);
                DateTime::from_timestamp(ntp as i64 - NTP_UNIX_OFFSET, 0)?
                    .to_rfc3339_opts(SecondsFormat::Secs, true)
            }
        })
    }
}

/// RFC 6733 §4.3.1 Address: 2-byte address family then the address.
fn address(data: &[u8]) -> Option<IpAddr> {
    let (family, addr) = data.split_at_checked(2)?;
    match u16::from_be_bytes([family[0], family[1]]) {
        1 => Some(IpAddr::V4(Ipv4Addr::from(<[u8; 4]>::try_from(addr).ok()?))),
        2 => Some(IpAddr::V6(Ipv6Addr::from(<[u8; 16]>::try_from(addr).ok()?))),
        _ => None,
    }
}

/// Decode one Diameter message from the start of `data`.
pub fn parse(data: &[u8]) -> Result<DiameterMessage, ProtocolError> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::too_short(PROTOCOL, HEADER_LEN, data.len()));
    }

    let mut r = Reader::new(PROTOCOL, data);
    let version = r.u8()?;
    if version != 1 {
        return Err(ProtocolError::invalid(
            PROTOCOL,
            "version",
            format!("expected 1, got {version}"),
        ));
    }
    let length = r.u24()?;
    if (length as usize) < HEADER_LEN {
        return Err(ProtocolError::invalid(
            PROTOCOL,
            "length",
            format!("{length} is shorter than the header"),
        ));
    }
    if length as usize > data.len() {
        return Err(ProtocolError::too_short(PROTOCOL, length as usize, data.len()));
    }

    let flags = r.u8()?;
    let command_code = r.u24()?;
    let application_id = r.u32()?;
    let hop_by_hop_id = r.u32()?;
    let end_to_end_id = r.u32()?;
    let avps = parse_avps(&data[HEADER_LEN..length as usize], 0)?;

    Ok(DiameterMessage {
        version,
        length,
        flags,
        command_code,
        application_id,
        hop_by_hop_id,
        end_to_end_id,
        avps,
    })
}

fn parse_avps(data: &[u8], depth: usize) -> Result<Vec<Avp>, ProtocolError> {
    if depth > MAX_GROUP_DEPTH {
        return Err(ProtocolError::invalid(
            PROTOCOL,
            "grouped AVP",
            "nesting too deep",
        ));
    }

    let mut avps = Vec::new();
    let mut r = Reader::new(PROTOCOL, data);
    while !r.is_empty() {
        let code = r.u32()?;
        let flags = r.u8()?;
        let length = r.u24()?;

        let vendor_specific = flags & avp_flags::VENDOR != 0;
        let header_len = if vendor_specific {
            AVP_HEADER_LEN + VENDOR_ID_LEN
        } else {
            AVP_HEADER_LEN
        };
        if (length as usize) < header_len {
            return Err(ProtocolError::invalid(
                PROTOCOL,
                "AVP length",
                format!("{length} is shorter than the {header_len}-byte header"),
            ));
        }
        let vendor_id = if vendor_specific { Some(r.u32()?) } else { None };
        let value = r.take(length as usize - header_len)?.to_vec();

        // The final AVP of a message may come without its padding
        let padding = ((length as usize + 3) & !3) - length as usize;
        r.skip(padding.min(r.remaining()))?;

        let mut avp = Avp {
            code,
            flags,
            vendor_id,
            length,
            data: value,
            children: Vec::new(),
        };
        if avp
            .definition()
            .is_some_and(|def| def.data_type == AvpDataType::Grouped)
        {
            avp.children = parse_avps(&avp.data, depth + 1)?;
        }
        avps.push(avp);
    }
    Ok(avps)
}

fn put_avp(w: &mut FieldWriter<'_>, avp: &Avp) {
    w.put("Code", avp.code);
    w.put("VendorSpecific", avp.is_vendor_specific());
    w.put("Mandatory", avp.is_mandatory());
    w.put("Protected", avp.is_protected());
    if let Some(vendor_id) = avp.vendor_id {
        w.put("VendorID", vendor_id);
    }
    w.put("Length", avp.length);
    w.put("PaddedLength", avp.padded_length());
    w.put_hex("Data", &avp.data, HexCase::Upper);

    if let Some(def) = avp.definition() {
        w.put("ExtendedAttribute_Name", &def.name);
        w.put("ExtendedAttribute_DataType", def.data_type);
        if let Some(value) = avp.typed_value() {
            w.put("ExtendedAttribute_TypedValueType", def.data_type);
            w.put("ExtendedAttribute_TypedValue", value);
        }
    }
    w.each("AVP", &avp.children, put_avp);
}

impl Normalize for DiameterMessage {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        w.put("Version", self.version);
        w.put("Length", self.length);
        w.put("Flags", format!("0x{:02x}", self.flags));
        w.put("CommandCode", self.command_code);
        w.put("ApplicationID", self.application_id);
        w.put("HopByHopID", self.hop_by_hop_id);
        w.put("EndToEndID", self.end_to_end_id);
        w.put("RequestBit", self.is_request());
        w.put("ProxiableBit", self.is_proxiable());
        w.put("ErrorBit", self.is_error());
        w.put("IsAnswer", !self.is_request());
        w.put("IsPotentiallyRetransmitted", self.is_potentially_retransmitted());

        if let Some(cmd) = dictionary::command(self.command_code) {
            let (name, abbreviation) = if self.is_request() {
                (&cmd.request_name, &cmd.request_abbreviation)
            } else {
                (&cmd.answer_name, &cmd.answer_abbreviation)
            };
            w.put("MessageExtendedAttribute_Name", name);
            w.put("MessageExtendedAttribute_AbbreviatedName", abbreviation);
        }

        w.each("AVP", &self.avps, put_avp);
    }
}
