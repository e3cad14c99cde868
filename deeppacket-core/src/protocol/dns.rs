//! DNS message decoding (RFC 1035).

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use smallvec::SmallVec;

use super::reader::Reader;
use super::Normalize;
use crate::error::ProtocolError;
use crate::record::{hex, FieldWriter, HexCase};

const PROTOCOL: &str = "DNS";
const HEADER_LEN: usize = 12;

/// Upper bound on compression pointers followed for one name.
const MAX_POINTER_HOPS: usize = 64;
const MAX_LABELS: usize = 128;

/// DNS record types.
pub mod record_type {
    pub const A: u16 = 1;
    pub const NS: u16 = 2;
    pub const CNAME: u16 = 5;
    pub const PTR: u16 = 12;
    pub const MX: u16 = 15;
    pub const TXT: u16 = 16;
    pub const AAAA: u16 = 28;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsMessage {
    pub id: u16,
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl DnsMessage {
    pub fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    pub fn opcode(&self) -> u8 {
        ((self.flags >> 11) & 0x0f) as u8
    }

    pub fn is_authoritative(&self) -> bool {
        self.flags & 0x0400 != 0
    }

    pub fn is_truncated(&self) -> bool {
        self.flags & 0x0200 != 0
    }

    pub fn recursion_desired(&self) -> bool {
        self.flags & 0x0100 != 0
    }

    pub fn recursion_available(&self) -> bool {
        self.flags & 0x0080 != 0
    }

    /// Reserved bits between RA and RCODE.
    pub fn z(&self) -> u8 {
        ((self.flags >> 4) & 0x07) as u8
    }

    pub fn response_code(&self) -> u8 {
        (self.flags & 0x000f) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Type: {}, Class: {})", self.name, self.qtype, self.qclass)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub class: u16,
    pub ttl: u32,
    pub data: RecordData,
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Type: {}, Class: {}, TTL: {}, Data: {})",
            self.name, self.rtype, self.class, self.ttl, self.data
        )
    }
}

/// Resource data, interpreted for the common record types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    Address(IpAddr),
    Name(String),
    Mx { preference: u16, exchange: String },
    Txt(Vec<String>),
    Raw(Vec<u8>),
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::Address(addr) => write!(f, "{addr}"),
            RecordData::Name(name) => f.write_str(name),
            RecordData::Mx {
                preference,
                exchange,
            } => write!(f, "{preference} {exchange}"),
            RecordData::Txt(strings) => f.write_str(&strings.concat()),
            RecordData::Raw(bytes) => f.write_str(&hex(bytes, HexCase::Upper)),
        }
    }
}

/// Decode a DNS message.
///
/// Every section must hold as many entries as its header count says.
pub fn parse(data: &[u8]) -> Result<DnsMessage, ProtocolError> {
    if data.len() < HEADER_LEN {
        return Err(ProtocolError::too_short(PROTOCOL, HEADER_LEN, data.len()));
    }

    let mut r = Reader::new(PROTOCOL, data);
    let id = r.u16()?;
    let flags = r.u16()?;
    let question_count = r.u16()?;
    let answer_count = r.u16()?;
    let authority_count = r.u16()?;
    let additional_count = r.u16()?;

    let mut questions = Vec::with_capacity(question_count.min(32) as usize);
    for _ in 0..question_count {
        let name = read_name(data, &mut r)?;
        questions.push(Question {
            name,
            qtype: r.u16()?,
            qclass: r.u16()?,
        });
    }

    let answers = read_records(data, &mut r, answer_count)?;
    let authorities = read_records(data, &mut r, authority_count)?;
    let additionals = read_records(data, &mut r, additional_count)?;

    Ok(DnsMessage {
        id,
        flags,
        question_count,
        answer_count,
        authority_count,
        additional_count,
        questions,
        answers,
        authorities,
        additionals,
    })
}

fn read_records(
    message: &[u8],
    r: &mut Reader<'_>,
    count: u16,
) -> Result<Vec<ResourceRecord>, ProtocolError> {
    let mut records = Vec::with_capacity(count.min(32) as usize);
    for _ in 0..count {
        let name = read_name(message, r)?;
        let rtype = r.u16()?;
        let class = r.u16()?;
        let ttl = r.u32()?;
        let rdlength = r.u16()? as usize;
        let rdata_offset = r.position();
        let rdata = r.take(rdlength)?;

        records.push(ResourceRecord {
            name,
            rtype,
            class,
            ttl,
            data: record_data(message, rtype, rdata, rdata_offset),
        });
    }
    Ok(records)
}

/// Interpret resource data; anything that does not fit its type stays raw.
fn record_data(message: &[u8], rtype: u16, rdata: &[u8], offset: usize) -> RecordData {
    let raw = || RecordData::Raw(rdata.to_vec());
    let name_at = |start: usize| {
        let mut r = Reader::new(PROTOCOL, &message[..offset + rdata.len()]);
        r.skip(start).ok()?;
        read_name(message, &mut r).ok()
    };

    match rtype {
        record_type::A => <[u8; 4]>::try_from(rdata)
            .map(|octets| RecordData::Address(IpAddr::V4(Ipv4Addr::from(octets))))
            .unwrap_or_else(|_| raw()),
        record_type::AAAA => <[u8; 16]>::try_from(rdata)
            .map(|octets| RecordData::Address(IpAddr::V6(Ipv6Addr::from(octets))))
            .unwrap_or_else(|_| raw()),
        record_type::NS | record_type::CNAME | record_type::PTR => {
            name_at(offset).map(RecordData::Name).unwrap_or_else(raw)
        }
        record_type::MX if rdata.len() >= 3 => name_at(offset + 2)
            .map(|exchange| RecordData::Mx {
                preference: u16::from_be_bytes([rdata[0], rdata[1]]),
                exchange,
            })
            .unwrap_or_else(raw),
        record_type::TXT => {
            let mut strings = Vec::new();
            let mut r = Reader::new(PROTOCOL, rdata);
            while !r.is_empty() {
                let Ok(chunk) = r.u8().and_then(|len| r.take(len as usize)) else {
                    return raw();
                };
                strings.push(String::from_utf8_lossy(chunk).into_owned());
            }
            RecordData::Txt(strings)
        }
        _ => raw(),
    }
}

/// Read a possibly compressed domain name at the reader's position.
///
/// The reader advances past the in-place part of the name only; pointers
/// are followed within `message`.
fn read_name(message: &[u8], r: &mut Reader<'_>) -> Result<String, ProtocolError> {
    let mut labels: SmallVec<[String; 8]> = SmallVec::new();
    let mut pos = r.position();
    let mut hops = 0;
    let mut in_place = true;

    loop {
        let len = *message
            .get(pos)
            .ok_or_else(|| ProtocolError::too_short(PROTOCOL, pos + 1, message.len()))?;

        match len & 0xc0 {
            0x00 => {
                if in_place {
                    r.skip(1)?;
                }
                if len == 0 {
                    break;
                }
                let label = message
                    .get(pos + 1..pos + 1 + len as usize)
                    .ok_or_else(|| {
                        ProtocolError::too_short(PROTOCOL, pos + 1 + len as usize, message.len())
                    })?;
                if in_place {
                    r.skip(len as usize)?;
                }
                labels.push(String::from_utf8_lossy(label).into_owned());
                if labels.len() > MAX_LABELS {
                    return Err(ProtocolError::invalid(PROTOCOL, "name", "too many labels"));
                }
                pos += 1 + len as usize;
            }
            0xc0 => {
                let low = *message
                    .get(pos + 1)
                    .ok_or_else(|| ProtocolError::too_short(PROTOCOL, pos + 2, message.len()))?;
                if in_place {
                    r.skip(2)?;
                    in_place = false;
                }
                hops += 1;
                if hops > MAX_POINTER_HOPS {
                    return Err(ProtocolError::invalid(
                        PROTOCOL,
                        "name",
                        "compression pointer loop",
                    ));
                }
                pos = (((len & 0x3f) as usize) << 8) | low as usize;
            }
            _ => {
                return Err(ProtocolError::invalid(
                    PROTOCOL,
                    "name",
                    format!("unsupported label type 0x{len:02x}"),
                ))
            }
        }
    }

    // The root name has no labels and renders empty
    Ok(labels.join("."))
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Normalize for DnsMessage {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        w.put("ID", self.id);
        w.put("QR", self.is_response());
        w.put("Opcode", self.opcode());
        w.put("AA", self.is_authoritative());
        w.put("TC", self.is_truncated());
        w.put("RD", self.recursion_desired());
        w.put("RA", self.recursion_available());
        w.put("Z", self.z());
        w.put("ResponseCode", self.response_code());
        w.put("QuestionsCount", self.question_count);
        w.put("AnswerCount", self.answer_count);
        w.put("AuthorityCount", self.authority_count);
        w.put("AdditionalCount", self.additional_count);
        w.put("Queries", join(&self.questions));
        w.put("Answers", join(&self.answers));
        w.put("Authorities", join(&self.authorities));
        w.put("Additionals", join(&self.additionals));
    }
}
