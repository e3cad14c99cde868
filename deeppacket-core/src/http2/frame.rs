//! HTTP/2 frame layout (RFC 7540 §4 and §6).
//!
//! [`FrameReader`] walks frames laid end to end in one buffer and applies
//! the per-type layout checks a conforming framer makes before handing a
//! frame out. Only DATA and HEADERS bodies are surfaced; every other frame
//! type is validated and then reported as [`Frame::Other`].

use thiserror::Error;

/// HTTP/2 client connection preface
pub const CONNECTION_PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// HTTP/2 frame types (RFC 7540 §6)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Headers,
    Priority,
    RstStream,
    Settings,
    PushPromise,
    Ping,
    GoAway,
    WindowUpdate,
    Continuation,
    Unknown(u8),
}

impl From<u8> for FrameType {
    fn from(v: u8) -> Self {
        match v {
            0x0 => FrameType::Data,
            0x1 => FrameType::Headers,
            0x2 => FrameType::Priority,
            0x3 => FrameType::RstStream,
            0x4 => FrameType::Settings,
            0x5 => FrameType::PushPromise,
            0x6 => FrameType::Ping,
            0x7 => FrameType::GoAway,
            0x8 => FrameType::WindowUpdate,
            0x9 => FrameType::Continuation,
            other => FrameType::Unknown(other),
        }
    }
}

impl FrameType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameType::Data => "DATA",
            FrameType::Headers => "HEADERS",
            FrameType::Priority => "PRIORITY",
            FrameType::RstStream => "RST_STREAM",
            FrameType::Settings => "SETTINGS",
            FrameType::PushPromise => "PUSH_PROMISE",
            FrameType::Ping => "PING",
            FrameType::GoAway => "GOAWAY",
            FrameType::WindowUpdate => "WINDOW_UPDATE",
            FrameType::Continuation => "CONTINUATION",
            FrameType::Unknown(_) => "UNKNOWN",
        }
    }
}

/// HTTP/2 frame flags
pub mod flags {
    pub const END_STREAM: u8 = 0x1;
    pub const ACK: u8 = 0x1;
    pub const END_HEADERS: u8 = 0x4;
    pub const PADDED: u8 = 0x8;
    pub const PRIORITY: u8 = 0x20;
}

/// Frame layout violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame header needs 9 bytes, have {have}")]
    ShortHeader { have: usize },

    #[error("{frame_type} frame declares {length} payload bytes, have {have}")]
    Truncated {
        frame_type: &'static str,
        length: usize,
        have: usize,
    },

    #[error("{frame_type} frame on stream 0")]
    StreamRequired { frame_type: &'static str },

    #[error("{frame_type} frame on stream {stream_id}, expected stream 0")]
    ConnectionOnly {
        frame_type: &'static str,
        stream_id: u32,
    },

    #[error("{frame_type} frame pads {pad} bytes with {available} available")]
    PaddingTooLong {
        frame_type: &'static str,
        pad: usize,
        available: usize,
    },

    #[error("{frame_type} frame has invalid length {length}")]
    InvalidLength {
        frame_type: &'static str,
        length: usize,
    },

    #[error("WINDOW_UPDATE with zero increment")]
    ZeroWindowIncrement,

    #[error("CONTINUATION on stream {stream_id} without an open header block")]
    UnexpectedContinuation { stream_id: u32 },

    #[error("{frame_type} frame while header block on stream {stream_id} is open")]
    ExpectedContinuation {
        frame_type: &'static str,
        stream_id: u32,
    },
}

/// HTTP/2 frame header (9 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: u32,
    pub frame_type: FrameType,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    pub const SIZE: usize = 9;

    pub fn parse(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < Self::SIZE {
            return Err(FrameError::ShortHeader { have: data.len() });
        }

        let length = ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32);
        let stream_id = u32::from_be_bytes([data[5], data[6], data[7], data[8]]) & 0x7fff_ffff;

        Ok(FrameHeader {
            length,
            frame_type: FrameType::from(data[3]),
            flags: data[4],
            stream_id,
        })
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags & flags::END_STREAM != 0
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags & flags::END_HEADERS != 0
    }

    pub fn is_padded(&self) -> bool {
        self.flags & flags::PADDED != 0
    }

    pub fn is_priority(&self) -> bool {
        self.flags & flags::PRIORITY != 0
    }

    pub fn is_ack(&self) -> bool {
        self.flags & flags::ACK != 0
    }
}

/// One frame, borrowing its body from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    Data {
        stream_id: u32,
        end_stream: bool,
        /// Payload with padding removed
        data: &'a [u8],
    },
    Headers {
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        /// Header block fragment with padding and priority removed
        block: &'a [u8],
    },
    Other(FrameHeader),
}

/// Reads frames laid end to end in one buffer.
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Stream whose header block still expects CONTINUATION frames
    open_header_block: Option<u32>,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            open_header_block: None,
        }
    }

    /// Read the next frame. Returns `Ok(None)` once the buffer is used up.
    pub fn next_frame(&mut self) -> Result<Option<Frame<'a>>, FrameError> {
        let rest = &self.data[self.pos..];
        if rest.is_empty() {
            return Ok(None);
        }

        let header = FrameHeader::parse(rest)?;
        let length = header.length as usize;
        let body = &rest[FrameHeader::SIZE..];
        if body.len() < length {
            return Err(FrameError::Truncated {
                frame_type: header.frame_type.as_str(),
                length,
                have: body.len(),
            });
        }
        let payload = &body[..length];

        self.check_order(&header)?;
        let frame = read_body(header, payload)?;
        self.pos += FrameHeader::SIZE + length;
        Ok(Some(frame))
    }

    fn check_order(&mut self, header: &FrameHeader) -> Result<(), FrameError> {
        let frame_type = header.frame_type.as_str();
        match (self.open_header_block, header.frame_type) {
            (Some(open), FrameType::Continuation) if open == header.stream_id => {}
            (Some(open), _) => {
                return Err(FrameError::ExpectedContinuation {
                    frame_type,
                    stream_id: open,
                })
            }
            (None, FrameType::Continuation) => {
                return Err(FrameError::UnexpectedContinuation {
                    stream_id: header.stream_id,
                })
            }
            (None, _) => {}
        }

        self.open_header_block = match header.frame_type {
            FrameType::Headers | FrameType::PushPromise | FrameType::Continuation
                if !header.is_end_headers() =>
            {
                Some(header.stream_id)
            }
            _ => None,
        };
        Ok(())
    }
}

/// Validate a frame body and cut out the part callers use.
fn read_body(header: FrameHeader, payload: &[u8]) -> Result<Frame<'_>, FrameError> {
    let frame_type = header.frame_type.as_str();
    let length = payload.len();
    let stream_id = header.stream_id;
    let require_stream = || {
        if stream_id == 0 {
            Err(FrameError::StreamRequired { frame_type })
        } else {
            Ok(())
        }
    };
    let forbid_stream = || {
        if stream_id != 0 {
            Err(FrameError::ConnectionOnly {
                frame_type,
                stream_id,
            })
        } else {
            Ok(())
        }
    };
    let require_length = |ok: bool| {
        if ok {
            Ok(())
        } else {
            Err(FrameError::InvalidLength { frame_type, length })
        }
    };

    match header.frame_type {
        FrameType::Data => {
            require_stream()?;
            let data = strip_padding(&header, payload, 0)?;
            Ok(Frame::Data {
                stream_id,
                end_stream: header.is_end_stream(),
                data,
            })
        }
        FrameType::Headers => {
            require_stream()?;
            // Exclusive bit, stream dependency and weight
            let priority_len = if header.is_priority() { 5 } else { 0 };
            let block = strip_padding(&header, payload, priority_len)?;
            Ok(Frame::Headers {
                stream_id,
                end_stream: header.is_end_stream(),
                end_headers: header.is_end_headers(),
                block,
            })
        }
        FrameType::Priority => {
            require_stream()?;
            require_length(length == 5)?;
            Ok(Frame::Other(header))
        }
        FrameType::RstStream => {
            require_stream()?;
            require_length(length == 4)?;
            Ok(Frame::Other(header))
        }
        FrameType::Settings => {
            forbid_stream()?;
            require_length(length % 6 == 0 && !(header.is_ack() && length > 0))?;
            Ok(Frame::Other(header))
        }
        FrameType::PushPromise => {
            require_stream()?;
            // Promised stream id
            strip_padding(&header, payload, 4)?;
            Ok(Frame::Other(header))
        }
        FrameType::Ping => {
            forbid_stream()?;
            require_length(length == 8)?;
            Ok(Frame::Other(header))
        }
        FrameType::GoAway => {
            forbid_stream()?;
            require_length(length >= 8)?;
            Ok(Frame::Other(header))
        }
        FrameType::WindowUpdate => {
            require_length(length == 4)?;
            let increment =
                u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) & 0x7fff_ffff;
            if increment == 0 {
                return Err(FrameError::ZeroWindowIncrement);
            }
            Ok(Frame::Other(header))
        }
        FrameType::Continuation => {
            require_stream()?;
            Ok(Frame::Other(header))
        }
        FrameType::Unknown(_) => Ok(Frame::Other(header)),
    }
}

/// Remove the pad-length byte, `skip` fixed bytes and trailing padding.
fn strip_padding<'a>(
    header: &FrameHeader,
    payload: &'a [u8],
    skip: usize,
) -> Result<&'a [u8], FrameError> {
    let frame_type = header.frame_type.as_str();
    let (pad, rest) = if header.is_padded() {
        match payload.split_first() {
            Some((&pad, rest)) => (pad as usize, rest),
            None => {
                return Err(FrameError::InvalidLength {
                    frame_type,
                    length: 0,
                })
            }
        }
    } else {
        (0, payload)
    };

    if rest.len() < skip {
        return Err(FrameError::InvalidLength {
            frame_type,
            length: payload.len(),
        });
    }
    let rest = &rest[skip..];
    if pad > rest.len() {
        return Err(FrameError::PaddingTooLong {
            frame_type,
            pad,
            available: rest.len(),
        });
    }
    Ok(&rest[..rest.len() - pad])
}
