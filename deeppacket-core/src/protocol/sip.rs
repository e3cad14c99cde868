//! SIP message decoding (RFC 3261 text grammar).
//!
//! Only the message framing is interpreted: the start line, header lines
//! with folding and compact names, and the body bounded by Content-Length.
//! An `application/sdp` body is additionally parsed with [`super::sdp`].

use std::fmt;

use super::sdp::{self, SessionDescription};
use super::Normalize;
use crate::error::ProtocolError;
use crate::record::FieldWriter;

const PROTOCOL: &str = "SIP";
const SIP_VERSION: &str = "SIP/2.0";

/// SIP request or status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request { method: String, uri: String },
    Status { code: u16, reason: String },
}

impl fmt::Display for StartLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartLine::Request { method, uri } => write!(f, "{method} {uri} {SIP_VERSION}"),
            StartLine::Status { code, reason } => write!(f, "{SIP_VERSION} {code} {reason}"),
        }
    }
}

/// A decoded SIP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    pub start_line: StartLine,
    /// Headers in wire order, names expanded from compact form
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Body parsed as SDP, when it is one
    pub sdp: Option<SessionDescription>,
}

impl SipMessage {
    /// Last value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Decode a SIP message.
pub fn parse(data: &[u8]) -> Result<SipMessage, ProtocolError> {
    let text = std::str::from_utf8(data)
        .map_err(|e| ProtocolError::invalid(PROTOCOL, "encoding", e.to_string()))?;

    let (head, body) = split_head_body(text);
    let mut lines = head.lines().map(|l| l.trim_end_matches('\r'));

    let start_line = parse_start_line(lines.next().unwrap_or_default())?;

    let mut headers: Vec<(String, String)> = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if line.starts_with([' ', '\t']) {
            let Some((_, value)) = headers.last_mut() else {
                return Err(ProtocolError::invalid(
                    PROTOCOL,
                    "header",
                    "continuation line before any header",
                ));
            };
            value.push(' ');
            value.push_str(line.trim());
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            return Err(ProtocolError::invalid(
                PROTOCOL,
                "header",
                format!("missing ':' in '{line}'"),
            ));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(ProtocolError::invalid(PROTOCOL, "header", "empty header name"));
        }
        headers.push((expand_compact_name(name).to_string(), value.trim().to_string()));
    }

    let mut message = SipMessage {
        start_line,
        headers,
        body: String::new(),
        sdp: None,
    };

    let body = match message.header("Content-Length").and_then(|v| v.parse::<usize>().ok()) {
        Some(len) => body.get(..len).unwrap_or(body),
        None => body,
    };
    message.body = body.to_string();

    let is_sdp = message
        .header("Content-Type")
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/sdp"))
        || body.starts_with("v=");
    if is_sdp && !body.is_empty() {
        message.sdp = match sdp::parse(body) {
            Ok(sdp) => Some(sdp),
            Err(e) => {
                tracing::trace!(error = %e, "SIP body is not a valid session description");
                None
            }
        };
    }

    Ok(message)
}

fn split_head_body(text: &str) -> (&str, &str) {
    let crlf = text.find("\r\n\r\n").map(|i| (i, i + 4));
    let lf = text.find("\n\n").map(|i| (i, i + 2));
    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };
    match split {
        Some((head_end, body_start)) => (&text[..head_end], &text[body_start..]),
        None => (text, ""),
    }
}

fn parse_start_line(line: &str) -> Result<StartLine, ProtocolError> {
    if let Some(rest) = line.strip_prefix(SIP_VERSION).and_then(|r| r.strip_prefix(' ')) {
        let (code, reason) = rest.split_once(' ').unwrap_or((rest, ""));
        let code = code
            .parse::<u16>()
            .ok()
            .filter(|c| (100..=699).contains(c))
            .ok_or_else(|| {
                ProtocolError::invalid(PROTOCOL, "status code", format!("'{code}'"))
            })?;
        return Ok(StartLine::Status {
            code,
            reason: reason.to_string(),
        });
    }

    let mut parts = line.splitn(3, ' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(uri), Some(SIP_VERSION))
            if !method.is_empty() && method.bytes().all(|b| b.is_ascii_alphabetic()) =>
        {
            Ok(StartLine::Request {
                method: method.to_string(),
                uri: uri.to_string(),
            })
        }
        _ => Err(ProtocolError::invalid(
            PROTOCOL,
            "start line",
            format!("'{line}'"),
        )),
    }
}

/// Canonical name for a compact header form.
fn expand_compact_name(name: &str) -> &str {
    if name.len() != 1 {
        return name;
    }
    match name.as_bytes()[0].to_ascii_lowercase() {
        b'a' => "Accept-Contact",
        b'b' => "Referred-By",
        b'c' => "Content-Type",
        b'e' => "Content-Encoding",
        b'f' => "From",
        b'i' => "Call-ID",
        b'k' => "Supported",
        b'l' => "Content-Length",
        b'm' => "Contact",
        b'o' => "Event",
        b'r' => "Refer-To",
        b's' => "Subject",
        b't' => "To",
        b'u' => "Allow-Events",
        b'v' => "Via",
        b'x' => "Session-Expires",
        b'y' => "Identity",
        _ => name,
    }
}

impl Normalize for SipMessage {
    fn normalize_into(&self, w: &mut FieldWriter<'_>) {
        w.put("Status", &self.start_line);
        for (name, value) in &self.headers {
            w.put(name, value);
        }
        match &self.sdp {
            Some(sdp) => {
                w.put("Message Body", sdp);
                sdp.normalize_into(&mut w.scope("SDP"));
            }
            None => w.put("Message Body", &self.body),
        }
    }
}
