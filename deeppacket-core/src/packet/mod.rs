//! Captured packet model.
//!
//! A [`CapturedPacket`] is the dissected view of one frame: the network
//! address pair, the transport layer with its ports, and the application
//! payload together with the application protocol the dissector recognized.
//! It is produced by [`dissect`] and never modified afterwards.

mod dissect;

#[cfg(test)]
pub mod test_utils;

use std::fmt;
use std::net::IpAddr;

use bytes::Bytes;
use chrono::{DateTime, Utc};

pub use dissect::{dissect, ports, LinkType};

/// One dissected frame.
#[derive(Debug, Clone)]
pub struct CapturedPacket {
    /// 1-based frame number within its capture file
    pub frame_number: u64,
    /// Capture timestamp
    pub timestamp: DateTime<Utc>,
    pub network: Option<NetworkLayer>,
    pub transport: Option<TransportLayer>,
    pub application: Option<ApplicationLayer>,
}

impl CapturedPacket {
    /// Application payload bytes, empty when there is none.
    pub fn payload(&self) -> &[u8] {
        self.application
            .as_ref()
            .map(|app| app.payload.as_ref())
            .unwrap_or_default()
    }

    /// Application protocol recognized by the dissector.
    pub fn application_kind(&self) -> Option<ApplicationKind> {
        self.application.as_ref().map(|app| app.kind)
    }
}

/// Network-layer address pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkLayer {
    pub src: IpAddr,
    pub dst: IpAddr,
}

impl NetworkLayer {
    /// Both addresses are the unspecified address (`0.0.0.0` or `::`).
    pub fn is_unspecified_pair(&self) -> bool {
        self.src.is_unspecified() && self.dst.is_unspecified()
    }
}

/// Transport protocols the dissector decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Tcp,
    Udp,
    Sctp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
            TransportKind::Sctp => "sctp",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport layer with its port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLayer {
    pub kind: TransportKind,
    pub src_port: u16,
    pub dst_port: u16,
}

impl TransportLayer {
    /// Port matches in either direction.
    pub fn has_port(&self, port: u16) -> bool {
        self.src_port == port || self.dst_port == port
    }

    /// Any of the ports matches in either direction.
    pub fn has_any_port(&self, ports: &[u16]) -> bool {
        ports.iter().any(|&p| self.has_port(p))
    }
}

/// Application protocols recognized at dissection time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationKind {
    Sip,
    Rtp,
    Dns,
    /// Payload with no recognized application protocol
    Raw,
}

/// Application payload.
#[derive(Debug, Clone)]
pub struct ApplicationLayer {
    pub kind: ApplicationKind,
    pub payload: Bytes,
}
