//! Test utilities for packet dissection.
//!
//! Provides builders for constructing link, network and transport layers
//! byte by byte, plus shortcuts for the frames the pipeline tests need.

use bytes::Bytes;

use crate::io::RawPacket;

/// Builder for constructing Ethernet frames.
#[derive(Debug, Clone)]
pub struct EthernetBuilder {
    src_mac: [u8; 6],
    dst_mac: [u8; 6],
    vlan: Option<u16>,
    ethertype: u16,
    payload: Vec<u8>,
}

impl Default for EthernetBuilder {
    fn default() -> Self {
        Self {
            src_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            dst_mac: [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb],
            vlan: None,
            ethertype: 0x0800, // IPv4
            payload: Vec::new(),
        }
    }
}

impl EthernetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    pub fn ipv6(self) -> Self {
        self.ethertype(0x86DD)
    }

    pub fn vlan(mut self, id: u16) -> Self {
        self.vlan = Some(id);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(18 + self.payload.len());
        frame.extend_from_slice(&self.dst_mac);
        frame.extend_from_slice(&self.src_mac);
        if let Some(id) = self.vlan {
            frame.extend_from_slice(&0x8100u16.to_be_bytes());
            frame.extend_from_slice(&(id & 0x0fff).to_be_bytes());
        }
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}

/// Builder for constructing IPv4 headers.
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    flags_fragment: u16,
    ttl: u8,
    protocol: u8,
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    payload: Vec<u8>,
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self {
            flags_fragment: 0x0000,
            ttl: 64,
            protocol: 17, // UDP
            src_ip: [10, 0, 0, 1],
            dst_ip: [10, 0, 0, 2],
            payload: Vec::new(),
        }
    }
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn tcp(self) -> Self {
        self.protocol(6)
    }

    pub fn udp(self) -> Self {
        self.protocol(17)
    }

    pub fn sctp(self) -> Self {
        self.protocol(132)
    }

    pub fn src_ip(mut self, ip: [u8; 4]) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst_ip(mut self, ip: [u8; 4]) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn fragment_offset(mut self, offset_units: u16) -> Self {
        self.flags_fragment = offset_units & 0x1fff;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total_length = 20 + self.payload.len() as u16;
        let mut header = Vec::with_capacity(20 + self.payload.len());

        header.push(0x45); // Version 4, IHL 5
        header.push(0x00); // DSCP/ECN
        header.extend_from_slice(&total_length.to_be_bytes());
        header.extend_from_slice(&0x0001u16.to_be_bytes()); // Identification
        header.extend_from_slice(&self.flags_fragment.to_be_bytes());
        header.push(self.ttl);
        header.push(self.protocol);
        header.extend_from_slice(&[0x00, 0x00]); // Checksum (not calculated)
        header.extend_from_slice(&self.src_ip);
        header.extend_from_slice(&self.dst_ip);
        header.extend_from_slice(&self.payload);

        header
    }
}

/// Builder for constructing IPv6 headers (no extension headers).
#[derive(Debug, Clone)]
pub struct Ipv6Builder {
    next_header: u8,
    src_ip: [u8; 16],
    dst_ip: [u8; 16],
    payload: Vec<u8>,
}

impl Default for Ipv6Builder {
    fn default() -> Self {
        let mut src_ip = [0u8; 16];
        src_ip[0] = 0xfe;
        src_ip[1] = 0x80;
        src_ip[15] = 1;
        let mut dst_ip = src_ip;
        dst_ip[15] = 2;
        Self {
            next_header: 17,
            src_ip,
            dst_ip,
            payload: Vec::new(),
        }
    }
}

impl Ipv6Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_header(mut self, next_header: u8) -> Self {
        self.next_header = next_header;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = Vec::with_capacity(40 + self.payload.len());
        header.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]); // Version 6, TC, flow label
        header.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        header.push(self.next_header);
        header.push(64); // Hop limit
        header.extend_from_slice(&self.src_ip);
        header.extend_from_slice(&self.dst_ip);
        header.extend_from_slice(&self.payload);
        header
    }
}

/// Builder for constructing TCP headers.
#[derive(Debug, Clone)]
pub struct TcpBuilder {
    src_port: u16,
    dst_port: u16,
    seq: u32,
    flags: u8,
    payload: Vec<u8>,
}

impl Default for TcpBuilder {
    fn default() -> Self {
        Self {
            src_port: 40000,
            dst_port: 8080,
            seq: 1,
            flags: 0x18, // PSH, ACK
            payload: Vec::new(),
        }
    }
}

impl TcpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut header = Vec::with_capacity(20 + self.payload.len());

        header.extend_from_slice(&self.src_port.to_be_bytes());
        header.extend_from_slice(&self.dst_port.to_be_bytes());
        header.extend_from_slice(&self.seq.to_be_bytes());
        header.extend_from_slice(&0u32.to_be_bytes()); // Ack
        header.push(5 << 4); // Data offset 5, reserved
        header.push(self.flags);
        header.extend_from_slice(&65535u16.to_be_bytes()); // Window
        header.extend_from_slice(&[0x00, 0x00]); // Checksum
        header.extend_from_slice(&[0x00, 0x00]); // Urgent pointer
        header.extend_from_slice(&self.payload);

        header
    }
}

/// Builder for constructing UDP headers.
#[derive(Debug, Clone)]
pub struct UdpBuilder {
    src_port: u16,
    dst_port: u16,
    payload: Vec<u8>,
}

impl Default for UdpBuilder {
    fn default() -> Self {
        Self {
            src_port: 40000,
            dst_port: 53,
            payload: Vec::new(),
        }
    }
}

impl UdpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let length = 8 + self.payload.len() as u16;
        let mut header = Vec::with_capacity(8 + self.payload.len());

        header.extend_from_slice(&self.src_port.to_be_bytes());
        header.extend_from_slice(&self.dst_port.to_be_bytes());
        header.extend_from_slice(&length.to_be_bytes());
        header.extend_from_slice(&[0x00, 0x00]); // Checksum
        header.extend_from_slice(&self.payload);

        header
    }
}

/// Builder for constructing SCTP packets with a single DATA chunk.
#[derive(Debug, Clone)]
pub struct SctpBuilder {
    src_port: u16,
    dst_port: u16,
    leading_chunk: Option<Vec<u8>>,
    payload: Vec<u8>,
}

impl Default for SctpBuilder {
    fn default() -> Self {
        Self {
            src_port: 3868,
            dst_port: 3868,
            leading_chunk: None,
            payload: Vec::new(),
        }
    }
}

impl SctpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    /// Put a SACK chunk in front of the DATA chunk.
    pub fn with_sack(mut self) -> Self {
        let mut sack = vec![3, 0, 0, 16]; // Type 3, flags, length 16
        sack.extend_from_slice(&[0u8; 12]);
        self.leading_chunk = Some(sack);
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut packet = Vec::new();
        packet.extend_from_slice(&self.src_port.to_be_bytes());
        packet.extend_from_slice(&self.dst_port.to_be_bytes());
        packet.extend_from_slice(&0x01020304u32.to_be_bytes()); // Verification tag
        packet.extend_from_slice(&[0u8; 4]); // Checksum
        if let Some(chunk) = self.leading_chunk {
            packet.extend_from_slice(&chunk);
        }

        let chunk_len = 16 + self.payload.len() as u16;
        packet.extend_from_slice(&[0x00, 0x03]); // DATA, flags B|E
        packet.extend_from_slice(&chunk_len.to_be_bytes());
        packet.extend_from_slice(&1u32.to_be_bytes()); // TSN
        packet.extend_from_slice(&0u16.to_be_bytes()); // Stream id
        packet.extend_from_slice(&0u16.to_be_bytes()); // Stream seq
        packet.extend_from_slice(&46u32.to_be_bytes()); // PPID (Diameter)
        packet.extend_from_slice(&self.payload);
        while packet.len() % 4 != 0 {
            packet.push(0);
        }
        packet
    }
}

/// Wrap frame bytes as the reader would hand them out.
pub fn raw_packet(frame_number: u64, link_type: u16, data: Vec<u8>) -> RawPacket {
    RawPacket {
        frame_number,
        timestamp_ns: 1_700_000_000_000_000_000 + frame_number as i64 * 1_000_000_000,
        captured_len: data.len() as u32,
        original_len: data.len() as u32,
        link_type,
        data: Bytes::from(data),
    }
}

/// Ethernet + IPv4 + UDP frame.
pub fn udp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let udp = UdpBuilder::new()
        .src_port(src_port)
        .dst_port(dst_port)
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new().udp().src_ip(src).dst_ip(dst).payload(udp).build();
    EthernetBuilder::new().payload(ip).build()
}

/// Ethernet + IPv4 + TCP frame.
pub fn tcp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let tcp = TcpBuilder::new()
        .src_port(src_port)
        .dst_port(dst_port)
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new().tcp().src_ip(src).dst_ip(dst).payload(tcp).build();
    EthernetBuilder::new().payload(ip).build()
}

/// Ethernet + IPv4 + SCTP (single DATA chunk) frame.
pub fn sctp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, payload: &[u8]) -> Vec<u8> {
    let sctp = SctpBuilder::new()
        .src_port(src_port)
        .dst_port(dst_port)
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new().sctp().src_ip(src).dst_ip(dst).payload(sctp).build();
    EthernetBuilder::new().payload(ip).build()
}
