//! Built-in Diameter dictionary: base protocol (RFC 6733) and credit
//! control (RFC 4006) commands and AVPs.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use compact_str::CompactString;

/// AVP data formats (RFC 6733 §4.2 and §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvpDataType {
    OctetString,
    Integer32,
    Integer64,
    Unsigned32,
    Unsigned64,
    Float32,
    Float64,
    Grouped,
    Address,
    Time,
    Utf8String,
    DiameterIdentity,
    DiameterUri,
    Enumerated,
}

impl AvpDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvpDataType::OctetString => "OctetString",
            AvpDataType::Integer32 => "Integer32",
            AvpDataType::Integer64 => "Integer64",
            AvpDataType::Unsigned32 => "Unsigned32",
            AvpDataType::Unsigned64 => "Unsigned64",
            AvpDataType::Float32 => "Float32",
            AvpDataType::Float64 => "Float64",
            AvpDataType::Grouped => "Grouped",
            AvpDataType::Address => "Address",
            AvpDataType::Time => "Time",
            AvpDataType::Utf8String => "UTF8String",
            AvpDataType::DiameterIdentity => "DiameterIdentity",
            AvpDataType::DiameterUri => "DiameterURI",
            AvpDataType::Enumerated => "Enumerated",
        }
    }
}

impl fmt::Display for AvpDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct AvpDefinition {
    pub name: CompactString,
    pub data_type: AvpDataType,
}

#[derive(Debug, Clone)]
pub struct CommandDefinition {
    pub request_name: CompactString,
    pub request_abbreviation: CompactString,
    pub answer_name: CompactString,
    pub answer_abbreviation: CompactString,
}

use AvpDataType::*;

/// `(code, name, type)`; all vendor 0.
const AVPS: &[(u32, &str, AvpDataType)] = &[
    (1, "User-Name", Utf8String),
    (257, "Host-IP-Address", Address),
    (258, "Auth-Application-Id", Unsigned32),
    (259, "Acct-Application-Id", Unsigned32),
    (260, "Vendor-Specific-Application-Id", Grouped),
    (263, "Session-Id", Utf8String),
    (264, "Origin-Host", DiameterIdentity),
    (265, "Supported-Vendor-Id", Unsigned32),
    (266, "Vendor-Id", Unsigned32),
    (267, "Firmware-Revision", Unsigned32),
    (268, "Result-Code", Unsigned32),
    (269, "Product-Name", Utf8String),
    (273, "Disconnect-Cause", Enumerated),
    (277, "Auth-Session-State", Enumerated),
    (278, "Origin-State-Id", Unsigned32),
    (279, "Failed-AVP", Grouped),
    (281, "Error-Message", Utf8String),
    (282, "Route-Record", DiameterIdentity),
    (283, "Destination-Realm", DiameterIdentity),
    (284, "Proxy-Info", Grouped),
    (285, "Re-Auth-Request-Type", Enumerated),
    (293, "Destination-Host", DiameterIdentity),
    (295, "Termination-Cause", Enumerated),
    (296, "Origin-Realm", DiameterIdentity),
    (297, "Experimental-Result", Grouped),
    (298, "Experimental-Result-Code", Unsigned32),
    (415, "CC-Request-Number", Unsigned32),
    (416, "CC-Request-Type", Enumerated),
    (461, "Service-Context-Id", Utf8String),
];

/// `(code, name stem, request abbreviation, answer abbreviation)`.
const COMMANDS: &[(u32, &str, &str, &str)] = &[
    (257, "Capabilities-Exchange", "CER", "CEA"),
    (258, "Re-Auth", "RAR", "RAA"),
    (271, "Accounting", "ACR", "ACA"),
    (272, "Credit-Control", "CCR", "CCA"),
    (274, "Abort-Session", "ASR", "ASA"),
    (275, "Session-Termination", "STR", "STA"),
    (280, "Device-Watchdog", "DWR", "DWA"),
    (282, "Disconnect-Peer", "DPR", "DPA"),
];

static AVP_TABLE: LazyLock<HashMap<(u32, u32), AvpDefinition>> = LazyLock::new(|| {
    AVPS.iter()
        .map(|&(code, name, data_type)| {
            (
                (0, code),
                AvpDefinition {
                    name: CompactString::from(name),
                    data_type,
                },
            )
        })
        .collect()
});

static COMMAND_TABLE: LazyLock<HashMap<u32, CommandDefinition>> = LazyLock::new(|| {
    COMMANDS
        .iter()
        .map(|&(code, stem, req, ans)| {
            (
                code,
                CommandDefinition {
                    request_name: CompactString::from(format!("{stem}-Request")),
                    request_abbreviation: CompactString::from(req),
                    answer_name: CompactString::from(format!("{stem}-Answer")),
                    answer_abbreviation: CompactString::from(ans),
                },
            )
        })
        .collect()
});

/// Look up an AVP by vendor and code.
pub fn avp(vendor_id: u32, code: u32) -> Option<&'static AvpDefinition> {
    AVP_TABLE.get(&(vendor_id, code))
}

/// Look up a command by code.
pub fn command(code: u32) -> Option<&'static CommandDefinition> {
    COMMAND_TABLE.get(&code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let origin_host = avp(0, 264).unwrap();
        assert_eq!(origin_host.name, "Origin-Host");
        assert_eq!(origin_host.data_type, AvpDataType::DiameterIdentity);
        assert!(avp(10415, 264).is_none());

        let cer = command(257).unwrap();
        assert_eq!(cer.request_name, "Capabilities-Exchange-Request");
        assert_eq!(cer.answer_abbreviation, "CEA");
        assert!(command(9999).is_none());
    }
}
