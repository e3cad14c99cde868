//! Error types for deeppacket-core.
//!
//! This module provides structured error types for all core operations:
//!
//! - [`enum@Error`] - Main error enum that wraps all error types
//! - [`PcapError`] - Errors from capture file reading
//! - [`ProtocolError`] - Errors from protocol decoding
//! - [`ConfigError`] - Errors from pipeline configuration
//!
//! Header decompression and HTTP/2 frame errors live next to the code that
//! raises them ([`crate::header_table::HpackError`],
//! [`crate::http2::FrameError`]); they never escape a single packet.

use thiserror::Error;

/// Main error type for deeppacket-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Error reading or parsing a capture file
    #[error("PCAP error: {0}")]
    Pcap(#[from] PcapError),

    /// Error during protocol decoding
    #[error("Protocol parse error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to capture file reading.
#[derive(Error, Debug)]
pub enum PcapError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Invalid PCAP format
    #[error("Invalid PCAP format: {reason}")]
    InvalidFormat { reason: String },
}

/// Errors related to protocol decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet too short for protocol header
    #[error("{protocol}: packet too short (need {needed} bytes, have {have})")]
    PacketTooShort {
        protocol: &'static str,
        needed: usize,
        have: usize,
    },

    /// Invalid header field value
    #[error("{protocol}: invalid {field}: {reason}")]
    InvalidField {
        protocol: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl ProtocolError {
    pub(crate) fn too_short(protocol: &'static str, needed: usize, have: usize) -> Self {
        ProtocolError::PacketTooShort {
            protocol,
            needed,
            have,
        }
    }

    pub(crate) fn invalid(
        protocol: &'static str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ProtocolError::InvalidField {
            protocol,
            field,
            reason: reason.into(),
        }
    }
}

/// Errors related to pipeline configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Time of day not in `HH:MM` or `HH:MM:SS` form
    #[error("invalid time of day '{value}': expected HH:MM or HH:MM:SS")]
    InvalidTimeOfDay { value: String },

    /// No capture files were given or found
    #[error("no capture files to process")]
    NoInputs,

    /// Input directory could not be listed
    #[error("cannot read directory {path}: {reason}")]
    UnreadableDirectory { path: String, reason: String },
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
