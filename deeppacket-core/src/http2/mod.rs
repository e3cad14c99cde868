//! HTTP/2 frame reassembly into records.
//!
//! A transport payload routed to the HTTP path is read as at most two
//! HTTP/2 frames. HEADERS blocks are decompressed through the session's
//! [`HeaderTableStore`]; DATA bodies are re-linearized and searched for a
//! JSON document, which lands in the `content` field.
//!
//! The first frame's header block is keyed by the destination address and
//! the second frame's by the source address.

mod frame;

use std::net::IpAddr;

pub use frame::{
    flags, Frame, FrameError, FrameHeader, FrameReader, FrameType, CONNECTION_PREFACE,
};

use crate::header_table::{ConnectionKey, HeaderTableStore};
use crate::payload::{format_payload, reindent_json, sniff_json};
use crate::record::Record;

/// Field holding the JSON document found in DATA frames.
pub const CONTENT_FIELD: &str = "content";

/// Builds records from HTTP/2 frames using shared decompression state.
#[derive(Debug, Clone, Copy)]
pub struct FrameReassembler<'s> {
    store: &'s HeaderTableStore,
}

impl<'s> FrameReassembler<'s> {
    pub fn new(store: &'s HeaderTableStore) -> Self {
        Self { store }
    }

    /// Read up to two frames from `payload` and merge what they carry.
    ///
    /// Returns `None` when the first frame does not parse or nothing was
    /// extracted.
    pub fn reassemble(&self, payload: &[u8], src: IpAddr, dst: IpAddr) -> Option<Record> {
        let data = payload
            .strip_prefix(CONNECTION_PREFACE)
            .unwrap_or(payload);
        let mut reader = FrameReader::new(data);

        let first = match reader.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return None,
            Err(e) => {
                tracing::trace!(error = %e, "payload is not an HTTP/2 frame");
                return None;
            }
        };

        let mut record = Record::new();
        self.apply(&mut record, &first, ConnectionKey(dst));

        match reader.next_frame() {
            Ok(Some(second)) => self.apply(&mut record, &second, ConnectionKey(src)),
            Ok(None) => {}
            Err(e) => tracing::trace!(error = %e, "no second frame"),
        }

        record.update(CONTENT_FIELD, reindent_json);
        (!record.is_empty()).then_some(record)
    }

    fn apply(&self, record: &mut Record, frame: &Frame<'_>, key: ConnectionKey) {
        match frame {
            Frame::Headers { block, .. } => match self.store.decode(key, block) {
                Ok(fields) => {
                    for (name, value) in fields {
                        record.insert(name, value);
                    }
                }
                Err(e) => {
                    tracing::debug!(%key, error = %e, "header block did not decode");
                }
            },
            Frame::Data { data, .. } => {
                let text = format_payload(data);
                if let Some(json) = sniff_json(&text) {
                    record.insert(CONTENT_FIELD, json);
                }
            }
            Frame::Other(_) => {}
        }
    }
}
