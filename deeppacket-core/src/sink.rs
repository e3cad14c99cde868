//! Append-only destinations for normalized records.
//!
//! A [`RecordSink`] receives every record the session emits together with
//! its [`Envelope`]. Sinks never reject a record; a sink that can fail
//! (such as [`JsonLinesSink`]) keeps its first error and reports it when
//! it is finished.

use std::io::{self, Write};
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::record::Record;

/// Per-record metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub src: IpAddr,
    pub dst: IpAddr,
    /// Protocol tag such as `sip` or `http`
    pub protocol: &'static str,
    pub timestamp: DateTime<Utc>,
    /// 1-based frame number within the capture file
    pub frame_number: u64,
}

impl Envelope {
    /// Capture time as RFC 3339 with second precision.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// Receives emitted records in capture order.
pub trait RecordSink {
    fn insert(&mut self, envelope: Envelope, record: Record);
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn insert(&mut self, envelope: Envelope, record: Record) {
        (**self).insert(envelope, record)
    }
}

/// A record with its envelope, as kept by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub envelope: Envelope,
    pub record: Record,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    src_ip: &'a IpAddr,
    dst_ip: &'a IpAddr,
    protocol: &'a str,
    frame_number: u64,
    timestamp: String,
    message: &'a Record,
}

impl StoredRecord {
    fn json_line(&self) -> JsonLine<'_> {
        JsonLine {
            src_ip: &self.envelope.src,
            dst_ip: &self.envelope.dst,
            protocol: self.envelope.protocol,
            frame_number: self.envelope.frame_number,
            timestamp: self.envelope.timestamp_rfc3339(),
            message: &self.record,
        }
    }

    /// Serialize as one JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.json_line())
    }
}

/// Keeps every record in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Vec<StoredRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[StoredRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<StoredRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSink for MemorySink {
    fn insert(&mut self, envelope: Envelope, record: Record) {
        self.records.push(StoredRecord { envelope, record });
    }
}

/// Writes one JSON object per line.
///
/// Field order inside `message` follows the record.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
    error: Option<io::Error>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            error: None,
        }
    }

    /// Lines written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the writer, or the first write error.
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_line(&mut self, stored: &StoredRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, &stored.json_line())?;
        self.writer.write_all(b"\n")
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn insert(&mut self, envelope: Envelope, record: Record) {
        if self.error.is_some() {
            return;
        }
        match self.write_line(&StoredRecord { envelope, record }) {
            Ok(()) => self.written += 1,
            Err(e) => {
                tracing::warn!(error = %e, "record output failed, dropping further records");
                self.error = Some(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(frame_number: u64) -> Envelope {
        Envelope {
            src: "10.0.0.1".parse().unwrap(),
            dst: "2001:db8::2".parse().unwrap(),
            protocol: "sip",
            timestamp: DateTime::from_timestamp(1_710_947_045, 123_000_000).unwrap(),
            frame_number,
        }
    }

    #[test]
    fn test_timestamp_rfc3339() {
        assert_eq!(envelope(1).timestamp_rfc3339(), "2024-03-20T15:04:05Z");
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.insert(envelope(1), [("a", "1")].into_iter().collect());
        sink.insert(envelope(2), [("b", "2")].into_iter().collect());

        assert_eq!(sink.len(), 2);
        let frames: Vec<_> = sink
            .records()
            .iter()
            .map(|r| r.envelope.frame_number)
            .collect();
        assert_eq!(frames, vec![1, 2]);
    }

    #[test]
    fn test_json_lines_layout() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let record: Record = [("Status", "INVITE sip:b SIP/2.0"), ("Call-ID", "x")]
            .into_iter()
            .collect();
        sink.insert(envelope(7), record);
        assert_eq!(sink.written(), 1);

        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            concat!(
                r#"{"src_ip":"10.0.0.1","dst_ip":"2001:db8::2","protocol":"sip","#,
                r#""frame_number":7,"timestamp":"2024-03-20T15:04:05Z","#,
                r#""message":{"Status":"INVITE sip:b SIP/2.0","Call-ID":"x"}}"#,
                "\n"
            )
        );
    }

    #[derive(Debug)]
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_json_lines_reports_first_error_on_finish() {
        let mut sink = JsonLinesSink::new(FailingWriter);
        sink.insert(envelope(1), Record::new());
        sink.insert(envelope(2), Record::new());

        assert_eq!(sink.written(), 0);
        let err = sink.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
