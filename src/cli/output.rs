//! Output formatting for records and run summaries.

use std::io::Write;

use clap::ValueEnum;
use comfy_table::{Cell, Table};
use deeppacket_core::{SessionStats, StoredRecord};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed table (default)
    Table,
    /// JSON Lines (one JSON object per record)
    Json,
}

/// Formats collected records and session counters.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write records that were collected in memory.
    pub fn write<W: Write>(&self, records: &[StoredRecord], writer: &mut W) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Table => self.write_table(records, writer),
            OutputFormat::Json => self.write_json(records, writer),
        }
    }

    fn write_table<W: Write>(&self, records: &[StoredRecord], writer: &mut W) -> std::io::Result<()> {
        let mut table = Table::new();
        table.set_header(vec!["Frame", "Time", "Source", "Destination", "Protocol", "Message"]);

        for stored in records {
            let envelope = &stored.envelope;
            let message = stored.record.to_string();
            table.add_row(vec![
                Cell::new(envelope.frame_number),
                Cell::new(envelope.timestamp_rfc3339()),
                Cell::new(envelope.src),
                Cell::new(envelope.dst),
                Cell::new(envelope.protocol),
                Cell::new(message.trim_end()),
            ]);
        }

        writeln!(writer, "{table}")
    }

    fn write_json<W: Write>(&self, records: &[StoredRecord], writer: &mut W) -> std::io::Result<()> {
        for stored in records {
            writeln!(writer, "{}", stored.to_json()?)?;
        }
        Ok(())
    }

    /// Per-protocol counters as a table.
    pub fn write_summary<W: Write>(&self, stats: &SessionStats, writer: &mut W) -> std::io::Result<()> {
        let mut table = Table::new();
        table.set_header(vec!["Protocol", "Routed", "Records"]);
        for (kind, routed) in &stats.routed {
            let records = stats.records.get(kind).copied().unwrap_or(0);
            table.add_row(vec![Cell::new(kind), Cell::new(routed), Cell::new(records)]);
        }
        writeln!(writer, "{table}")?;

        writeln!(
            writer,
            "{} files, {} packets, {} records",
            stats.files,
            stats.packets,
            stats.total_records()
        )?;
        let discarded: Vec<String> = stats
            .discarded
            .iter()
            .map(|(reason, n)| format!("{reason}: {n}"))
            .collect();
        writeln!(
            writer,
            "discarded {} ({}), outside time window {}, decode failures {}, empty {}",
            stats.total_discarded(),
            discarded.join(", "),
            stats.filtered,
            stats.decode_failures,
            stats.empty
        )
    }
}
