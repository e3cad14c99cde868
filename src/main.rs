//! deeppacket CLI entry point.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use deeppacket::cli::{Args, OutputFormat, OutputFormatter};
use deeppacket_core::pcap::count_packets;
use deeppacket_core::{CaptureSession, JsonLinesSink, MemorySink, PipelineConfig, RecordSink};

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_filter().into()),
        )
        .init();

    let config = args.pipeline_config().context("Invalid arguments")?;
    let mut session = CaptureSession::with_window(config.window);
    let formatter = OutputFormatter::new(args.format);

    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };

    match formatter.format() {
        // Stream records as they are produced
        OutputFormat::Json => {
            let mut sink = JsonLinesSink::new(&mut writer);
            run(&mut session, &config, &mut sink, args.progress);
            let written = sink.written();
            sink.finish().context("Failed to write records")?;
            tracing::info!(records = written, "records written");
        }
        OutputFormat::Table => {
            let mut sink = MemorySink::new();
            run(&mut session, &config, &mut sink, args.progress);
            formatter
                .write(sink.records(), &mut writer)
                .context("Failed to write records")?;
        }
    }
    writer.flush().context("Failed to write records")?;

    if args.summary {
        formatter.write_summary(session.stats(), &mut io::stderr())?;
    }
    Ok(())
}

/// Feed every input file through the session.
///
/// A file that cannot be read is reported and skipped.
fn run(
    session: &mut CaptureSession,
    config: &PipelineConfig,
    sink: &mut dyn RecordSink,
    show_progress: bool,
) {
    let progress = show_progress.then(|| progress_bar(config));

    for path in &config.inputs {
        if let Some(pb) = &progress {
            pb.set_message(path.display().to_string());
        }
        let result = session.process_file_with_progress(path, sink, |_| {
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        });
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "skipping capture file");
            eprintln!("Skipping {}: {e}", path.display());
        }
    }

    if let Some(pb) = progress {
        pb.finish_with_message(format!("{} records", session.stats().total_records()));
    }
}

fn progress_bar(config: &PipelineConfig) -> ProgressBar {
    if config.count_first {
        let total: u64 = config
            .inputs
            .iter()
            .filter_map(|path| match count_packets(path) {
                Ok(n) => Some(n),
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "cannot count packets");
                    None
                }
            })
            .sum();
        let pb = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        ) {
            pb.set_style(style.progress_chars("=> "));
        }
        return pb;
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg} ({per_sec})")
    {
        pb.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }
    pb
}
