//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;
use deeppacket_core::config::PipelineConfig;
use deeppacket_core::ConfigError;

use super::OutputFormat;

fn input_path(value: &str) -> Result<PathBuf, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err("empty file name".to_string());
    }
    Ok(PathBuf::from(value))
}

/// Classify captured packets and print normalized records.
#[derive(Parser, Debug)]
#[command(name = "deeppacket")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Capture files to read, comma-separated
    #[arg(
        short = 'i',
        long = "input",
        value_name = "FILES",
        value_delimiter = ',',
        value_parser = input_path
    )]
    pub input: Vec<PathBuf>,

    /// Also read every capture file in this directory
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Skip packets captured before this UTC time of day
    #[arg(long = "start-time", value_name = "HH:MM[:SS]")]
    pub start_time: Option<String>,

    /// Skip packets captured after this UTC time of day
    #[arg(long = "end-time", value_name = "HH:MM[:SS]")]
    pub end_time: Option<String>,

    /// Output format
    #[arg(long = "format", value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write records to a file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "OUTPUT_FILE")]
    pub output: Option<PathBuf>,

    /// Show a progress indicator on stderr
    #[arg(long = "progress")]
    pub progress: bool,

    /// Count packets up front so progress shows a percentage
    #[arg(long = "count-first", requires = "progress")]
    pub count_first: bool,

    /// Print per-protocol counts to stderr when done
    #[arg(long = "summary")]
    pub summary: bool,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Validate inputs and the time window.
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigError> {
        PipelineConfig::new(
            &self.input,
            self.dir.as_deref(),
            self.start_time.as_deref(),
            self.end_time.as_deref(),
        )
        .map(|config| config.with_count_first(self.count_first))
    }

    /// Default log filter for the `-v` count.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
