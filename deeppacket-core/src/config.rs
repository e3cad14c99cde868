//! Pipeline configuration.
//!
//! [`PipelineConfig`] is the validated form of what the command line asks
//! for: the capture files to read in order and the time-of-day window used
//! to select packets.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use regex::Regex;

use crate::error::ConfigError;

/// File name suffixes picked up from an input directory.
const CAPTURE_SUFFIXES: [&str; 6] = [
    ".pcap",
    ".pcapng",
    ".pcap.gz",
    ".pcapng.gz",
    ".pcap.zst",
    ".pcapng.zst",
];

static TIME_OF_DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([01][0-9]|2[0-3]):([0-5][0-9])(?::([0-5][0-9]))?$")
        .expect("Invalid time-of-day regex pattern")
});

/// Parse `HH:MM` or `HH:MM:SS` (24-hour clock).
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime, ConfigError> {
    let invalid = || ConfigError::InvalidTimeOfDay {
        value: value.to_string(),
    };
    let caps = TIME_OF_DAY_RE.captures(value.trim()).ok_or_else(invalid)?;
    let field = |i: usize| {
        caps.get(i)
            .map_or(Ok(0), |m| m.as_str().parse::<u32>())
            .map_err(|_| invalid())
    };
    NaiveTime::from_hms_opt(field(1)?, field(2)?, field(3)?).ok_or_else(invalid)
}

/// Inclusive UTC time-of-day window.
///
/// Either bound may be open. When `start` is later than `end` the window
/// wraps past midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
}

impl TimeWindow {
    pub fn new(start: Option<NaiveTime>, end: Option<NaiveTime>) -> Self {
        Self { start, end }
    }

    /// Window accepting every packet.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        let time = timestamp.time().with_nanosecond(0).unwrap_or(timestamp.time());
        match (self.start, self.end) {
            (None, None) => true,
            (Some(start), None) => time >= start,
            (None, Some(end)) => time <= end,
            (Some(start), Some(end)) if start <= end => start <= time && time <= end,
            (Some(start), Some(end)) => time >= start || time <= end,
        }
    }
}

/// Validated pipeline settings.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Capture files in processing order
    pub inputs: Vec<PathBuf>,
    pub window: TimeWindow,
    /// Count packets in every file before processing
    pub count_first: bool,
}

impl PipelineConfig {
    /// Build a config from explicit files, an optional directory and
    /// optional `HH:MM[:SS]` bounds.
    ///
    /// Explicit files come first in the given order, followed by the
    /// directory's capture files sorted by name.
    pub fn new(
        files: &[PathBuf],
        dir: Option<&Path>,
        start_time: Option<&str>,
        end_time: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let mut inputs = files.to_vec();
        if let Some(dir) = dir {
            inputs.extend(capture_files_in(dir)?);
        }
        if inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }

        let window = TimeWindow::new(
            start_time.map(parse_time_of_day).transpose()?,
            end_time.map(parse_time_of_day).transpose()?,
        );

        Ok(Self {
            inputs,
            window,
            count_first: false,
        })
    }

    pub fn with_count_first(mut self, count_first: bool) -> Self {
        self.count_first = count_first;
        self
    }
}

/// Capture files directly inside `dir`, sorted by file name.
pub fn capture_files_in(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let unreadable = |e: std::io::Error| ConfigError::UnreadableDirectory {
        path: dir.display().to_string(),
        reason: e.to_string(),
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if !path.is_file() {
            continue;
        }
        let is_capture = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| CAPTURE_SUFFIXES.iter().any(|s| name.ends_with(s)));
        if is_capture {
            files.push(path);
        }
    }
    files.sort();

    tracing::debug!(dir = %dir.display(), count = files.len(), "collected capture files");
    Ok(files)
}
