//! Syslog offset line parsing
//!
//! Expected shapes (15 whitespace-separated tokens):
//!
//! ```text
//! Oct 19 14:03:22 worker-01 ptp4l[812]: [5201.113] master offset -12 s2 freq +3345 path delay 611
//! Oct 19 14:03:22 worker-01 phc2sys[813]: [5201.364] CLOCK_REALTIME phc offset 17 s2 freq -1234 delay 512
//! ```
//!
//! Lines of any other shape are skipped. A line with the right shape but an
//! unreadable timestamp or offset means the log format changed, and is an error.

use chrono::{Datelike, Duration, NaiveDateTime};
use std::fmt;
use std::num::ParseIntError;

/// Token count of a ptp4l / phc2sys offset line
pub const EXPECTED_TOKENS: usize = 15;

const TIMESTAMP_FORMAT: &str = "%Y %b %d %H:%M:%S";

/// Which clock-sync daemon an offset comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OffsetSource {
    /// ptp4l "master offset" (NIC hardware clock vs grandmaster)
    Hardware,
    /// phc2sys "phc offset" (system clock vs hardware clock)
    Software,
}

impl OffsetSource {
    /// Collection order within a host
    pub const ALL: [OffsetSource; 2] = [OffsetSource::Hardware, OffsetSource::Software];

    pub fn offset_token(self) -> usize {
        match self {
            OffsetSource::Hardware => 8,
            OffsetSource::Software => 9,
        }
    }

    pub fn daemon(self) -> &'static str {
        match self {
            OffsetSource::Hardware => "ptp4l",
            OffsetSource::Software => "phc2sys",
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            OffsetSource::Hardware => "master offset",
            OffsetSource::Software => "phc offset",
        }
    }

    /// Prefix used in metric names (`expeca_ptp_hw...`)
    pub fn metric_prefix(self) -> &'static str {
        match self {
            OffsetSource::Hardware => "hw",
            OffsetSource::Software => "sw",
        }
    }

    /// Remote pipeline returning the last `tail_lines` offset lines
    pub fn retrieval_command(self, syslog_path: &str, tail_lines: usize) -> String {
        format!(
            "cat {} | grep {} | grep '{}' | tail -n {}",
            syslog_path,
            self.daemon(),
            self.marker(),
            tail_lines
        )
    }
}

impl fmt::Display for OffsetSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OffsetSource::Hardware => write!(f, "hardware"),
            OffsetSource::Software => write!(f, "software"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSample {
    pub timestamp: NaiveDateTime,
    pub offset_ns: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("unparsable timestamp '{text}': {source}")]
    Timestamp {
        text: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("unparsable offset '{token}': {source}")]
    Offset {
        token: String,
        #[source]
        source: ParseIntError,
    },
}

/// A parse error tied to its position in the command output
#[derive(Debug, thiserror::Error)]
#[error("output line {line}: {source}")]
pub struct LineError {
    /// 1-based index in the command output
    pub line: usize,
    #[source]
    pub source: ParseError,
}

/// Parse one syslog line. `Ok(None)` when the line does not have the offset shape.
pub fn parse_line(
    line: &str,
    source: OffsetSource,
    now: NaiveDateTime,
) -> Result<Option<OffsetSample>, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != EXPECTED_TOKENS {
        return Ok(None);
    }

    let timestamp = parse_timestamp(tokens[0], tokens[1], tokens[2], now)?;

    let token = tokens[source.offset_token()];
    let offset_ns = token.parse::<i64>().map_err(|e| ParseError::Offset {
        token: token.to_string(),
        source: e,
    })?;

    Ok(Some(OffsetSample {
        timestamp,
        offset_ns,
    }))
}

/// Parse every line of a command output, stopping at the first hard error
pub fn parse_series(
    lines: &[String],
    source: OffsetSource,
    now: NaiveDateTime,
) -> Result<Vec<OffsetSample>, LineError> {
    let mut samples = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        match parse_line(line, source, now) {
            Ok(Some(sample)) => samples.push(sample),
            Ok(None) => {}
            Err(e) => {
                return Err(LineError {
                    line: index + 1,
                    source: e,
                })
            }
        }
    }
    Ok(samples)
}

/// Syslog timestamps carry no year: take the current one, unless that puts
/// the line more than a day in the future (December lines read in January).
fn parse_timestamp(
    month: &str,
    day: &str,
    time: &str,
    now: NaiveDateTime,
) -> Result<NaiveDateTime, ParseError> {
    let text = format!("{} {} {} {}", now.year(), month, day, time);
    let timestamp = NaiveDateTime::parse_from_str(&text, TIMESTAMP_FORMAT).map_err(|e| {
        ParseError::Timestamp {
            text: format!("{} {} {}", month, day, time),
            source: e,
        }
    })?;

    if timestamp - now > Duration::days(1) {
        let previous = format!("{} {} {} {}", now.year() - 1, month, day, time);
        if let Ok(rolled) = NaiveDateTime::parse_from_str(&previous, TIMESTAMP_FORMAT) {
            return Ok(rolled);
        }
    }

    Ok(timestamp)
}
