//! Bounded operational event log
//!
//! Plain text file, one entry per line:
//! `<YYYY/MM/DD HH:MM:SS> <identity>: <message>[ | Exception occurred on line <n>: <message>]`
//!
//! Recording never fails from the caller's point of view. Every write
//! rewrites the file with the most recent `max_lines` lines.

use crate::config::EventLogConfig;
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a failure was raised and what it said
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionDetail {
    pub line: u32,
    pub message: String,
}

pub struct EventLog {
    path: PathBuf,
    max_lines: usize,
    identity: String,
    // Single writer: read-modify-write must not interleave
    writer: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, max_lines: usize, identity: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_lines: max_lines.max(1),
            identity: identity.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn from_config(config: &EventLogConfig) -> Self {
        Self::new(&config.path, config.max_lines, &config.identity)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry, evicting the oldest lines past the cap.
    /// Any I/O failure is dropped.
    pub fn record(&self, message: impl AsRef<str>, detail: Option<&ExceptionDetail>) {
        let entry = self.format_entry(message.as_ref(), detail);
        if let Err(e) = self.append(&entry) {
            debug!("Event log write to {} dropped: {}", self.path.display(), e);
        }
    }

    fn format_entry(&self, message: &str, detail: Option<&ExceptionDetail>) -> String {
        let timestamp = chrono::Local::now().format("%Y/%m/%d %H:%M:%S");
        // One entry per line, whatever the message contains
        let message = message.replace(['\r', '\n'], " ");
        let mut entry = format!("{} {}: {}", timestamp, self.identity, message);

        if let Some(detail) = detail {
            entry.push_str(&format!(
                " | Exception occurred on line {}: {}",
                detail.line,
                detail.message.replace(['\r', '\n'], " ")
            ));
        }

        entry
    }

    fn append(&self, entry: &str) -> io::Result<()> {
        let _guard = self.writer.lock();

        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let lines: Vec<&str> = existing.lines().collect();
        let keep = self.max_lines.saturating_sub(1);
        let start = lines.len().saturating_sub(keep);

        let mut content = String::with_capacity(existing.len() + entry.len() + 1);
        for line in &lines[start..] {
            content.push_str(line);
            content.push('\n');
        }
        content.push_str(entry);
        content.push('\n');

        fs::write(&self.path, content)
    }
}
