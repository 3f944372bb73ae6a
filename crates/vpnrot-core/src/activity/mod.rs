//! Activity log
//!
//! The activity log is the operator-facing record of everything the
//! supervisor does. Each entry is mirrored to `tracing` and then written to
//! every configured [`LogSink`]:
//!
//! - [`FileSink`]: append-only text file, `YYYY-MM-DD HH:MM:SS : <message>`
//! - [`SyslogSink`]: the system logger under the `vpnrot` tag (unix only)
//! - [`MemorySink`]: in-process buffer for tests and embedders
//!
//! Writes are best-effort. A failing sink is reported through `tracing` and
//! never prevents the remaining sinks from being written.

pub mod file;
pub mod memory;
#[cfg(unix)]
pub mod syslog;

pub use file::FileSink;
pub use memory::MemorySink;
#[cfg(unix)]
pub use syslog::SyslogSink;

use crate::traits::LogSink;
use std::fmt;
use tracing::{error, info, warn};

/// Timestamp layout used in the activity file
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of an activity entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// One activity log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Local wall-clock time the entry was emitted
    pub timestamp: chrono::DateTime<chrono::Local>,
    pub severity: Severity,
    pub message: String,
}

impl LogEntry {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now(),
            severity,
            message: message.into(),
        }
    }

    /// Render the entry as one activity file line (without the newline)
    pub fn to_line(&self) -> String {
        format!("{} : {}", self.timestamp.format(TIMESTAMP_FORMAT), self.message)
    }
}

/// Fan-out recorder shared by every supervisor component
pub struct ActivityLog {
    sinks: Vec<Box<dyn LogSink>>,
}

impl ActivityLog {
    /// Create an activity log writing to the given sinks
    pub fn new(sinks: Vec<Box<dyn LogSink>>) -> Self {
        Self { sinks }
    }

    /// Add one more sink
    pub fn with_sink(mut self, sink: Box<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Number of configured sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Record a message at the given severity
    ///
    /// Never fails. Sink errors are reported through `tracing` only.
    pub async fn record(&self, severity: Severity, message: impl Into<String>) {
        let entry = LogEntry::new(severity, message);

        match entry.severity {
            Severity::Info => info!(target: "vpnrot::activity", "{}", entry.message),
            Severity::Warning => warn!(target: "vpnrot::activity", "{}", entry.message),
            Severity::Error => error!(target: "vpnrot::activity", "{}", entry.message),
        }

        for sink in &self.sinks {
            if let Err(e) = sink.write(&entry).await {
                warn!("Activity sink {} failed: {}", sink.sink_name(), e);
            }
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.record(Severity::Info, message).await;
    }

    pub async fn warn(&self, message: impl Into<String>) {
        self.record(Severity::Warning, message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.record(Severity::Error, message).await;
    }
}

impl fmt::Debug for ActivityLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.sink_name()).collect();
        f.debug_struct("ActivityLog").field("sinks", &names).finish()
    }
}
