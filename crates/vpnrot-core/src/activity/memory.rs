// # Memory Sink
//
// In-memory implementation of LogSink.
//
// Keeps every entry for the lifetime of the process. Intended for tests and
// for embedders that want to inspect what the supervisor reported.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::activity::{LogEntry, Severity};
use crate::traits::LogSink;

/// In-memory activity sink
///
/// Clones share the same buffer, so a clone can be handed to the
/// [`ActivityLog`](crate::ActivityLog) while the original is kept for
/// inspection.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemorySink {
    /// Create a new empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry recorded so far
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Messages only, in emission order
    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    /// True if any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }

    /// Entries at or above the given severity
    pub fn at_least(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.severity >= severity)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| std::io::Error::other("memory sink poisoned"))?;
        guard.push(entry.clone());
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "memory"
    }
}
