// # Log Sink Trait
//
// One destination of the activity log. The activity log fans every entry out
// to all sinks; sinks are independent and a failing sink never blocks the
// others.

use async_trait::async_trait;

use crate::activity::LogEntry;

/// Trait for activity log destinations
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Write one entry
    ///
    /// Errors are reported to the caller, which swallows them.
    async fn write(&self, entry: &LogEntry) -> std::io::Result<()>;

    /// Short name used when reporting a failing sink
    fn sink_name(&self) -> &'static str;
}
