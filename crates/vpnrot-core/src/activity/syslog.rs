// # Syslog Sink
//
// Forwards activity entries to the system logger through libc.
//
// The logger is opened once per process with the `vpnrot` ident and the
// daemon facility. Severity maps onto LOG_INFO / LOG_WARNING / LOG_ERR.

use async_trait::async_trait;
use std::ffi::{CStr, CString};
use std::sync::Once;

use crate::activity::{LogEntry, Severity};
use crate::traits::LogSink;

/// Fixed tag every entry is logged under
pub const SYSLOG_IDENT: &CStr = c"vpnrot";

static OPEN_LOG: Once = Once::new();

/// System logger sink
#[derive(Debug, Clone, Copy, Default)]
pub struct SyslogSink;

impl SyslogSink {
    /// Open the system logger (once per process) and return a sink
    pub fn new() -> Self {
        OPEN_LOG.call_once(|| {
            // SAFETY: SYSLOG_IDENT is a 'static NUL-terminated string, so the
            // pointer openlog keeps stays valid for the life of the process.
            unsafe {
                libc::openlog(SYSLOG_IDENT.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON);
            }
        });
        Self
    }

    fn priority(severity: Severity) -> libc::c_int {
        match severity {
            Severity::Info => libc::LOG_INFO,
            Severity::Warning => libc::LOG_WARNING,
            Severity::Error => libc::LOG_ERR,
        }
    }
}

#[async_trait]
impl LogSink for SyslogSink {
    async fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let message = CString::new(entry.message.as_str())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: the format string is a literal "%s" and the only vararg is
        // a valid NUL-terminated C string that outlives the call.
        unsafe {
            libc::syslog(Self::priority(entry.severity), c"%s".as_ptr(), message.as_ptr());
        }
        Ok(())
    }

    fn sink_name(&self) -> &'static str {
        "syslog"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_maps_to_syslog_priority() {
        assert_eq!(SyslogSink::priority(Severity::Info), libc::LOG_INFO);
        assert_eq!(SyslogSink::priority(Severity::Warning), libc::LOG_WARNING);
        assert_eq!(SyslogSink::priority(Severity::Error), libc::LOG_ERR);
    }

    #[tokio::test]
    async fn interior_nul_is_rejected() {
        let sink = SyslogSink::new();
        let result = sink
            .write(&LogEntry::new(Severity::Info, "bad\0message"))
            .await;
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidInput);
    }
}
