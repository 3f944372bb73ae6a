// # File Sink
//
// Append-only activity file.
//
// ## File Format
//
// ```text
// 2025-01-09 12:00:00 : Current IP: 111.111.111.111
// 2025-01-09 12:00:00 : Starting reconnection and IP verification process
// ```
//
// The file is opened in append mode for every entry and is never truncated
// or rotated by the supervisor. Rotation is left to logrotate and friends.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::activity::LogEntry;
use crate::traits::LogSink;

/// File-backed activity sink
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    /// Create a file sink, creating the parent directory if needed
    ///
    /// The file itself is created lazily on the first write.
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !fs::try_exists(parent).await.unwrap_or(false)
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::config(format!(
                    "Failed to create log directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn write(&self, entry: &LogEntry) -> std::io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        let mut line = entry.to_line();
        line.push('\n');
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }

    fn sink_name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::Severity;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_sink_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs").join("vpn_reconnect.log");

        // Pre-existing content must survive
        let sink = FileSink::new(&path).await.unwrap();
        fs::write(&path, "2024-12-31 23:59:59 : previous run\n").await.unwrap();

        sink.write(&LogEntry::new(Severity::Info, "Current IP: 1.2.3.4"))
            .await
            .unwrap();
        sink.write(&LogEntry::new(Severity::Error, "Reconnection process failed"))
            .await
            .unwrap();

        let content = fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "2024-12-31 23:59:59 : previous run");
        assert!(lines[1].ends_with(" : Current IP: 1.2.3.4"));
        assert!(lines[2].ends_with(" : Reconnection process failed"));
    }

    #[tokio::test]
    async fn test_file_sink_creates_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("var").join("log").join("vpnrot").join("activity.log");

        let sink = tokio_test::assert_ok!(FileSink::new(&path).await);
        assert!(path.parent().unwrap().is_dir());
        assert!(!path.exists(), "the file itself is created on first write");

        tokio_test::assert_ok!(sink.write(&LogEntry::new(Severity::Info, "vpnrot terminated")).await);
        assert!(path.is_file());

        // Reopening over an existing directory is fine
        tokio_test::assert_ok!(FileSink::new(&path).await);
    }

    #[tokio::test]
    async fn test_file_sink_unwritable_path_errors() {
        let dir = tempdir().unwrap();
        // A directory cannot be opened for appending
        let sink = FileSink::new(dir.path()).await.unwrap();

        tokio_test::assert_err!(sink.write(&LogEntry::new(Severity::Info, "x")).await);
    }
}
