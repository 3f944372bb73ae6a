//! Error types for the vpnrot supervisor
//!
//! Only startup preconditions ever surface these to the process exit status.
//! Everything that happens inside a reconnect cycle is absorbed into a
//! [`CycleOutcome`](crate::engine::CycleOutcome) instead.

use thiserror::Error;

/// Result type alias for vpnrot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the vpnrot supervisor
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A startup or call-time precondition does not hold
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Spawning or signalling an external process failed
    #[error("Process error: {0}")]
    Process(String),

    /// Public address lookup failed
    #[error("Address lookup error: {0}")]
    AddressLookup(String),

    /// Filesystem or pipe I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// Create an address lookup error
    pub fn address_lookup(msg: impl Into<String>) -> Self {
        Self::AddressLookup(msg.into())
    }

    /// True for failures that must stop the daemon before the loop starts
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_errors_are_flagged() {
        assert!(Error::precondition("credentials file missing").is_precondition());
        assert!(!Error::process("killall exited early").is_precondition());
    }

    #[test]
    fn io_errors_convert() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: gone");
    }
}
