// # Process Table Trait
//
// Narrow view of the OS process table.
//
// Processes are referenced by name only. The supervisor never holds a handle
// to the tunnel client it launched: the client daemonizes, and anything still
// running under that name is fair game for termination.

use async_trait::async_trait;

/// Trait for process table implementations
///
/// # Implementations
///
/// - `pgrep`/`killall` backed: `vpnrot-openvpn` crate
#[async_trait]
pub trait ProcessTable: Send + Sync {
    /// List the PIDs of every running process with exactly this name
    ///
    /// An empty list means nothing is running. An `Err` means the table
    /// could not be queried at all.
    async fn list_by_name(&self, name: &str) -> Result<Vec<u32>, crate::Error>;

    /// Send a termination signal to every process with exactly this name
    ///
    /// Must succeed when no such process exists.
    async fn kill_by_name(&self, name: &str) -> Result<(), crate::Error>;
}
