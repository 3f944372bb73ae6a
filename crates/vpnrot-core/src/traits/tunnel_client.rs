// # Tunnel Client Trait
//
// Defines how the supervisor starts the tunnel client.
//
// The client is opaque: it is launched detached with a config file and a
// credentials reference, and reports progress only through the diagnostic
// log file it is pointed at. Readiness is detected by the caller by looking
// for a literal marker in that file.

use async_trait::async_trait;
use std::path::PathBuf;

/// Everything needed to launch one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    /// Client configuration file
    pub config_file: PathBuf,
    /// Credentials reference, passed through untouched
    pub auth_file: PathBuf,
    /// Fresh file the client must write its diagnostics to
    pub log_file: PathBuf,
}

/// Trait for tunnel client implementations
///
/// # Implementations
///
/// - OpenVPN: `vpnrot-openvpn` crate
#[async_trait]
pub trait TunnelClient: Send + Sync {
    /// Name the client shows up under in the process table
    fn process_name(&self) -> &str;

    /// Start the client in the background and return without waiting for it
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The client was started (it may still fail to connect)
    /// - `Err(Error)`: The client could not be started at all
    async fn launch(&self, request: &LaunchRequest) -> Result<(), crate::Error>;
}
