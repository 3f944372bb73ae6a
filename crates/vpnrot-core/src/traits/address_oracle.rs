// # Address Oracle Trait
//
// Defines the interface for resolving the current public IPv4 address.
//
// ## Implementations
//
// - HTTP echo services: `vpnrot-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use vpnrot_core::AddressOracle;
//
// let oracle = /* AddressOracle implementation */;
// match oracle.current_address().await {
//     Some(ip) => println!("public address: {ip}"),
//     None => println!("public address unknown"),
// }
// ```

use async_trait::async_trait;
use std::fmt;
use std::net::Ipv4Addr;

/// Public address observed at one point in time
///
/// `None` means the oracle could not tell; it displays as `unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressSnapshot {
    /// The observed address, if any
    pub address: Option<Ipv4Addr>,
    /// When the observation was made
    pub observed_at: chrono::DateTime<chrono::Local>,
}

impl AddressSnapshot {
    /// Snapshot taken now
    pub fn now(address: Option<Ipv4Addr>) -> Self {
        Self {
            address,
            observed_at: chrono::Local::now(),
        }
    }

    pub fn is_known(&self) -> bool {
        self.address.is_some()
    }
}

impl fmt::Display for AddressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.address {
            Some(ip) => write!(f, "{ip}"),
            None => f.write_str("unknown"),
        }
    }
}

/// Trait for public address oracles
///
/// Absence is a normal answer, not an error: network failures, timeouts,
/// non-2xx responses and unparseable bodies all collapse into `None`.
/// Callers decide whether an unknown address is fatal.
#[async_trait]
pub trait AddressOracle: Send + Sync {
    /// Get the current public IPv4 address, or `None` if it cannot be determined
    async fn current_address(&self) -> Option<Ipv4Addr>;

    /// Convenience wrapper returning a timestamped snapshot
    async fn snapshot(&self) -> AddressSnapshot {
        AddressSnapshot::now(self.current_address().await)
    }
}
