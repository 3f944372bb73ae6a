//! Collaborator traits for the vpnrot supervisor
//!
//! Everything the supervisor touches outside its own process sits behind one
//! of these interfaces.
//!
//! - [`AddressOracle`]: Resolve the current public IPv4 address
//! - [`ProcessTable`]: Look up and kill processes by name
//! - [`TunnelClient`]: Launch the tunnel client in the background
//! - [`LogSink`]: One destination of the activity log

pub mod address_oracle;
pub mod log_sink;
pub mod process_table;
pub mod tunnel_client;

pub use address_oracle::{AddressOracle, AddressSnapshot};
pub use log_sink::LogSink;
pub use process_table::ProcessTable;
pub use tunnel_client::{LaunchRequest, TunnelClient};
