// # vpnrot-core
//
// Core library for the vpnrot reconnect supervisor.
//
// ## Architecture Overview
//
// The supervisor periodically tears the VPN tunnel down, brings it back up
// and checks that the public address actually moved:
// - **AddressOracle**: Trait for resolving the current public IPv4 address
// - **ProcessTable**: Trait for name-based process lookup and termination
// - **TunnelClient**: Trait for launching the tunnel client in the background
// - **LogSink**: Trait for one destination of the activity log
// - **ProcessSupervisor**: Kill-by-name with post-kill confirmation
// - **ConnectionEstablisher**: Bounded-retry launch with readiness detection
// - **ReconnectOrchestrator**: One terminate → connect → settle → verify cycle
// - **ReconnectScheduler**: Runs cycles forever until a shutdown signal arrives
//
// ## Design Principles
//
// 1. **One actor**: cycles and attempts never overlap
// 2. **Two retry layers**: attempts inside a cycle, cycles inside the scheduler
// 3. **Absorb, log, continue**: only startup preconditions are fatal
// 4. **Library-first**: the daemon is a thin wiring layer over this crate

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod preflight;
pub mod traits;

// Re-export core types for convenience
pub use activity::{ActivityLog, FileSink, LogEntry, MemorySink, Severity};
pub use config::{SupervisorConfig, TimingConfig};
pub use engine::{
    AttemptOutcome, ConnectOutcome, ConnectionAttempt, ConnectionEstablisher, CycleOutcome,
    CycleStage, FailureReason, ProcessSupervisor, ReconnectOrchestrator, ReconnectScheduler,
    SchedulerEvent, TerminationOutcome,
};
pub use error::{Error, Result};
pub use traits::{AddressOracle, AddressSnapshot, LaunchRequest, LogSink, ProcessTable, TunnelClient};

#[cfg(unix)]
pub use activity::SyslogSink;
