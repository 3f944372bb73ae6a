//! Reconnect supervision engine
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ ReconnectScheduler │── every check_interval ──┐
//! └────────────────────┘                          │
//!                                                 ▼
//!                                   ┌───────────────────────┐
//!                                   │ ReconnectOrchestrator │
//!                                   └───────────────────────┘
//!                                                 │
//!         ┌───────────────────────────┬───────────┴───────────────┐
//!         ▼                           ▼                           ▼
//! ┌───────────────────┐    ┌───────────────────────┐    ┌───────────────┐
//! │ ProcessSupervisor │◀───│ ConnectionEstablisher │    │ AddressOracle │
//! │ (terminate)       │    │ (launch + readiness)  │    │ (verify)      │
//! └───────────────────┘    └───────────────────────┘    └───────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Terminate every running tunnel client and confirm it is gone
//! 2. Launch the client, retrying up to `max_reconnect_attempts` times
//! 3. Let the tunnel settle for `recheck_delay`
//! 4. Look up the public address and compare it with the reference
//!
//! Retries live in two places only: per attempt inside the establisher and
//! per cycle inside the scheduler. The orchestrator itself never retries.

pub mod establisher;
pub mod orchestrator;
pub mod scheduler;
pub mod supervisor;

pub use establisher::{AttemptOutcome, ConnectOutcome, ConnectionAttempt, ConnectionEstablisher};
pub use orchestrator::{CycleOutcome, CycleStage, FailureReason, ReconnectOrchestrator};
pub use scheduler::{ReconnectScheduler, SchedulerEvent};
pub use supervisor::{ProcessSupervisor, TerminationOutcome};
