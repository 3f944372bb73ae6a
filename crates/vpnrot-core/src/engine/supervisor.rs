//! Process supervisor
//!
//! Kill-by-name with confirmation. Used at the start of every cycle, after
//! every failed connection attempt and once more on shutdown.

use crate::activity::ActivityLog;
use crate::traits::ProcessTable;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Result of one [`ProcessSupervisor::terminate_all`] call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationOutcome {
    /// No instance is running any more
    Terminated,
    /// Instances survived the settle period
    StillRunning { pids: Vec<u32> },
    /// The process table could not be signalled or queried
    Unconfirmed { reason: String },
}

impl TerminationOutcome {
    pub fn is_terminated(&self) -> bool {
        matches!(self, TerminationOutcome::Terminated)
    }
}

/// Terminates every instance of the tunnel client by name
pub struct ProcessSupervisor {
    table: Arc<dyn ProcessTable>,
    process_name: String,
    settle: Duration,
    log: Arc<ActivityLog>,
}

impl ProcessSupervisor {
    /// Create a supervisor for processes called `process_name`
    ///
    /// `settle` is the wait between sending the signal and checking the table.
    pub fn new(
        table: Arc<dyn ProcessTable>,
        process_name: impl Into<String>,
        settle: Duration,
        log: Arc<ActivityLog>,
    ) -> Self {
        Self {
            table,
            process_name: process_name.into(),
            settle,
            log,
        }
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Signal every instance, wait, then confirm none are left
    ///
    /// Idempotent: with nothing running this returns `Terminated`. Failures
    /// are reported through the outcome, never raised.
    pub async fn terminate_all(&self) -> TerminationOutcome {
        let name = &self.process_name;
        self.log
            .info(format!("Terminating existing {name} processes..."))
            .await;

        if let Err(e) = self.table.kill_by_name(name).await {
            self.log
                .error(format!("Error terminating {name}: {e}"))
                .await;
            return TerminationOutcome::Unconfirmed {
                reason: e.to_string(),
            };
        }

        debug!("Waiting {:?} for {} to exit", self.settle, name);
        tokio::time::sleep(self.settle).await;

        match self.table.list_by_name(name).await {
            Ok(pids) if pids.is_empty() => {
                self.log
                    .info(format!("{name} processes terminated successfully"))
                    .await;
                TerminationOutcome::Terminated
            }
            Ok(pids) => {
                self.log
                    .error(format!(
                        "Failed to terminate all {name} processes ({} still running)",
                        pids.len()
                    ))
                    .await;
                TerminationOutcome::StillRunning { pids }
            }
            Err(e) => {
                self.log
                    .error(format!("Error checking for running {name} processes: {e}"))
                    .await;
                TerminationOutcome::Unconfirmed {
                    reason: e.to_string(),
                }
            }
        }
    }
}
