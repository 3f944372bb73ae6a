//! Reconnect orchestrator
//!
//! Runs one full reconnect-and-verify cycle:
//!
//! ```text
//! Idle → Terminating → Connecting → Settling → Verifying → Done
//! ```
//!
//! Any stage can abort the cycle with a [`FailureReason`]. Nothing is retried
//! here; the establisher retries launches and the scheduler retries cycles.

use crate::activity::ActivityLog;
use crate::config::SupervisorConfig;
use crate::engine::establisher::{ConnectOutcome, ConnectionEstablisher};
use crate::engine::supervisor::ProcessSupervisor;
use crate::error::Result;
use crate::traits::{AddressOracle, ProcessTable, TunnelClient};
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::debug;

/// Position of a cycle in its linear state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    Terminating,
    Connecting,
    Settling,
    Verifying,
    Done,
}

/// Why a cycle was aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Old client instances could not be confirmed gone
    TerminationIncomplete,
    /// The connect call refused to start (missing config file)
    ConnectPrecondition(String),
    /// Every connection attempt failed
    ConnectionExhausted { attempts: u32 },
    /// Connected, but the new public address could not be determined
    AddressUnobtainable,
}

impl FailureReason {
    /// Stage the cycle was in when it failed
    pub fn stage(&self) -> CycleStage {
        match self {
            FailureReason::TerminationIncomplete => CycleStage::Terminating,
            FailureReason::ConnectPrecondition(_) | FailureReason::ConnectionExhausted { .. } => {
                CycleStage::Connecting
            }
            FailureReason::AddressUnobtainable => CycleStage::Verifying,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::TerminationIncomplete => {
                f.write_str("could not terminate existing tunnel client processes")
            }
            FailureReason::ConnectPrecondition(msg) => write!(f, "cannot connect: {msg}"),
            FailureReason::ConnectionExhausted { attempts } => {
                write!(f, "connection failed after {attempts} attempts")
            }
            FailureReason::AddressUnobtainable => {
                f.write_str("new IP address could not be determined")
            }
        }
    }
}

/// Outcome of one reconnect cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The public address moved
    Success { old: Ipv4Addr, new: Ipv4Addr },
    /// Reconnected, but the public address is the same
    NoChange { old: Ipv4Addr, new: Ipv4Addr },
    /// The cycle was aborted
    Failure(FailureReason),
}

impl CycleOutcome {
    /// Reference address to compare against in the next cycle
    ///
    /// Only a `Success` moves the reference.
    pub fn next_reference(&self, current: Ipv4Addr) -> Ipv4Addr {
        match self {
            CycleOutcome::Success { new, .. } => *new,
            CycleOutcome::NoChange { .. } | CycleOutcome::Failure(_) => current,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success { .. })
    }
}

/// Composes supervisor, establisher and oracle into one reconnect cycle
pub struct ReconnectOrchestrator {
    config: Arc<SupervisorConfig>,
    supervisor: Arc<ProcessSupervisor>,
    establisher: ConnectionEstablisher,
    oracle: Arc<dyn AddressOracle>,
    log: Arc<ActivityLog>,
}

impl ReconnectOrchestrator {
    /// Create an orchestrator
    ///
    /// # Parameters
    ///
    /// - `config`: Supervisor configuration (validated here)
    /// - `client`: Tunnel client launcher
    /// - `table`: Process table used for kill-by-name
    /// - `oracle`: Public address oracle
    /// - `log`: Shared activity log
    pub fn new(
        config: Arc<SupervisorConfig>,
        client: Arc<dyn TunnelClient>,
        table: Arc<dyn ProcessTable>,
        oracle: Arc<dyn AddressOracle>,
        log: Arc<ActivityLog>,
    ) -> Result<Self> {
        config.validate()?;

        let supervisor = Arc::new(ProcessSupervisor::new(
            table,
            client.process_name(),
            config.timing.terminate_settle(),
            log.clone(),
        ));
        let establisher =
            ConnectionEstablisher::new(client, supervisor.clone(), log.clone(), &config);

        Ok(Self {
            config,
            supervisor,
            establisher,
            oracle,
            log,
        })
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn oracle(&self) -> &Arc<dyn AddressOracle> {
        &self.oracle
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Run one reconnect cycle against `previous`
    ///
    /// Never fails: every abort is folded into [`CycleOutcome::Failure`].
    pub async fn run_cycle(&self, previous: Ipv4Addr) -> CycleOutcome {
        debug!("Cycle stage: {:?}", CycleStage::Idle);

        self.enter(CycleStage::Terminating);
        if !self.supervisor.terminate_all().await.is_terminated() {
            return CycleOutcome::Failure(FailureReason::TerminationIncomplete);
        }

        self.enter(CycleStage::Connecting);
        match self
            .establisher
            .connect(&self.config.config_file, &self.config.auth_file)
            .await
        {
            Ok(ConnectOutcome::Ready { .. }) => {}
            Ok(outcome @ ConnectOutcome::Exhausted { .. }) => {
                return CycleOutcome::Failure(FailureReason::ConnectionExhausted {
                    attempts: outcome.attempt_count(),
                });
            }
            Err(e) => {
                return CycleOutcome::Failure(FailureReason::ConnectPrecondition(e.to_string()));
            }
        }

        self.enter(CycleStage::Settling);
        let delay = self.config.recheck_delay();
        self.log
            .info(format!(
                "Waiting {} seconds before checking new IP...",
                delay.as_secs()
            ))
            .await;
        tokio::time::sleep(delay).await;

        self.enter(CycleStage::Verifying);
        let Some(new) = self.verify_address().await else {
            return CycleOutcome::Failure(FailureReason::AddressUnobtainable);
        };

        self.enter(CycleStage::Done);
        if new == previous {
            CycleOutcome::NoChange { old: previous, new }
        } else {
            CycleOutcome::Success { old: previous, new }
        }
    }

    /// Look up the new address, retrying a few times after the tunnel came up
    async fn verify_address(&self) -> Option<Ipv4Addr> {
        let attempts = self.config.timing.address_check_attempts;

        for attempt in 1..=attempts {
            if let Some(ip) = self.oracle.current_address().await {
                self.log.info(format!("New IP: {ip}")).await;
                return Some(ip);
            }

            self.log
                .warn(format!("Failed to get IP (attempt {attempt}/{attempts})"))
                .await;
            if attempt < attempts {
                tokio::time::sleep(self.config.timing.address_retry_delay()).await;
            }
        }

        self.log
            .error("Failed to get new IP after reconnection")
            .await;
        None
    }

    fn enter(&self, stage: CycleStage) {
        debug!("Cycle stage: {:?}", stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_success_moves_the_reference() {
        let old = Ipv4Addr::new(111, 111, 111, 111);
        let new = Ipv4Addr::new(123, 123, 123, 123);

        assert_eq!(CycleOutcome::Success { old, new }.next_reference(old), new);
        assert_eq!(CycleOutcome::NoChange { old, new: old }.next_reference(old), old);
        assert_eq!(
            CycleOutcome::Failure(FailureReason::AddressUnobtainable).next_reference(old),
            old
        );
    }

    #[test]
    fn failure_reasons_name_their_stage() {
        assert_eq!(FailureReason::TerminationIncomplete.stage(), CycleStage::Terminating);
        assert_eq!(
            FailureReason::ConnectionExhausted { attempts: 3 }.stage(),
            CycleStage::Connecting
        );
        assert_eq!(FailureReason::AddressUnobtainable.stage(), CycleStage::Verifying);
        assert_eq!(
            FailureReason::ConnectionExhausted { attempts: 3 }.to_string(),
            "connection failed after 3 attempts"
        );
    }
}
