//! Reconnect scheduler
//!
//! Runs reconnect cycles forever, one every `check_interval`, until the
//! shutdown channel fires. Shutdown is raced against both the running cycle
//! and the interval sleep, so a signal is honoured mid-cycle; the in-flight
//! cycle is dropped and the finalizer runs exactly once before `run` returns.

use crate::activity::ActivityLog;
use crate::engine::orchestrator::{CycleOutcome, ReconnectOrchestrator};
use crate::error::{Error, Result};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Capacity of the scheduler event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events emitted by the ReconnectScheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Loop entered with this reference address
    Started { initial: Ipv4Addr },

    /// A cycle is about to run
    CycleStarted { cycle: u64, reference: Ipv4Addr },

    /// A cycle finished; `reference` is what the next cycle compares against
    CycleCompleted {
        cycle: u64,
        outcome: CycleOutcome,
        reference: Ipv4Addr,
    },

    /// Finalizer ran
    Stopped { reason: String },
}

/// Fixed-interval driver of the reconnect cycle
///
/// ## Lifecycle
///
/// 1. Create with [`ReconnectScheduler::new()`]
/// 2. Call [`ReconnectScheduler::start()`], which captures the reference
///    address and then runs cycles until the shutdown channel fires
///
/// [`ReconnectScheduler::initial_address()`] and [`ReconnectScheduler::run()`]
/// are the two halves of `start` for callers that drive them separately.
pub struct ReconnectScheduler {
    orchestrator: ReconnectOrchestrator,
    log: Arc<ActivityLog>,
    check_interval: Duration,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl ReconnectScheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        orchestrator: ReconnectOrchestrator,
        log: Arc<ActivityLog>,
    ) -> (Self, mpsc::Receiver<SchedulerEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let check_interval = orchestrator.config().check_interval();

        let scheduler = Self {
            orchestrator,
            log,
            check_interval,
            event_tx: tx,
        };

        (scheduler, rx)
    }

    /// Capture the reference address the first cycle is compared against
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The current public address
    /// - `Err(Error::Precondition)`: The address is unknown; the daemon must not start
    pub async fn initial_address(&self) -> Result<Ipv4Addr> {
        match self.orchestrator.oracle().current_address().await {
            Some(ip) => {
                self.log.info(format!("Current IP: {ip}")).await;
                Ok(ip)
            }
            None => {
                self.log.error("Unable to get current IP. Exiting.").await;
                Err(Error::precondition("initial public IP address is unobtainable"))
            }
        }
    }

    /// Capture the reference address, then run cycles until shutdown
    ///
    /// Shutdown is honoured during the initial lookup too: the finalizer runs
    /// and `Ok(())` is returned without starting a cycle.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Shutdown was requested and cleanup has run
    /// - `Err(Error::Precondition)`: The initial address is unknown; nothing was started
    pub async fn start(&self, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        let mut shutdown = shutdown_rx;

        let initial = tokio::select! {
            biased;
            _ = &mut shutdown => {
                self.finalize().await;
                return Ok(());
            }
            initial = self.initial_address() => initial?,
        };

        self.run(initial, shutdown).await
    }

    /// Run cycles until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Returns `Ok(())` after the finalizer has terminated the tunnel client.
    pub async fn run(&self, initial: Ipv4Addr, shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        let mut shutdown = shutdown_rx;
        let mut reference = initial;
        let mut cycle: u64 = 0;

        self.emit_event(SchedulerEvent::Started { initial });

        loop {
            cycle += 1;
            self.log
                .info("Starting reconnection and IP verification process")
                .await;
            self.emit_event(SchedulerEvent::CycleStarted { cycle, reference });

            let outcome = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                outcome = self.orchestrator.run_cycle(reference) => outcome,
            };

            self.report(&outcome).await;
            reference = outcome.next_reference(reference);
            self.emit_event(SchedulerEvent::CycleCompleted {
                cycle,
                outcome,
                reference,
            });

            self.log
                .info(format!(
                    "Waiting {} seconds before next attempt",
                    self.check_interval.as_secs()
                ))
                .await;

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }

        self.finalize().await;
        Ok(())
    }

    /// Log the outcome of a finished cycle
    async fn report(&self, outcome: &CycleOutcome) {
        match outcome {
            CycleOutcome::Success { old, new } => {
                self.log
                    .info(format!("Success: IP changed from {old} to {new}"))
                    .await;
            }
            CycleOutcome::NoChange { .. } => {
                self.log
                    .warn("Warning: IP did not change after reconnection")
                    .await;
            }
            CycleOutcome::Failure(reason) => {
                self.log
                    .error(format!("Reconnection process failed: {reason}"))
                    .await;
            }
        }
    }

    /// Best-effort cleanup on shutdown
    async fn finalize(&self) {
        let supervisor = self.orchestrator.supervisor();
        self.log
            .info(format!(
                "Interruption requested. Terminating {}...",
                supervisor.process_name()
            ))
            .await;

        // Best-effort: the outcome is already in the activity log
        let _ = supervisor.terminate_all().await;

        self.log.info("vpnrot terminated").await;
        info!("Scheduler stopped");
        self.emit_event(SchedulerEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: SchedulerEvent) {
        // Nobody listening is fine; a full channel drops the event
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping scheduler event");
        }
    }
}
