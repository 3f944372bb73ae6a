//! Connection establisher
//!
//! Launches the tunnel client and waits for it to report readiness in its
//! diagnostic log. Each attempt gets a fresh scratch log; a failed attempt
//! kills every client instance, discards the log and cools down before the
//! next launch.
//!
//! Readiness is polled every `readiness_poll` up to `connect_settle`, so a
//! fast connection is noticed early while a slow one gets exactly the same
//! maximum wait as a single check after the full settle period.

use crate::activity::ActivityLog;
use crate::config::SupervisorConfig;
use crate::engine::supervisor::ProcessSupervisor;
use crate::error::{Error, Result};
use crate::traits::{LaunchRequest, TunnelClient};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::Instant;
use tracing::debug;

/// Result of one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The readiness marker showed up in time
    Ready,
    /// The launch failed or the marker never appeared
    TimedOutOrFailed,
}

/// Record of one launch, discarded after the cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionAttempt {
    /// 1-based attempt number
    pub number: u32,
    pub started_at: chrono::DateTime<chrono::Local>,
    pub outcome: AttemptOutcome,
}

/// Result of [`ConnectionEstablisher::connect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// The last attempt in the list succeeded
    Ready { attempts: Vec<ConnectionAttempt> },
    /// Every allowed attempt failed
    Exhausted { attempts: Vec<ConnectionAttempt> },
}

impl ConnectOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectOutcome::Ready { .. })
    }

    /// Number of client launches made
    pub fn attempt_count(&self) -> u32 {
        match self {
            ConnectOutcome::Ready { attempts } | ConnectOutcome::Exhausted { attempts } => {
                attempts.len() as u32
            }
        }
    }
}

/// Bounded-retry tunnel client launcher
pub struct ConnectionEstablisher {
    client: Arc<dyn TunnelClient>,
    supervisor: Arc<ProcessSupervisor>,
    log: Arc<ActivityLog>,
    max_attempts: u32,
    temp_log: PathBuf,
    readiness_marker: String,
    connect_settle: Duration,
    readiness_poll: Duration,
    cooldown: Duration,
}

impl ConnectionEstablisher {
    /// Create an establisher from the supervisor configuration
    ///
    /// `supervisor` is used to clean up after failed attempts.
    pub fn new(
        client: Arc<dyn TunnelClient>,
        supervisor: Arc<ProcessSupervisor>,
        log: Arc<ActivityLog>,
        config: &SupervisorConfig,
    ) -> Self {
        Self {
            client,
            supervisor,
            log,
            max_attempts: config.max_reconnect_attempts,
            temp_log: config.temp_log_file.clone(),
            readiness_marker: config.readiness_marker.clone(),
            connect_settle: config.timing.connect_settle(),
            readiness_poll: config.timing.readiness_poll(),
            cooldown: config.timing.attempt_cooldown(),
        }
    }

    /// Launch the client until it reports readiness or attempts run out
    ///
    /// # Returns
    ///
    /// - `Ok(ConnectOutcome::Ready)`: The client is up; no further launches made
    /// - `Ok(ConnectOutcome::Exhausted)`: All `max_attempts` launches failed
    /// - `Err(Error::Precondition)`: The config file is missing; nothing was launched
    pub async fn connect(&self, config_file: &Path, auth_file: &Path) -> Result<ConnectOutcome> {
        if !fs::try_exists(config_file).await.unwrap_or(false) {
            let msg = format!("Config file {} not found", config_file.display());
            self.log.error(msg.clone()).await;
            return Err(Error::precondition(msg));
        }

        let name = self.client.process_name().to_string();
        let request = LaunchRequest {
            config_file: config_file.to_path_buf(),
            auth_file: auth_file.to_path_buf(),
            log_file: self.temp_log.clone(),
        };
        let mut attempts = Vec::new();

        for number in 1..=self.max_attempts {
            self.log
                .info(format!("Attempting to reconnect to {name} (Attempt {number})"))
                .await;
            let started_at = chrono::Local::now();

            self.discard_temp_log().await;

            if let Err(e) = self.client.launch(&request).await {
                self.log
                    .error(format!("Error during {name} connection: {e}"))
                    .await;
                self.discard_temp_log().await;
                attempts.push(ConnectionAttempt {
                    number,
                    started_at,
                    outcome: AttemptOutcome::TimedOutOrFailed,
                });
                continue;
            }

            if self.wait_for_readiness().await {
                self.log.info(format!("{name} connected successfully")).await;
                self.discard_temp_log().await;
                attempts.push(ConnectionAttempt {
                    number,
                    started_at,
                    outcome: AttemptOutcome::Ready,
                });
                return Ok(ConnectOutcome::Ready { attempts });
            }

            self.log
                .error(format!("{name} failed to connect properly"))
                .await;
            attempts.push(ConnectionAttempt {
                number,
                started_at,
                outcome: AttemptOutcome::TimedOutOrFailed,
            });

            // Outcome is logged by the supervisor; the next launch goes ahead regardless
            let _ = self.supervisor.terminate_all().await;
            self.discard_temp_log().await;
            tokio::time::sleep(self.cooldown).await;
        }

        self.log
            .error(format!(
                "{name} reconnection failed after {} attempts",
                self.max_attempts
            ))
            .await;
        Ok(ConnectOutcome::Exhausted { attempts })
    }

    /// Poll the scratch log until the marker shows up or the settle period ends
    async fn wait_for_readiness(&self) -> bool {
        let deadline = Instant::now() + self.connect_settle;

        loop {
            if self.marker_present().await {
                return true;
            }

            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            tokio::time::sleep(self.readiness_poll.min(deadline - now)).await;
        }
    }

    async fn marker_present(&self) -> bool {
        match fs::read(&self.temp_log).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).contains(&self.readiness_marker),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                debug!("Cannot read {}: {}", self.temp_log.display(), e);
                false
            }
        }
    }

    async fn discard_temp_log(&self) {
        match fs::remove_file(&self.temp_log).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!("Cannot remove {}: {}", self.temp_log.display(), e),
        }
    }
}
