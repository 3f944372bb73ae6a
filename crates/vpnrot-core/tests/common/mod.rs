//! Test doubles and common utilities for supervisor contract tests
//!
//! The doubles stand in for the tunnel client, the process table and the
//! address oracle so whole cycles can run in milliseconds.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vpnrot_core::config::DEFAULT_READINESS_MARKER;
use vpnrot_core::error::Result;
use vpnrot_core::{
    ActivityLog, AddressOracle, CycleOutcome, Error, FileSink, LaunchRequest, MemorySink,
    ProcessTable, ReconnectOrchestrator, SchedulerEvent, SupervisorConfig, TimingConfig,
    TunnelClient,
};

pub const OLD_IP: Ipv4Addr = Ipv4Addr::new(111, 111, 111, 111);
pub const NEW_IP: Ipv4Addr = Ipv4Addr::new(123, 123, 123, 123);

/// Wait for the next CycleCompleted event
pub async fn next_completed(
    events: &mut tokio::sync::mpsc::Receiver<SchedulerEvent>,
) -> (u64, CycleOutcome, Ipv4Addr) {
    tokio::time::timeout(std::time::Duration::from_secs(10), async {
        loop {
            match events.recv().await {
                Some(SchedulerEvent::CycleCompleted {
                    cycle,
                    outcome,
                    reference,
                }) => return (cycle, outcome, reference),
                Some(_) => continue,
                None => panic!("scheduler dropped its event channel"),
            }
        }
    })
    .await
    .expect("cycle completes within 10 seconds")
}

/// Oracle answering from a script, then falling back to a fixed answer
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Option<Ipv4Addr>>>,
    fallback: Option<Ipv4Addr>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Option<Ipv4Addr>>, fallback: Option<Ipv4Addr>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers with `ip`
    pub fn fixed(ip: Option<Ipv4Addr>) -> Self {
        Self::new(Vec::new(), ip)
    }

    /// Get the number of times current_address() was called
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressOracle for ScriptedOracle {
    async fn current_address(&self) -> Option<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}

/// Oracle whose lookups never complete, like a service that accepts but never replies
#[derive(Default)]
pub struct PendingOracle {
    calls: AtomicUsize,
}

impl PendingOracle {
    /// Get the number of lookups started
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressOracle for PendingOracle {
    async fn current_address(&self) -> Option<Ipv4Addr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

/// In-memory process table
pub struct FakeProcessTable {
    running: Mutex<Vec<u32>>,
    /// Processes ignore termination signals
    stubborn: bool,
    kill_calls: AtomicUsize,
    list_calls: AtomicUsize,
    next_pid: AtomicU32,
}

impl FakeProcessTable {
    pub fn new() -> Self {
        Self::with_running(Vec::new(), false)
    }

    pub fn with_running(running: Vec<u32>, stubborn: bool) -> Self {
        Self {
            running: Mutex::new(running),
            stubborn,
            kill_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            next_pid: AtomicU32::new(1000),
        }
    }

    /// Register a freshly launched process
    pub fn spawn(&self) -> u32 {
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.running.lock().unwrap().push(pid);
        pid
    }

    pub fn running(&self) -> Vec<u32> {
        self.running.lock().unwrap().clone()
    }

    /// Get the number of times kill_by_name() was called
    pub fn kill_count(&self) -> usize {
        self.kill_calls.load(Ordering::SeqCst)
    }

    /// Get the number of times list_by_name() was called
    pub fn list_count(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProcessTable for FakeProcessTable {
    async fn list_by_name(&self, _name: &str) -> Result<Vec<u32>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.running())
    }

    async fn kill_by_name(&self, _name: &str) -> Result<()> {
        self.kill_calls.fetch_add(1, Ordering::SeqCst);
        if !self.stubborn {
            self.running.lock().unwrap().clear();
        }
        Ok(())
    }
}

/// What the scripted client does on one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchPlan {
    /// Start and write the readiness marker
    Ready,
    /// Start but never become ready
    Silent,
    /// Fail to start at all
    SpawnError,
}

/// Tunnel client following a per-launch plan
pub struct ScriptedClient {
    plans: Mutex<VecDeque<LaunchPlan>>,
    fallback: LaunchPlan,
    table: Arc<FakeProcessTable>,
    requests: Mutex<Vec<LaunchRequest>>,
}

impl ScriptedClient {
    pub fn new(plans: Vec<LaunchPlan>, fallback: LaunchPlan, table: Arc<FakeProcessTable>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            fallback,
            table,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Get the number of launch() calls
    pub fn launch_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl TunnelClient for ScriptedClient {
    fn process_name(&self) -> &str {
        "openvpn"
    }

    async fn launch(&self, request: &LaunchRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        let plan = self
            .plans
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback);

        match plan {
            LaunchPlan::SpawnError => Err(Error::process("No such file or directory (os error 2)")),
            LaunchPlan::Silent => {
                self.table.spawn();
                tokio::fs::write(&request.log_file, "TLS Error: TLS handshake failed\n").await?;
                Ok(())
            }
            LaunchPlan::Ready => {
                self.table.spawn();
                tokio::fs::write(
                    &request.log_file,
                    format!("Peer Connection Initiated\n{DEFAULT_READINESS_MARKER}\n"),
                )
                .await?;
                Ok(())
            }
        }
    }
}

/// Config with real files under `dir` and millisecond timings
pub fn fast_config(dir: &std::path::Path) -> SupervisorConfig {
    let configs = dir.join("vpn_configs");
    std::fs::create_dir_all(&configs).unwrap();
    let config_file = configs.join("nl-free-2.protonvpn.udp.ovpn");
    std::fs::write(&config_file, "client\nproto udp\n").unwrap();
    let auth_file = dir.join("auth.txt");
    std::fs::write(&auth_file, "user\npassword\n").unwrap();

    let mut config = SupervisorConfig::new(config_file, auth_file);
    config.log_file = dir.join("vpn_reconnect.log");
    config.temp_log_file = dir.join("openvpn_temp.log");
    config.check_interval_secs = 1;
    config.recheck_delay_secs = 0;
    config.timing = TimingConfig {
        terminate_settle_millis: 1,
        connect_settle_millis: 50,
        readiness_poll_millis: 5,
        attempt_cooldown_millis: 1,
        address_check_attempts: 3,
        address_retry_delay_millis: 1,
        address_timeout_millis: 100,
    };
    config
}

/// Everything a contract test needs to drive and observe one orchestrator
pub struct Harness {
    pub config: Arc<SupervisorConfig>,
    pub table: Arc<FakeProcessTable>,
    pub client: Arc<ScriptedClient>,
    pub oracle: Arc<ScriptedOracle>,
    pub memory: MemorySink,
    pub log: Arc<ActivityLog>,
}

impl Harness {
    pub fn new(
        config: SupervisorConfig,
        table: FakeProcessTable,
        plans: Vec<LaunchPlan>,
        fallback: LaunchPlan,
        oracle: ScriptedOracle,
    ) -> Self {
        let table = Arc::new(table);
        let client = Arc::new(ScriptedClient::new(plans, fallback, table.clone()));
        let memory = MemorySink::new();
        let log = Arc::new(ActivityLog::new(vec![Box::new(memory.clone())]));

        Self {
            config: Arc::new(config),
            table,
            client,
            oracle: Arc::new(oracle),
            memory,
            log,
        }
    }

    pub fn orchestrator(&self) -> ReconnectOrchestrator {
        ReconnectOrchestrator::new(
            self.config.clone(),
            self.client.clone(),
            self.table.clone(),
            self.oracle.clone(),
            self.log.clone(),
        )
        .expect("orchestrator construction succeeds")
    }

    /// Also write the activity log to `config.log_file`
    pub async fn with_file_sink(mut self) -> Self {
        let file = FileSink::new(&self.config.log_file)
            .await
            .expect("log directory is writable");
        self.log = Arc::new(ActivityLog::new(vec![
            Box::new(self.memory.clone()),
            Box::new(file),
        ]));
        self
    }

    pub fn temp_log(&self) -> PathBuf {
        self.config.temp_log_file.clone()
    }
}
