// # vpnrotd - VPN Rotation Daemon
//
// Thin integration layer over vpnrot-core:
// 1. Reading configuration from environment variables
// 2. Initializing tracing and the runtime
// 3. Installing SIGTERM/SIGINT handlers before anything else can block
// 4. Checking startup preconditions (root, config dir and file, credentials, tools)
// 5. Wiring the OpenVPN client, the process table and the HTTP oracle
// 6. Running the reconnect scheduler until a signal arrives
//
// Reconnect, retry and verification logic all live in vpnrot-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Tunnel
// - `VPNROT_CONFIG_FILE`: OpenVPN config file (required)
// - `VPNROT_AUTH_FILE`: Credentials file passed to `--auth-user-pass` (required)
// - `VPNROT_CLIENT_BINARY`: Client binary (default: openvpn)
//
// ### Schedule
// - `VPNROT_CHECK_INTERVAL_SECS`: Seconds between cycles (60-86400, default 1800)
// - `VPNROT_RECHECK_DELAY_SECS`: Settle time before the address check (0-600, default 15)
// - `VPNROT_MAX_RECONNECT_ATTEMPTS`: Launch attempts per cycle (1-10, default 3)
//
// ### Address Lookup
// - `VPNROT_IP_SERVICES`: Comma-separated echo service URLs, tried in order
//
// ### Logging
// - `VPNROT_LOG_FILE`: Activity log file
// - `VPNROT_TEMP_LOG_FILE`: Scratch log the client writes during an attempt
// - `VPNROT_LOG_LEVEL`: trace, debug, info, warn, error (default: info)
//
// ### Startup
// - `VPNROT_REQUIRE_ROOT`: Refuse to start unless root (default: true)
//
// ## Example
//
// ```bash
// export VPNROT_CONFIG_FILE=/etc/vpnrot/vpn_configs/nl-free-2.protonvpn.udp.ovpn
// export VPNROT_AUTH_FILE=/etc/vpnrot/auth.txt
// export VPNROT_CHECK_INTERVAL_SECS=1800
//
// vpnrotd
// ```

use anyhow::Result;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use vpnrot_core::preflight;
use vpnrot_core::{
    ActivityLog, FileSink, ReconnectOrchestrator, ReconnectScheduler, SupervisorConfig,
};
use vpnrot_ip_http::HttpAddressOracle;
use vpnrot_openvpn::{OpenVpnClient, REQUIRED_TOOLS, SystemProcessTable};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VpnrotExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or unmet startup precondition
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<VpnrotExitCode> for ExitCode {
    fn from(code: VpnrotExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    supervisor: SupervisorConfig,
    log_level: String,
    require_root: bool,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config_file = var("VPNROT_CONFIG_FILE").filter(|s| !s.is_empty()).ok_or_else(|| {
            anyhow::anyhow!(
                "VPNROT_CONFIG_FILE is required. \
                Set it via: export VPNROT_CONFIG_FILE=/etc/vpnrot/vpn_configs/server.ovpn"
            )
        })?;
        let auth_file = var("VPNROT_AUTH_FILE").filter(|s| !s.is_empty()).ok_or_else(|| {
            anyhow::anyhow!(
                "VPNROT_AUTH_FILE is required. \
                Set it via: export VPNROT_AUTH_FILE=/etc/vpnrot/auth.txt"
            )
        })?;

        let mut supervisor = SupervisorConfig::new(config_file, auth_file);

        if let Some(v) = parse_var::<u64>(&var, "VPNROT_CHECK_INTERVAL_SECS")? {
            supervisor.check_interval_secs = v;
        }
        if let Some(v) = parse_var::<u64>(&var, "VPNROT_RECHECK_DELAY_SECS")? {
            supervisor.recheck_delay_secs = v;
        }
        if let Some(v) = parse_var::<u32>(&var, "VPNROT_MAX_RECONNECT_ATTEMPTS")? {
            supervisor.max_reconnect_attempts = v;
        }
        if let Some(v) = var("VPNROT_LOG_FILE") {
            supervisor.log_file = PathBuf::from(v);
        }
        if let Some(v) = var("VPNROT_TEMP_LOG_FILE") {
            supervisor.temp_log_file = PathBuf::from(v);
        }
        if let Some(v) = var("VPNROT_CLIENT_BINARY") {
            supervisor.client_binary = v;
        }
        if let Some(v) = var("VPNROT_IP_SERVICES") {
            supervisor.ip_services = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        let require_root = match var("VPNROT_REQUIRE_ROOT") {
            None => true,
            Some(v) => match v.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => anyhow::bail!("VPNROT_REQUIRE_ROOT must be true or false. Got: {}", v),
            },
        };

        Ok(Self {
            supervisor,
            log_level: var("VPNROT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            require_root,
        })
    }

    /// Validate the configuration
    ///
    /// Range checks for the operator-facing knobs, then the core
    /// configuration's own invariants.
    fn validate(&self) -> Result<()> {
        let s = &self.supervisor;

        if !(60..=86_400).contains(&s.check_interval_secs) {
            anyhow::bail!(
                "VPNROT_CHECK_INTERVAL_SECS must be between 60 and 86400 seconds. Got: {}",
                s.check_interval_secs
            );
        }

        if s.recheck_delay_secs > 600 {
            anyhow::bail!(
                "VPNROT_RECHECK_DELAY_SECS must be between 0 and 600 seconds. Got: {}",
                s.recheck_delay_secs
            );
        }

        if !(1..=10).contains(&s.max_reconnect_attempts) {
            anyhow::bail!(
                "VPNROT_MAX_RECONNECT_ATTEMPTS must be between 1 and 10. Got: {}",
                s.max_reconnect_attempts
            );
        }

        for url in &s.ip_services {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                anyhow::bail!(
                    "VPNROT_IP_SERVICES entries must use HTTP or HTTPS scheme. Got: {}",
                    url
                );
            }
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "VPNROT_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        s.validate()?;
        Ok(())
    }
}

/// Parse an optional numeric variable; present but malformed is an error
fn parse_var<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match var(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} must be a non-negative integer. Got: {}", key, raw)),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return VpnrotExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return VpnrotExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return VpnrotExitCode::ConfigError.into();
    }

    info!("Starting vpnrotd daemon");
    info!(
        "Configuration loaded: config={}, interval={}s",
        config.supervisor.config_file.display(),
        config.supervisor.check_interval_secs
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return VpnrotExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config)).into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> VpnrotExitCode {
    // Signal handlers first, so a signal at any later point is a clean shutdown
    let signals = match ShutdownSignals::install() {
        Ok(signals) => signals,
        Err(e) => {
            error!("Signal handling error: {}", e);
            return VpnrotExitCode::RuntimeError;
        }
    };
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match signals.recv().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Signal handling error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    if config.require_root && !running_as_root() {
        error!("This program must be run as root");
        eprintln!("vpnrotd must be run as root (set VPNROT_REQUIRE_ROOT=false to override)");
        return VpnrotExitCode::ConfigError;
    }

    let supervisor_config = Arc::new(config.supervisor);

    // Activity log: file + syslog
    let log = match build_activity_log(&supervisor_config).await {
        Ok(log) => Arc::new(log),
        Err(e) => {
            error!("Failed to open activity log: {}", e);
            return VpnrotExitCode::ConfigError;
        }
    };

    let mut tools = vec![supervisor_config.client_binary.as_str()];
    tools.extend_from_slice(REQUIRED_TOOLS);
    if let Err(code) = check_startup(&supervisor_config, &tools, &log).await {
        return code;
    }

    // Collaborators
    let client = Arc::new(OpenVpnClient::new(supervisor_config.client_binary.clone()));
    let table = Arc::new(SystemProcessTable::new());
    let oracle = match HttpAddressOracle::from_config(&supervisor_config) {
        Ok(oracle) => Arc::new(oracle),
        Err(e) => {
            error!("Failed to create address oracle: {}", e);
            return VpnrotExitCode::RuntimeError;
        }
    };

    let orchestrator = match ReconnectOrchestrator::new(
        supervisor_config.clone(),
        client,
        table,
        oracle,
        log.clone(),
    ) {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            error!("Failed to create orchestrator: {}", e);
            return VpnrotExitCode::ConfigError;
        }
    };

    let (scheduler, mut events) = ReconnectScheduler::new(orchestrator, log.clone());

    // Nothing consumes scheduler events here; drain them so they show up at debug level
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            tracing::debug!(?event, "Scheduler event");
        }
    });

    info!("Daemon initialized successfully");

    match scheduler.start(shutdown_rx).await {
        Ok(()) => {
            info!("Shutting down daemon");
            VpnrotExitCode::CleanShutdown
        }
        Err(e) => exit_code_for(&e),
    }
}

/// Check startup preconditions, reporting failures to the activity log
///
/// # Returns
///
/// - `Ok(())`: Every precondition holds; the scheduler may start
/// - `Err(VpnrotExitCode::ConfigError)`: A precondition failed and was logged
async fn check_startup(
    config: &SupervisorConfig,
    tools: &[&str],
    log: &ActivityLog,
) -> std::result::Result<(), VpnrotExitCode> {
    if let Err(e) = preflight::verify_requirements(config, tools) {
        log.error(format!("Error: {}", precondition_message(&e))).await;
        return Err(exit_code_for(&e));
    }

    if let Some(hint) = preflight::credentials_permission_warning(&config.auth_file) {
        log.warn(hint).await;
    }

    Ok(())
}

/// Map a core error to the process exit status
fn exit_code_for(err: &vpnrot_core::Error) -> VpnrotExitCode {
    if err.is_precondition() {
        VpnrotExitCode::ConfigError
    } else {
        error!("Daemon error: {}", err);
        VpnrotExitCode::RuntimeError
    }
}

/// Build the activity log with its file and syslog sinks
async fn build_activity_log(config: &SupervisorConfig) -> Result<ActivityLog> {
    let log = ActivityLog::new(vec![Box::new(FileSink::new(&config.log_file).await?)]);

    #[cfg(unix)]
    let log = log.with_sink(Box::new(vpnrot_core::SyslogSink::new()));

    info!(
        "Activity log: {} ({} sink(s))",
        config.log_file.display(),
        log.sink_count()
    );
    Ok(log)
}

/// Strip the error-kind prefix from a precondition failure
fn precondition_message(err: &vpnrot_core::Error) -> String {
    match err {
        vpnrot_core::Error::Precondition(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    tracing::warn!("Root check is not supported on this platform; skipping");
    true
}

/// Registered SIGTERM/SIGINT listeners
///
/// Registration happens in [`ShutdownSignals::install`], so signals that
/// arrive before anyone awaits [`ShutdownSignals::recv`] are not lost.
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: tokio::signal::unix::Signal,
    sigint: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
        let sigint = signal(SignalKind::interrupt())
            .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;
        Ok(Self { sigterm, sigint })
    }

    /// Wait for the first signal and return its name
    async fn recv(mut self) -> Result<&'static str> {
        let signal = tokio::select! {
            _ = self.sigterm.recv() => "SIGTERM",
            _ = self.sigint.recv() => "SIGINT",
        };
        Ok(signal)
    }
}

/// CTRL-C listener
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(self) -> Result<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
        Ok("SIGINT")
    }
}
