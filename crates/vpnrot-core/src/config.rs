//! Configuration types for the vpnrot supervisor
//!
//! The configuration is loaded once at startup and handed to every component
//! by shared reference. Nothing in the supervisor ever mutates it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default public address echo services, tried in order
pub const DEFAULT_IP_SERVICES: &[&str] = &[
    "https://api.ipify.org?format=text",
    "https://v4.ident.me/",
    "https://ipv4.icanhazip.com/",
    "http://ipv4.whatismyip.akamai.com/",
];

/// Literal the OpenVPN client writes once the tunnel is usable
pub const DEFAULT_READINESS_MARKER: &str = "Initialization Sequence Completed";

/// Main supervisor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Tunnel client configuration file (its parent is the config directory)
    pub config_file: PathBuf,

    /// Credentials reference passed through to the client untouched
    pub auth_file: PathBuf,

    /// Pause between two reconnect cycles (in seconds)
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Pause between a successful connect and the address check (in seconds)
    #[serde(default = "default_recheck_delay_secs")]
    pub recheck_delay_secs: u64,

    /// Maximum client launches per connect call
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Append-only activity log
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Scratch file the client writes its diagnostics to during one attempt
    #[serde(default = "default_temp_log_file")]
    pub temp_log_file: PathBuf,

    /// Tunnel client executable (also the process name used for kill-by-name)
    #[serde(default = "default_client_binary")]
    pub client_binary: String,

    /// Literal searched for in the client diagnostics
    #[serde(default = "default_readiness_marker")]
    pub readiness_marker: String,

    /// Address echo services, tried in order until one answers
    #[serde(default = "default_ip_services")]
    pub ip_services: Vec<String>,

    /// Fixed waits used inside a cycle
    #[serde(default)]
    pub timing: TimingConfig,
}

impl SupervisorConfig {
    /// Create a configuration with defaults for everything but the two input files
    pub fn new(config_file: impl Into<PathBuf>, auth_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
            auth_file: auth_file.into(),
            check_interval_secs: default_check_interval_secs(),
            recheck_delay_secs: default_recheck_delay_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            log_file: default_log_file(),
            temp_log_file: default_temp_log_file(),
            client_binary: default_client_binary(),
            readiness_marker: default_readiness_marker(),
            ip_services: default_ip_services(),
            timing: TimingConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.config_file.as_os_str().is_empty() {
            return Err(crate::Error::config("Tunnel config file path cannot be empty"));
        }
        if self.auth_file.as_os_str().is_empty() {
            return Err(crate::Error::config("Credentials file path cannot be empty"));
        }
        if self.log_file.as_os_str().is_empty() || self.temp_log_file.as_os_str().is_empty() {
            return Err(crate::Error::config("Log file paths cannot be empty"));
        }
        if self.log_file == self.temp_log_file {
            return Err(crate::Error::config(
                "Activity log and client scratch log must be different files",
            ));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(crate::Error::config("max_reconnect_attempts must be > 0"));
        }
        if self.check_interval_secs == 0 {
            return Err(crate::Error::config("check_interval_secs must be > 0"));
        }
        if self.client_binary.trim().is_empty() {
            return Err(crate::Error::config("Client binary cannot be empty"));
        }
        if self.readiness_marker.is_empty() {
            return Err(crate::Error::config("Readiness marker cannot be empty"));
        }
        if self.ip_services.iter().all(|s| s.trim().is_empty()) {
            return Err(crate::Error::config("At least one IP service is required"));
        }

        self.timing.validate()
    }

    /// Directory holding the tunnel client configuration
    pub fn config_dir(&self) -> &Path {
        self.config_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn recheck_delay(&self) -> Duration {
        Duration::from_secs(self.recheck_delay_secs)
    }
}

/// Fixed waits used by the supervisor
///
/// Production values suit a typical OpenVPN startup. Tests shrink them to
/// milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Wait between kill-by-name and the confirmation lookup
    #[serde(default = "default_terminate_settle_millis")]
    pub terminate_settle_millis: u64,

    /// Maximum wait for the readiness marker after a launch
    #[serde(default = "default_connect_settle_millis")]
    pub connect_settle_millis: u64,

    /// How often the scratch log is inspected while waiting
    #[serde(default = "default_readiness_poll_millis")]
    pub readiness_poll_millis: u64,

    /// Pause after a failed attempt before the next launch
    #[serde(default = "default_attempt_cooldown_millis")]
    pub attempt_cooldown_millis: u64,

    /// Address lookups made after a successful connect
    #[serde(default = "default_address_check_attempts")]
    pub address_check_attempts: u32,

    /// Pause between two post-connect address lookups
    #[serde(default = "default_address_retry_delay_millis")]
    pub address_retry_delay_millis: u64,

    /// Per-request timeout of the address oracle
    #[serde(default = "default_address_timeout_millis")]
    pub address_timeout_millis: u64,
}

impl TimingConfig {
    /// Validate the timing configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.readiness_poll_millis == 0 {
            return Err(crate::Error::config("readiness_poll_millis must be > 0"));
        }
        if self.address_check_attempts == 0 {
            return Err(crate::Error::config("address_check_attempts must be > 0"));
        }
        if self.address_timeout_millis == 0 {
            return Err(crate::Error::config("address_timeout_millis must be > 0"));
        }
        Ok(())
    }

    pub fn terminate_settle(&self) -> Duration {
        Duration::from_millis(self.terminate_settle_millis)
    }

    pub fn connect_settle(&self) -> Duration {
        Duration::from_millis(self.connect_settle_millis)
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_millis)
    }

    pub fn attempt_cooldown(&self) -> Duration {
        Duration::from_millis(self.attempt_cooldown_millis)
    }

    pub fn address_retry_delay(&self) -> Duration {
        Duration::from_millis(self.address_retry_delay_millis)
    }

    pub fn address_timeout(&self) -> Duration {
        Duration::from_millis(self.address_timeout_millis)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            terminate_settle_millis: default_terminate_settle_millis(),
            connect_settle_millis: default_connect_settle_millis(),
            readiness_poll_millis: default_readiness_poll_millis(),
            attempt_cooldown_millis: default_attempt_cooldown_millis(),
            address_check_attempts: default_address_check_attempts(),
            address_retry_delay_millis: default_address_retry_delay_millis(),
            address_timeout_millis: default_address_timeout_millis(),
        }
    }
}

fn default_check_interval_secs() -> u64 {
    1800
}

fn default_recheck_delay_secs() -> u64 {
    15
}

fn default_max_reconnect_attempts() -> u32 {
    3
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/var/log/vpnrot/vpn_reconnect.log")
}

fn default_temp_log_file() -> PathBuf {
    PathBuf::from("/var/log/vpnrot/openvpn_temp.log")
}

fn default_client_binary() -> String {
    "openvpn".to_string()
}

fn default_readiness_marker() -> String {
    DEFAULT_READINESS_MARKER.to_string()
}

fn default_ip_services() -> Vec<String> {
    DEFAULT_IP_SERVICES.iter().map(|s| s.to_string()).collect()
}

fn default_terminate_settle_millis() -> u64 {
    5_000
}

fn default_connect_settle_millis() -> u64 {
    10_000
}

fn default_readiness_poll_millis() -> u64 {
    500
}

fn default_attempt_cooldown_millis() -> u64 {
    5_000
}

fn default_address_check_attempts() -> u32 {
    3
}

fn default_address_retry_delay_millis() -> u64 {
    5_000
}

fn default_address_timeout_millis() -> u64 {
    10_000
}
