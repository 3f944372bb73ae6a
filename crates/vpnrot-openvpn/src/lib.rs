// # OpenVPN Tunnel Client
//
// This crate provides the OS-facing halves of the supervisor:
//
// - `OpenVpnClient`: launches `openvpn` detached with a config file and a
//   credentials file, pointing its diagnostics at the scratch log
// - `SystemProcessTable`: finds and terminates processes by name through
//   the `pgrep` and `killall` utilities
//
// ## Launch Model
//
// The client is started with `--daemon`, so the spawned parent forks and
// exits almost immediately. Nothing here waits for the tunnel to come up;
// readiness is detected by the caller from the scratch log. The spawned
// child is reaped in a background task.
//
// ## Platform Support
//
// Unix only in practice: both helper utilities and the client itself are
// expected on PATH.

use vpnrot_core::{Error, LaunchRequest, ProcessTable, Result, TunnelClient};

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, warn};

/// Default client binary
pub const DEFAULT_BINARY: &str = "openvpn";

/// External utilities `SystemProcessTable` shells out to
pub const REQUIRED_TOOLS: &[&str] = &["pgrep", "killall"];

/// Transport forced on every launch
///
/// Pins the tunnel to IPv4 so the address check compares like with like.
const PROTO: &str = "udp4";

/// OpenVPN tunnel client
pub struct OpenVpnClient {
    /// Binary to execute (name on PATH or absolute path)
    binary: String,

    /// Name the daemonized client runs under
    process_name: String,
}

impl OpenVpnClient {
    /// Create a client for the given binary
    ///
    /// The process name is the binary's file name, so `/usr/sbin/openvpn`
    /// is matched as `openvpn` in the process table.
    pub fn new(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        let process_name = Path::new(&binary)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_BINARY)
            .to_string();

        Self {
            binary,
            process_name,
        }
    }

    /// Binary this client executes
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Command-line arguments for one launch
    pub fn launch_args(request: &LaunchRequest) -> Vec<String> {
        vec![
            "--config".to_string(),
            request.config_file.display().to_string(),
            "--auth-user-pass".to_string(),
            request.auth_file.display().to_string(),
            "--daemon".to_string(),
            "--log".to_string(),
            request.log_file.display().to_string(),
            "--proto".to_string(),
            PROTO.to_string(),
        ]
    }
}

impl Default for OpenVpnClient {
    fn default() -> Self {
        Self::new(DEFAULT_BINARY)
    }
}

#[async_trait::async_trait]
impl TunnelClient for OpenVpnClient {
    fn process_name(&self) -> &str {
        &self.process_name
    }

    async fn launch(&self, request: &LaunchRequest) -> Result<()> {
        let args = Self::launch_args(request);
        debug!(binary = %self.binary, ?args, "Launching tunnel client");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::process(format!("Failed to start {}: {e}", self.binary)))?;

        let binary = self.binary.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(binary = %binary, "Tunnel client daemonized");
                }
                Ok(status) => {
                    warn!(binary = %binary, %status, "Tunnel client exited during startup");
                }
                Err(e) => {
                    warn!(binary = %binary, error = %e, "Failed to reap tunnel client");
                }
            }
        });

        Ok(())
    }
}

/// Process table backed by `pgrep` and `killall`
#[derive(Debug, Clone, Default)]
pub struct SystemProcessTable;

impl SystemProcessTable {
    pub fn new() -> Self {
        Self
    }
}

/// Parse `pgrep` output: one PID per line
///
/// Lines that are not PIDs are skipped.
pub fn parse_pids(output: &str) -> Vec<u32> {
    output
        .lines()
        .filter_map(|line| line.trim().parse::<u32>().ok())
        .collect()
}

#[async_trait::async_trait]
impl ProcessTable for SystemProcessTable {
    async fn list_by_name(&self, name: &str) -> Result<Vec<u32>> {
        let output = Command::new("pgrep")
            .arg("-x")
            .arg(name)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::process(format!("Failed to run pgrep: {e}")))?;

        // pgrep: 0 = matches, 1 = no matches, anything else = failure
        match output.status.code() {
            Some(0) => Ok(parse_pids(&String::from_utf8_lossy(&output.stdout))),
            Some(1) => Ok(Vec::new()),
            _ => Err(Error::process(format!(
                "pgrep failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }

    async fn kill_by_name(&self, name: &str) -> Result<()> {
        let status = Command::new("killall")
            .arg(name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Error::process(format!("Failed to run killall: {e}")))?;

        // Non-zero mostly means nothing matched
        if !status.success() {
            debug!(process = name, %status, "killall reported no processes");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn request() -> LaunchRequest {
        LaunchRequest {
            config_file: PathBuf::from("/etc/vpn/vpn_configs/nl-free-2.protonvpn.udp.ovpn"),
            auth_file: PathBuf::from("/etc/vpn/auth.txt"),
            log_file: PathBuf::from("/var/log/vpnrot/openvpn_temp.log"),
        }
    }

    #[test]
    fn test_launch_args() {
        let args = OpenVpnClient::launch_args(&request());
        assert_eq!(
            args,
            vec![
                "--config",
                "/etc/vpn/vpn_configs/nl-free-2.protonvpn.udp.ovpn",
                "--auth-user-pass",
                "/etc/vpn/auth.txt",
                "--daemon",
                "--log",
                "/var/log/vpnrot/openvpn_temp.log",
                "--proto",
                "udp4",
            ]
        );
    }

    #[test]
    fn test_process_name_from_path() {
        assert_eq!(OpenVpnClient::new("/usr/sbin/openvpn").process_name(), "openvpn");
        assert_eq!(OpenVpnClient::new("openvpn").process_name(), "openvpn");
        assert_eq!(OpenVpnClient::default().binary(), DEFAULT_BINARY);
    }

    #[test]
    fn test_parse_pids() {
        assert_eq!(parse_pids("1234\n5678\n"), vec![1234, 5678]);
        assert_eq!(parse_pids(""), Vec::<u32>::new());
        assert_eq!(parse_pids(" 42 \nnot-a-pid\n"), vec![42]);
    }

    #[tokio::test]
    async fn test_missing_binary_is_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let client = OpenVpnClient::new(dir.path().join("no-such-client").display().to_string());

        let err = client.launch(&request()).await.unwrap_err();
        assert!(matches!(err, Error::Process(_)));
    }
}
