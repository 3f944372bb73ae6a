//! Startup precondition checks
//!
//! Run once before the scheduler loop starts. Any failure here is fatal and
//! maps to exit status 1 in the daemon.

use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Verify that the config directory, the tunnel config file, the credentials
/// file and every required external tool are present
///
/// # Parameters
///
/// - `config`: Supervisor configuration
/// - `required_tools`: Executables that must be resolvable (bare names are looked up in `PATH`)
pub fn verify_requirements(config: &SupervisorConfig, required_tools: &[&str]) -> Result<()> {
    let config_dir = config.config_dir();
    if !config_dir.is_dir() {
        return Err(Error::precondition(format!(
            "Configuration directory {} not found",
            config_dir.display()
        )));
    }

    if !config.config_file.is_file() {
        return Err(Error::precondition(format!(
            "Config file {} not found",
            config.config_file.display()
        )));
    }

    if !config.auth_file.is_file() {
        return Err(Error::precondition(format!(
            "Credentials file {} not found",
            config.auth_file.display()
        )));
    }

    for tool in required_tools {
        if find_executable(tool).is_none() {
            return Err(Error::precondition(format!(
                "Command '{tool}' is not installed"
            )));
        }
    }

    Ok(())
}

/// Resolve an executable the way a shell would
///
/// Names containing a path separator are checked as-is; bare names are
/// searched for in every `PATH` entry.
pub fn find_executable(tool: &str) -> Option<PathBuf> {
    if tool.is_empty() {
        return None;
    }

    let direct = Path::new(tool);
    if direct.components().count() > 1 {
        return is_executable(direct).then(|| direct.to_path_buf());
    }

    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Warning text if the credentials file is readable by group or others
///
/// The file content is never read; only its mode is inspected.
#[cfg(unix)]
pub fn credentials_permission_warning(path: &Path) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;

    let mode = path.metadata().ok()?.permissions().mode() & 0o777;
    (mode & 0o077 != 0).then(|| {
        format!(
            "Credentials file {} has permissions {:o}, should be 600",
            path.display(),
            mode
        )
    })
}

#[cfg(not(unix))]
pub fn credentials_permission_warning(_path: &Path) -> Option<String> {
    None
}
