//! Path resolution for the agent's own files
//!
//! # Environment Variables
//!
//! - `CLUSTER_AGENT_CONFIG_DIR` - Override config directory (holds `agent.toml`
//!   and the default command document)
//! - `CLUSTER_AGENT_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For config_dir():
//! 1. `CLUSTER_AGENT_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/cluster-agent` (if set)
//! 3. `~/.config/cluster-agent`
//!
//! For state_dir():
//! 1. `CLUSTER_AGENT_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/cluster-agent` (if set)
//! 3. `~/.local/state/cluster-agent`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "CLUSTER_AGENT_CONFIG_DIR";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "CLUSTER_AGENT_STATE_DIR";

const APP_DIR: &str = "cluster-agent";

/// Get the agent config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join(APP_DIR);
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join(APP_DIR);
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the agent state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP_DIR);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP_DIR);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Agent settings file
pub fn settings_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("agent.toml"))
}

/// Command document used when `--config` is not given
pub fn default_command_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("command.json"))
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as written.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}
