//! Scoped sudo context with deterministic allowlist
//!
//! Sudo is never requested for the entire process. Instead:
//! 1. Settings define which commands and services need sudo (allowlist)
//! 2. Plans are built and previewed without privileges
//! 3. Sudo is acquired once, when the first privileged resource acts
//! 4. Sudo is released when the run ends

use anyhow::{Result, bail};
use declarative::{CommandLine, CommandSpec, SudoClassifier, SudoProvider, shell_quote};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};

/// Configuration for sudo allowlist
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SudoConfig {
    /// Programs whose commands run elevated (e.g., ["chown", "mount"])
    #[serde(default)]
    pub commands: Vec<String>,

    /// Services controlled with elevated privileges (e.g., ["datanode"])
    #[serde(default)]
    pub services: Vec<String>,
}

impl SudoConfig {
    /// Check if a program requires sudo
    ///
    /// Matches on the program's file name, so `/usr/bin/chown` matches `chown`.
    pub fn command_requires_sudo(&self, program: &str) -> bool {
        let name = program.rsplit('/').next().unwrap_or(program);
        self.commands.iter().any(|c| c == program || c == name)
    }

    /// Check if a service requires sudo
    pub fn service_requires_sudo(&self, name: &str) -> bool {
        self.services.iter().any(|s| s == name)
    }
}

impl SudoClassifier for SudoConfig {
    fn requires_sudo(&self, resource_type: &str, resource_id: &str) -> bool {
        match resource_type {
            "command" => self.command_requires_sudo(resource_id),
            "service" => self.service_requires_sudo(resource_id),
            _ => false,
        }
    }
}

/// Scoped sudo context - invalidates the sudo timestamp on drop
pub struct SudoContext {
    /// Already running as root; commands only need sudo to switch users
    root: bool,
}

impl SudoContext {
    /// Acquire sudo privileges without prompting
    ///
    /// The agent runs unattended, so a sudo that would ask for a password is
    /// treated as unavailable.
    pub fn acquire(reason: &str) -> Result<Self> {
        if is_root() {
            log::debug!("running as root; {reason}");
            return Ok(Self { root: true });
        }

        log::info!("Sudo required: {reason}");
        if !Self::is_valid() {
            bail!("Failed to acquire sudo privileges (non-interactive sudo refused)");
        }
        Ok(Self { root: false })
    }

    /// Check if sudo is currently usable without a password
    pub fn is_valid() -> bool {
        Command::new("sudo")
            .args(["-n", "true"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl SudoProvider for SudoContext {
    fn elevate(&self, spec: &CommandSpec) -> CommandSpec {
        if self.root && spec.user.is_none() {
            return spec.clone();
        }
        elevate_with_sudo(spec)
    }
}

impl Drop for SudoContext {
    fn drop(&mut self) {
        if !self.root {
            let _ = Command::new("sudo").args(["-k"]).status();
        }
    }
}

/// Wrap a command in `sudo -n -E`, switching user with `-u` when one is set
///
/// sudo's `secure_path` replaces `PATH`, so extra search directories are
/// exported inside the script instead.
fn elevate_with_sudo(spec: &CommandSpec) -> CommandSpec {
    let mut argv = vec!["sudo".to_string(), "-n".to_string(), "-E".to_string()];
    if let Some(user) = &spec.user {
        argv.push("-u".to_string());
        argv.push(user.clone());
    }
    argv.push("--".to_string());

    let mut script = String::new();
    if !spec.path.is_empty() {
        let dirs: Vec<String> = spec
            .path
            .iter()
            .map(|p| shell_quote(&p.to_string_lossy()))
            .collect();
        script.push_str(&format!("export PATH={}:$PATH ; ", dirs.join(":")));
    }
    script.push_str(&spec.line.to_shell());
    argv.extend(["/bin/sh".to_string(), "-c".to_string(), script]);

    let mut elevated = spec.clone();
    elevated.line = CommandLine::Argv(argv);
    elevated.user = None;
    elevated.path.clear();
    elevated
}

#[cfg(unix)]
fn is_root() -> bool {
    // SAFETY: geteuid has no preconditions
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn is_root() -> bool {
    false
}
