//! Apply context and capability traits
//!
//! These traits keep the engine independent of the machine it runs on.
//! Everything the engine observes goes through a [`SystemProbe`], every
//! process it starts goes through a [`ProcessController`], and remote
//! content comes from a [`Fetcher`]. The local implementations live in
//! [`crate::host`]; tests substitute their own.

use crate::error::{Error, FailureCause, Result};
use crate::types::{CommandOutput, CommandSpec, ExecutionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Operating system family of the managed host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Redhat,
    Debian,
    Suse,
    Darwin,
    Windows,
    Other,
}

impl OsFamily {
    pub fn is_windows(self) -> bool {
        self == Self::Windows
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Redhat => "redhat",
            Self::Debian => "debian",
            Self::Suse => "suse",
            Self::Darwin => "darwin",
            Self::Windows => "windows",
            Self::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// What sits at a path (links are not followed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Metadata of a path as seen by `lstat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub kind: FileKind,
    /// Permission bits (`mode & 0o7777`)
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub len: u64,
}

/// Read-only view of host state
pub trait SystemProbe {
    /// Metadata without following symlinks
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;

    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Exit code of a shell command; used by command guards
    ///
    /// A command still running at `timeout` is terminated and reported as
    /// `TimedOut`.
    fn exit_code(&self, command: &str, timeout: Option<Duration>) -> io::Result<i32>;

    fn os_family(&self) -> OsFamily;

    /// Resolve a user name (or numeric id) to a uid
    fn user_id(&self, name: &str) -> Option<u32>;

    /// Resolve a group name (or numeric id) to a gid
    fn group_id(&self, name: &str) -> Option<u32>;

    fn exists(&self, path: &Path) -> bool {
        self.metadata(path).is_ok()
    }
}

/// Starts and signals processes
pub trait ProcessController {
    /// Run a command to completion
    ///
    /// A non-zero exit is not an error here; the output carries the code.
    /// Errors are reserved for spawn failures and expired deadlines.
    fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
    ) -> std::result::Result<CommandOutput, FailureCause>;

    /// Whether a process with this pid exists
    fn is_alive(&self, pid: u32) -> bool;

    /// Ask a process to terminate
    fn terminate(&self, pid: u32) -> io::Result<()>;
}

/// Retrieves remote content
pub trait Fetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

/// Provider for elevated privilege operations
///
/// Implement this trait to provide sudo/admin capabilities.
pub trait SudoProvider {
    /// Rewrite a command so that it runs with elevated privileges
    fn elevate(&self, spec: &CommandSpec) -> CommandSpec;
}

/// Classifier for determining which resources need elevated privileges
///
/// Implement this trait to define your privilege policy.
pub trait SudoClassifier {
    /// Check if a resource requires elevated privileges
    ///
    /// # Arguments
    /// * `resource_type` - The type of resource (e.g., "command", "service")
    /// * `resource_id` - The program or service name
    fn requires_sudo(&self, resource_type: &str, resource_id: &str) -> bool;
}

/// Default classifier that never requires sudo
pub struct NoSudo;

impl SudoClassifier for NoSudo {
    fn requires_sudo(&self, _resource_type: &str, _resource_id: &str) -> bool {
        false
    }
}

impl SudoProvider for NoSudo {
    fn elevate(&self, spec: &CommandSpec) -> CommandSpec {
        spec.clone()
    }
}

/// Progress callback for convergence runs
pub trait ProgressCallback {
    /// Called once before the first descriptor
    fn on_run_start(&mut self, count: usize);

    /// Called when starting to apply a single resource
    fn on_resource_start(&mut self, id: &str, description: &str);

    /// Called when a resource application completes
    fn on_resource_complete(&mut self, result: &ExecutionResult);

    /// Called when the run ends, whether done or aborted
    fn on_run_complete(&mut self);
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_run_start(&mut self, _count: usize) {}
    fn on_resource_start(&mut self, _id: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _result: &ExecutionResult) {}
    fn on_run_complete(&mut self) {}
}

/// The capability set of one managed host
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub probe: &'a dyn SystemProbe,
    pub processes: &'a dyn ProcessController,
    pub fetcher: &'a dyn Fetcher,
}

/// Context passed to resource apply operations
pub struct ApplyContext<'a> {
    pub host: Host<'a>,
    /// Whether to output verbose information
    pub verbose: bool,
    /// Optional sudo provider for privileged operations
    pub sudo: Option<&'a dyn SudoProvider>,
    /// Deadline for commands started by this resource
    pub deadline: Option<Duration>,
}

impl<'a> ApplyContext<'a> {
    /// Create a new apply context
    pub fn new(host: Host<'a>, verbose: bool) -> Self {
        Self {
            host,
            verbose,
            sudo: None,
            deadline: None,
        }
    }

    /// Create a context with a sudo provider
    pub fn with_sudo(host: Host<'a>, verbose: bool, sudo: &'a dyn SudoProvider) -> Self {
        Self {
            host,
            verbose,
            sudo: Some(sudo),
            deadline: None,
        }
    }

    /// Get the sudo provider, or error if not available
    pub fn require_sudo(&self) -> std::result::Result<&dyn SudoProvider, FailureCause> {
        self.sudo.ok_or_else(|| {
            FailureCause::PrivilegeUnavailable("sudo required but not available".to_string())
        })
    }

    /// Run a command, elevating it when asked, honouring the deadline
    pub fn run(
        &self,
        spec: &CommandSpec,
        elevated: bool,
    ) -> std::result::Result<CommandOutput, FailureCause> {
        let elevated_spec;
        let spec = if elevated {
            elevated_spec = self.require_sudo()?.elevate(spec);
            &elevated_spec
        } else {
            spec
        };
        log::debug!("running `{}`", spec.line);
        self.host.processes.run(spec, self.deadline)
    }

    /// Run a command and turn an unaccepted exit code into a failure
    pub fn run_checked(
        &self,
        spec: &CommandSpec,
        elevated: bool,
    ) -> std::result::Result<CommandOutput, FailureCause> {
        let output = self.run(spec, elevated)?;
        let code = output.code.unwrap_or(-1);
        if !spec.accepts(code) {
            return Err(FailureCause::NonZeroExit {
                code,
                output: output.combined().trim().to_string(),
            });
        }
        if spec.log_output || self.verbose {
            let text = output.combined();
            if !text.trim().is_empty() {
                log::info!("{}", text.trim_end());
            }
        }
        Ok(output)
    }

    /// Fetch remote content
    pub fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        self.host.fetcher.fetch(uri).map_err(|e| match e {
            err @ Error::RemoteFetchFailed { .. } => err,
            other => Error::RemoteFetchFailed {
                uri: uri.to_string(),
                message: other.to_string(),
            },
        })
    }
}
