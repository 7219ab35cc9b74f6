//! Core types for declarative resource convergence

use crate::error::Error;
use crate::guard::GuardExpr;
use crate::template::{Bindings, Template};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

/// Privilege level a resource is applied with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Privilege {
    /// Run as the agent user
    #[default]
    Normal,
    /// Run through the sudo provider
    Elevated,
}

/// Whether a filesystem resource should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// Which permission classes get the execute bit on every ancestor directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CdAccess {
    User,
    Group,
    Other,
    All,
}

impl CdAccess {
    /// Execute bits this access level requires
    pub fn bits(self) -> u32 {
        match self {
            Self::User => 0o100,
            Self::Group => 0o010,
            Self::Other => 0o001,
            Self::All => 0o111,
        }
    }
}

/// Ownership and permission bits for files and directories
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttrs {
    pub owner: Option<String>,
    pub group: Option<String>,
    pub mode: Option<u32>,
}

impl FileAttrs {
    /// Short human-readable form, e.g. `0751 hdfs:hadoop`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(mode) = self.mode {
            parts.push(format!("{mode:04o}"));
        }
        match (&self.owner, &self.group) {
            (Some(o), Some(g)) => parts.push(format!("{o}:{g}")),
            (Some(o), None) => parts.push(o.clone()),
            (None, Some(g)) => parts.push(format!(":{g}")),
            (None, None) => {}
        }
        parts.join(" ")
    }
}

/// Where a file's content comes from
///
/// Content is produced only when the file action actually runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSource {
    /// Literal bytes
    Inline(Vec<u8>),
    /// Rendered from a template and its bindings
    Template {
        template: Template,
        bindings: Bindings,
    },
    /// Copied from a local file
    Local(PathBuf),
    /// Downloaded from a URI
    Remote(String),
}

impl ContentSource {
    /// Inline text content
    pub fn text(content: impl Into<String>) -> Self {
        Self::Inline(content.into().into_bytes())
    }

    /// Content rendered from a template
    pub fn template(template: Template, bindings: Bindings) -> Self {
        Self::Template { template, bindings }
    }

    /// Short description used in plans and diffs
    pub fn describe(&self) -> String {
        match self {
            Self::Inline(bytes) => format!("{} bytes inline", bytes.len()),
            Self::Template { template, .. } => format!("{} template", template.kind()),
            Self::Local(path) => format!("copy of {}", path.display()),
            Self::Remote(uri) => format!("download of {uri}"),
        }
    }
}

/// A command line, either interpreted by the shell or executed directly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandLine {
    Shell(String),
    Argv(Vec<String>),
}

impl CommandLine {
    /// Program name used in error messages and privilege classification
    pub fn program(&self) -> &str {
        match self {
            Self::Shell(line) => line.split_whitespace().next().unwrap_or_default(),
            Self::Argv(argv) => argv.first().map(String::as_str).unwrap_or_default(),
        }
    }

    /// Render as a single shell-safe string
    pub fn to_shell(&self) -> String {
        match self {
            Self::Shell(line) => line.clone(),
            Self::Argv(argv) => argv
                .iter()
                .map(|a| shell_quote(a))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_shell())
    }
}

/// Quote a word for POSIX shells when it contains anything unusual
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// How to run a command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub line: CommandLine,
    /// Extra environment variables
    pub environment: BTreeMap<String, String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Run as this user instead of the agent user
    pub user: Option<String>,
    /// Directories prepended to `PATH`
    pub path: Vec<PathBuf>,
    /// Exit codes that count as success
    pub accepted_codes: Vec<i32>,
    /// Log the command's output at info level
    pub log_output: bool,
}

impl CommandSpec {
    /// A command interpreted by `/bin/sh -c`
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new(CommandLine::Shell(line.into()))
    }

    /// A command executed directly without a shell
    pub fn argv<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(CommandLine::Argv(args.into_iter().map(Into::into).collect()))
    }

    /// A script run by bash, for lines that `source` an environment file
    pub fn bash(script: impl Into<String>) -> Self {
        Self::argv(["/bin/bash".to_string(), "-c".to_string(), script.into()])
    }

    fn new(line: CommandLine) -> Self {
        Self {
            line,
            environment: BTreeMap::new(),
            cwd: None,
            user: None,
            path: Vec::new(),
            accepted_codes: vec![0],
            log_output: false,
        }
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.environment
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.path.push(dir.into());
        self
    }

    pub fn accept_codes(mut self, codes: &[i32]) -> Self {
        self.accepted_codes = codes.to_vec();
        self
    }

    pub fn log_output(mut self) -> Self {
        self.log_output = true;
        self
    }

    /// Whether an exit code counts as success
    pub fn accepts(&self, code: i32) -> bool {
        self.accepted_codes.contains(&code)
    }
}

/// Lifecycle operation for a service resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceAction {
    Start,
    Stop,
    Status,
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Status => "status",
        };
        write!(f, "{name}")
    }
}

/// A process managed through its PID file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub name: String,
    pub pid_file: PathBuf,
    pub action: ServiceAction,
    pub start: Option<CommandSpec>,
    pub stop: Option<CommandSpec>,
}

/// Tri-state result of probing a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Running { pid: u32 },
    Stopped,
    Unknown { reason: String },
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Kind of a resource, part of its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Directory,
    File,
    Symlink,
    Command,
    ServiceControl,
}

impl ResourceKind {
    /// Resource type category used for grouping and filtering
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::File => "file",
            Self::Symlink => "symlink",
            Self::Command => "command",
            Self::ServiceControl => "service",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Directory => "Directory",
            Self::File => "File",
            Self::Symlink => "Link",
            Self::Command => "Execute",
            Self::ServiceControl => "Service",
        }
    }
}

/// Kind-specific part of a descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceSpec {
    Directory {
        attrs: FileAttrs,
        recursive: bool,
        ensure: Ensure,
        cd_access: Option<CdAccess>,
        recursive_ownership: bool,
    },
    File {
        attrs: FileAttrs,
        content: Option<ContentSource>,
        ensure: Ensure,
    },
    Symlink {
        to: PathBuf,
        force: bool,
        ensure: Ensure,
    },
    Command(CommandSpec),
    Service(ServiceSpec),
}

/// Immutable description of one desired piece of host state
///
/// Built by call sites from resolved configuration using the builder
/// methods, then handed to a [`ConvergencePlan`](crate::ConvergencePlan).
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Path for filesystem kinds, command line or service name otherwise
    pub target: String,
    pub spec: ResourceSpec,
    pub guard: Option<GuardExpr>,
    pub privilege: Privilege,
    /// Failures are logged and the run continues
    pub ignore_failures: bool,
    /// Deadline for commands run by this resource
    pub timeout: Option<Duration>,
}

impl ResourceDescriptor {
    fn new(target: impl Into<String>, spec: ResourceSpec) -> Self {
        Self {
            target: target.into(),
            spec,
            guard: None,
            privilege: Privilege::Normal,
            ignore_failures: false,
            timeout: None,
        }
    }

    /// Ensure a directory exists
    pub fn directory(path: impl AsRef<Path>) -> Self {
        Self::new(
            path.as_ref().to_string_lossy(),
            ResourceSpec::Directory {
                attrs: FileAttrs::default(),
                recursive: false,
                ensure: Ensure::Present,
                cd_access: None,
                recursive_ownership: false,
            },
        )
    }

    /// Ensure a regular file exists
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(
            path.as_ref().to_string_lossy(),
            ResourceSpec::File {
                attrs: FileAttrs::default(),
                content: None,
                ensure: Ensure::Present,
            },
        )
    }

    /// Ensure `path` is a symlink pointing at `to`
    pub fn symlink(path: impl AsRef<Path>, to: impl AsRef<Path>) -> Self {
        Self::new(
            path.as_ref().to_string_lossy(),
            ResourceSpec::Symlink {
                to: to.as_ref().to_path_buf(),
                force: false,
                ensure: Ensure::Present,
            },
        )
    }

    /// Run a command
    pub fn command(spec: CommandSpec) -> Self {
        Self::new(spec.line.to_shell(), ResourceSpec::Command(spec))
    }

    /// Start, stop or probe a service tracked by a PID file
    pub fn service(name: impl Into<String>, pid_file: impl AsRef<Path>, action: ServiceAction) -> Self {
        let name = name.into();
        Self::new(
            name.clone(),
            ResourceSpec::Service(ServiceSpec {
                name,
                pid_file: pid_file.as_ref().to_path_buf(),
                action,
                start: None,
                stop: None,
            }),
        )
    }

    // =========================================================================
    // Builders
    // =========================================================================

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        let owner = owner.into();
        self.with_attrs(|a| a.owner = Some(owner));
        self
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        self.with_attrs(|a| a.group = Some(group));
        self
    }

    pub fn mode(mut self, mode: u32) -> Self {
        self.with_attrs(|a| a.mode = Some(mode & 0o7777));
        self
    }

    pub fn recursive(mut self, value: bool) -> Self {
        if let ResourceSpec::Directory { recursive, .. } = &mut self.spec {
            *recursive = value;
        } else {
            log::warn!("recursive has no effect on {}", self.id());
        }
        self
    }

    pub fn cd_access(mut self, access: CdAccess) -> Self {
        if let ResourceSpec::Directory { cd_access, .. } = &mut self.spec {
            *cd_access = Some(access);
        } else {
            log::warn!("cd_access has no effect on {}", self.id());
        }
        self
    }

    pub fn recursive_ownership(mut self) -> Self {
        if let ResourceSpec::Directory {
            recursive_ownership,
            ..
        } = &mut self.spec
        {
            *recursive_ownership = true;
        } else {
            log::warn!("recursive_ownership has no effect on {}", self.id());
        }
        self
    }

    pub fn content(mut self, source: ContentSource) -> Self {
        if let ResourceSpec::File { content, .. } = &mut self.spec {
            *content = Some(source);
        } else {
            log::warn!("content has no effect on {}", self.id());
        }
        self
    }

    /// Replace a non-symlink occupying a link's path
    pub fn force(mut self) -> Self {
        if let ResourceSpec::Symlink { force, .. } = &mut self.spec {
            *force = true;
        } else {
            log::warn!("force has no effect on {}", self.id());
        }
        self
    }

    /// Ensure the directory, file or link does not exist
    pub fn absent(mut self) -> Self {
        match &mut self.spec {
            ResourceSpec::Directory { ensure, .. }
            | ResourceSpec::File { ensure, .. }
            | ResourceSpec::Symlink { ensure, .. } => *ensure = Ensure::Absent,
            _ => log::warn!("absent has no effect on {}", self.id()),
        }
        self
    }

    /// Set the start command of a service
    pub fn start_with(mut self, command: CommandSpec) -> Self {
        if let ResourceSpec::Service(service) = &mut self.spec {
            service.start = Some(command);
        }
        self
    }

    /// Set the stop command of a service
    pub fn stop_with(mut self, command: CommandSpec) -> Self {
        if let ResourceSpec::Service(service) = &mut self.spec {
            service.stop = Some(command);
        }
        self
    }

    /// Apply only if `guard` holds
    pub fn only_if(mut self, guard: GuardExpr) -> Self {
        self.guard = Some(match self.guard.take() {
            Some(existing) => existing.and(guard),
            None => guard,
        });
        self
    }

    /// Apply only if `guard` does not hold
    pub fn not_if(self, guard: GuardExpr) -> Self {
        self.only_if(GuardExpr::not(guard))
    }

    pub fn elevated(mut self) -> Self {
        self.privilege = Privilege::Elevated;
        self
    }

    /// Mark as best-effort: failures do not abort the run
    pub fn ignore_failures(mut self) -> Self {
        self.ignore_failures = true;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn with_attrs(&mut self, f: impl FnOnce(&mut FileAttrs)) {
        match &mut self.spec {
            ResourceSpec::Directory { attrs, .. } | ResourceSpec::File { attrs, .. } => f(attrs),
            _ => log::warn!("ownership and mode have no effect on {}", self.id()),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn kind(&self) -> ResourceKind {
        match &self.spec {
            ResourceSpec::Directory { .. } => ResourceKind::Directory,
            ResourceSpec::File { .. } => ResourceKind::File,
            ResourceSpec::Symlink { .. } => ResourceKind::Symlink,
            ResourceSpec::Command(_) => ResourceKind::Command,
            ResourceSpec::Service(_) => ResourceKind::ServiceControl,
        }
    }

    /// Identity of this descriptor, e.g. `Directory['/var/run/hadoop']`
    pub fn id(&self) -> String {
        format!("{}['{}']", self.kind().label(), self.target)
    }

    pub fn resource_type(&self) -> &'static str {
        self.kind().as_str()
    }

    /// The target interpreted as a filesystem path
    pub fn path(&self) -> &Path {
        Path::new(&self.target)
    }

    pub fn attrs(&self) -> Option<&FileAttrs> {
        match &self.spec {
            ResourceSpec::Directory { attrs, .. } | ResourceSpec::File { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.privilege == Privilege::Elevated
    }

    /// Human-readable description of what this resource does
    pub fn description(&self) -> String {
        let with_attrs = |what: String, attrs: &FileAttrs| {
            let summary = attrs.summary();
            if summary.is_empty() {
                what
            } else {
                format!("{what} ({summary})")
            }
        };
        match &self.spec {
            ResourceSpec::Directory {
                attrs,
                ensure: Ensure::Present,
                ..
            } => with_attrs(format!("Ensure directory {}", self.target), attrs),
            ResourceSpec::File {
                attrs,
                content,
                ensure: Ensure::Present,
            } => {
                let what = match content {
                    Some(source) => format!("Write {} from {}", self.target, source.describe()),
                    None => format!("Ensure file {}", self.target),
                };
                with_attrs(what, attrs)
            }
            ResourceSpec::Symlink {
                to,
                ensure: Ensure::Present,
                ..
            } => format!("Symlink {} -> {}", self.target, to.display()),
            ResourceSpec::Directory { .. } | ResourceSpec::File { .. } | ResourceSpec::Symlink { .. } => {
                format!("Remove {}", self.target)
            }
            ResourceSpec::Command(spec) => match &spec.user {
                Some(user) => format!("Run `{}` as {user}", spec.line),
                None => format!("Run `{}`", spec.line),
            },
            ResourceSpec::Service(service) => format!("{} {}", service.action, service.name),
        }
    }
}

/// Current or desired state of a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceState {
    /// Resource exists/is configured
    Present { details: Option<String> },
    /// Resource does not exist/is not configured
    Absent,
    /// Resource exists but differs from desired
    Modified { from: String, to: String },
    /// State cannot be determined
    Unknown,
}

impl ResourceState {
    /// Check if state represents presence
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }

    /// Check if state represents absence
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// What applying a resource changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Already in the desired state
    NoChange,
    /// Resource was created
    Created,
    /// Resource was modified
    Modified,
    /// Resource was removed
    Removed,
    /// A command ran
    Executed,
}

impl ApplyResult {
    /// Check if the result represents a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

impl fmt::Display for ApplyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoChange => "no change",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Removed => "removed",
            Self::Executed => "executed",
        };
        f.write_str(label)
    }
}

/// Outcome of one descriptor in a convergence run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Applied { result: ApplyResult },
    SkippedGuard { reason: String },
    Failed,
}

/// Per-descriptor entry of a run's audit trail
#[derive(Debug)]
pub struct ExecutionResult {
    pub descriptor_id: String,
    pub outcome: Outcome,
    pub error: Option<Error>,
}

impl ExecutionResult {
    pub fn applied(descriptor_id: String, result: ApplyResult) -> Self {
        Self {
            descriptor_id,
            outcome: Outcome::Applied { result },
            error: None,
        }
    }

    pub fn skipped(descriptor_id: String, reason: String) -> Self {
        Self {
            descriptor_id,
            outcome: Outcome::SkippedGuard { reason },
            error: None,
        }
    }

    pub fn failed(descriptor_id: String, error: Error) -> Self {
        Self {
            descriptor_id,
            outcome: Outcome::Failed,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, Outcome::Failed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Outcome::SkippedGuard { .. })
    }

    /// The apply result, if the descriptor was applied
    pub fn applied_result(&self) -> Option<ApplyResult> {
        match self.outcome {
            Outcome::Applied { result } => Some(result),
            _ => None,
        }
    }
}

/// Terminal state of a convergence run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// Every descriptor was processed
    Done,
    /// The run stopped at the named descriptor
    Aborted { descriptor_id: String },
}

/// Summary of execution results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub executed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed + self.executed
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.skipped + self.failed + self.no_change
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ExecutionResult) {
        match &result.outcome {
            Outcome::Applied { result } => match result {
                ApplyResult::NoChange => self.no_change += 1,
                ApplyResult::Created => self.created += 1,
                ApplyResult::Modified => self.modified += 1,
                ApplyResult::Removed => self.removed += 1,
                ApplyResult::Executed => self.executed += 1,
            },
            Outcome::SkippedGuard { .. } => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Options for a convergence run
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Log command output and probe decisions at info level
    pub verbose: bool,
    /// Deadline for commands whose descriptor sets none
    pub default_timeout: Option<Duration>,
}

/// Output from a finished command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: output.stdout,
            stderr: output.stderr,
            code: output.status.code(),
        }
    }
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Get stdout as a string
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as a string
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut out = self.stdout_str();
        out.push_str(&self.stderr_str());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_identity() {
        let dir = ResourceDescriptor::directory("/var/run/svc");
        assert_eq!(dir.id(), "Directory['/var/run/svc']");
        assert_eq!(dir.kind(), ResourceKind::Directory);

        let cmd = ResourceDescriptor::command(CommandSpec::argv(["ls", "-l"]));
        assert_eq!(cmd.id(), "Execute['ls -l']");

        let link = ResourceDescriptor::symlink("/var/log/kafka", "/data/kafka");
        assert_eq!(link.id(), "Link['/var/log/kafka']");
    }

    #[test]
    fn test_builders_set_attrs() {
        let dir = ResourceDescriptor::directory("/var/run/svc")
            .owner("svcuser")
            .group("hadoop")
            .mode(0o751)
            .recursive(true);
        let attrs = dir.attrs().unwrap();
        assert_eq!(attrs.owner.as_deref(), Some("svcuser"));
        assert_eq!(attrs.mode, Some(0o751));
        assert_eq!(attrs.summary(), "0751 svcuser:hadoop");
        assert!(matches!(dir.spec, ResourceSpec::Directory { recursive: true, .. }));
    }

    #[test]
    fn test_only_if_and_not_if_conjoin() {
        let file = ResourceDescriptor::file("/etc/x")
            .only_if(GuardExpr::path_exists("/etc"))
            .not_if(GuardExpr::path_exists("/etc/x"));
        assert_eq!(
            file.guard,
            Some(GuardExpr::And(vec![
                GuardExpr::path_exists("/etc"),
                GuardExpr::not(GuardExpr::path_exists("/etc/x")),
            ]))
        );
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain-word_1.0"), "plain-word_1.0");
        assert_eq!(shell_quote("two words"), "'two words'");
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_command_program() {
        assert_eq!(CommandLine::Shell("  kinit -kt x".into()).program(), "kinit");
        assert_eq!(CommandLine::Argv(vec!["cp".into(), "a".into()]).program(), "cp");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ExecutionResult::applied("a".into(), ApplyResult::Created));
        summary.add_result(&ExecutionResult::applied("b".into(), ApplyResult::NoChange));
        summary.add_result(&ExecutionResult::skipped("c".into(), "guard".into()));
        assert_eq!(summary.total_changes(), 1);
        assert_eq!(summary.total(), 3);
        assert!(summary.is_success());
    }
}
