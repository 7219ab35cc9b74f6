//! # Declarative
//!
//! A resource convergence engine for managed hosts.
//!
//! Callers describe desired host state as an ordered list of resource
//! descriptors (directories, files, symlinks, commands, services), each
//! optionally guarded by `only_if`/`not_if` predicates. The driver applies
//! them strictly in order and stops at the first failure.
//!
//! ## Core Concepts
//!
//! - **ResourceDescriptor**: immutable desired state of one resource plus its guard
//! - **GuardExpr**: predicate over host state deciding whether an action runs
//! - **ConvergencePlan**: the ordered descriptors of one run
//! - **converge**: the fail-fast driver producing a [`ConvergenceRun`]
//! - **Template**: renders file content from bindings
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     CommandSpec, ConvergencePlan, ExecuteOptions, GuardExpr, ResourceDescriptor,
//!     converge_simple, host,
//! };
//!
//! let mut plan = ConvergencePlan::new();
//! plan.push(
//!     ResourceDescriptor::directory("/var/run/hadoop/hdfs")
//!         .owner("hdfs")
//!         .group("hadoop")
//!         .mode(0o755)
//!         .recursive(true),
//! )
//! .push(
//!     ResourceDescriptor::command(CommandSpec::shell("hdfs dfsadmin -safemode get"))
//!         .not_if(GuardExpr::path_exists("/var/run/hadoop/hdfs/ready")),
//! );
//!
//! let local = host::local();
//! let run = converge_simple(&plan, &ExecuteOptions::default(), local.host());
//! assert!(run.is_success());
//! ```
//!
//! ## Capability Traits
//!
//! The engine never touches the host directly except through these traits:
//!
//! - [`SystemProbe`]: read-only host state for guards and previews
//! - [`ProcessController`]: command execution and signals
//! - [`Fetcher`]: remote content download
//! - [`SudoProvider`]: elevated command execution
//! - [`SudoClassifier`]: decides which resources need privileges
//! - [`ProgressCallback`]: receives progress updates

pub mod actions;
pub mod context;
pub mod diff;
pub mod driver;
pub mod error;
pub mod guard;
pub mod host;
pub mod plan;
pub mod template;
pub mod types;

// Re-export main types at crate root
pub use actions::probe_status;
pub use context::{
    ApplyContext, FileKind, FileMeta, Fetcher, Host, NoProgress, NoSudo, OsFamily,
    ProcessController, ProgressCallback, SudoClassifier, SudoProvider, SystemProbe,
};
pub use diff::{ContentChange, DiffSummary, ResourceDiff, compute_diffs, group_by_type};
pub use driver::{ConvergenceRun, converge, converge_simple};
pub use error::{Error, ErrorCategory, FailureCause, Result};
pub use guard::{GuardExpr, evaluate, evaluate_within};
pub use host::LocalHost;
pub use plan::ConvergencePlan;
pub use template::{Bindings, Template, bindings_from, render};
pub use types::{
    ApplyResult, CdAccess, CommandLine, CommandOutput, CommandSpec, ContentSource, Ensure,
    ExecuteOptions, ExecuteSummary, ExecutionResult, FileAttrs, Outcome, Privilege, ResourceDescriptor,
    ResourceKind, ResourceSpec, ResourceState, RunState, ServiceAction, ServiceSpec, ServiceStatus,
    shell_quote,
};
