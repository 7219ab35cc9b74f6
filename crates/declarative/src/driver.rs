//! Convergence driver - applies a plan in order, stopping at the first failure

use crate::actions;
use crate::context::{ApplyContext, Host, NoProgress, NoSudo, ProgressCallback, SudoProvider};
use crate::error::{Error, FailureCause};
use crate::guard::evaluate_within;
use crate::plan::ConvergencePlan;
use crate::types::{
    ExecuteOptions, ExecuteSummary, ExecutionResult, Outcome, ResourceDescriptor, RunState,
};
use std::fmt::Display;

/// Outcome of one pass over a plan
#[derive(Debug)]
pub struct ConvergenceRun {
    /// One entry per attempted descriptor, in plan order
    pub results: Vec<ExecutionResult>,
    pub state: RunState,
}

impl ConvergenceRun {
    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for result in &self.results {
            summary.add_result(result);
        }
        summary
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }

    /// The result that aborted the run
    pub fn failure(&self) -> Option<&ExecutionResult> {
        match self.state {
            RunState::Done => None,
            RunState::Aborted { .. } => self.results.last(),
        }
    }
}

/// Lazily acquired privilege provider; the acquisition closure runs at most once
struct LazySudo<S, F> {
    acquire: Option<F>,
    provider: Option<S>,
    error: Option<String>,
}

impl<S, E, F> LazySudo<S, F>
where
    S: SudoProvider,
    E: Display,
    F: FnOnce() -> std::result::Result<S, E>,
{
    fn new(acquire: F) -> Self {
        Self {
            acquire: Some(acquire),
            provider: None,
            error: None,
        }
    }

    fn get(&mut self) -> std::result::Result<&dyn SudoProvider, FailureCause> {
        if let Some(acquire) = self.acquire.take() {
            log::debug!("acquiring elevated privileges");
            match acquire() {
                Ok(provider) => self.provider = Some(provider),
                Err(e) => self.error = Some(e.to_string()),
            }
        }
        match (&self.provider, &self.error) {
            (Some(provider), _) => Ok(provider),
            (None, Some(error)) => Err(FailureCause::PrivilegeUnavailable(error.clone())),
            (None, None) => Err(FailureCause::PrivilegeUnavailable(
                "no privilege provider".to_string(),
            )),
        }
    }
}

/// Apply a plan with the given options and callbacks
///
/// # Arguments
/// * `plan` - Descriptors, applied strictly in order
/// * `opts` - Execution options (verbose, default timeout)
/// * `host` - Capabilities used to observe and change the host
/// * `sudo_provider` - Called lazily, at most once, when the first elevated
///   descriptor has to act
/// * `progress` - Progress callback
///
/// The run stops at the first failure of a descriptor that is not marked
/// best-effort; later descriptors are never attempted. Nothing is rolled back.
pub fn converge<S, E, P>(
    plan: &ConvergencePlan,
    opts: &ExecuteOptions,
    host: Host<'_>,
    sudo_provider: impl FnOnce() -> std::result::Result<S, E>,
    progress: &mut P,
) -> ConvergenceRun
where
    S: SudoProvider,
    E: Display,
    P: ProgressCallback + ?Sized,
{
    let mut sudo = LazySudo::new(sudo_provider);
    let mut results = Vec::with_capacity(plan.len());
    let mut state = RunState::Done;

    progress.on_run_start(plan.len());

    for descriptor in plan {
        let id = descriptor.id();
        progress.on_resource_start(&id, &descriptor.description());

        let result = match apply_one(descriptor, opts, host, &mut sudo) {
            Ok(result) => result,
            Err(error) if descriptor.ignore_failures => {
                log::warn!("{id}: ignoring failure: {error}");
                ExecutionResult {
                    descriptor_id: id,
                    outcome: Outcome::SkippedGuard {
                        reason: format!("ignored failure: {error}"),
                    },
                    error: Some(error),
                }
            }
            Err(error) => {
                log::error!("{error}");
                state = RunState::Aborted {
                    descriptor_id: id.clone(),
                };
                ExecutionResult::failed(id, error)
            }
        };

        progress.on_resource_complete(&result);
        results.push(result);

        if state != RunState::Done {
            break;
        }
    }

    progress.on_run_complete();
    ConvergenceRun { results, state }
}

fn apply_one<S, E, F>(
    descriptor: &ResourceDescriptor,
    opts: &ExecuteOptions,
    host: Host<'_>,
    sudo: &mut LazySudo<S, F>,
) -> std::result::Result<ExecutionResult, Error>
where
    S: SudoProvider,
    E: Display,
    F: FnOnce() -> std::result::Result<S, E>,
{
    let id = descriptor.id();
    let deadline = descriptor.timeout.or(opts.default_timeout);

    if let Some(guard) = &descriptor.guard
        && !evaluate_within(guard, host.probe, deadline)
    {
        log::debug!("{id}: skipped, guard {guard} does not hold");
        return Ok(ExecutionResult::skipped(id, format!("guard {guard} does not hold")));
    }

    let mut ctx = if descriptor.is_elevated() {
        let provider = sudo.get().map_err(|cause| Error::action(id.clone(), cause))?;
        ApplyContext::with_sudo(host, opts.verbose, provider)
    } else {
        ApplyContext::new(host, opts.verbose)
    };
    ctx.deadline = deadline;

    match actions::apply(descriptor, &ctx) {
        Ok(result) => {
            if result.is_change() {
                log::info!("{id}: {result:?}");
            } else {
                log::debug!("{id}: up to date");
            }
            Ok(ExecutionResult::applied(id, result))
        }
        Err(Error::GuardFailed { reason }) => Ok(ExecutionResult::skipped(id, reason)),
        Err(error) => Err(error),
    }
}

/// Apply a plan without progress reporting or elevated privileges
///
/// Elevated descriptors fail with `PrivilegeUnavailable`.
pub fn converge_simple(plan: &ConvergencePlan, opts: &ExecuteOptions, host: Host<'_>) -> ConvergenceRun {
    converge(
        plan,
        opts,
        host,
        || Err::<NoSudo, _>("no privilege provider configured"),
        &mut NoProgress,
    )
}
