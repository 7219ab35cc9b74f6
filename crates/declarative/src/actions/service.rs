//! Service control through PID files

use super::{CauseResult, remove_file};
use crate::context::{ApplyContext, ProcessController, SystemProbe};
use crate::error::FailureCause;
use crate::types::{ApplyResult, CommandSpec, ServiceAction, ServiceSpec, ServiceStatus};
use std::io;
use std::path::Path;

/// Probe a service through its PID file
///
/// A missing file means stopped. A file that cannot be read or parsed gives
/// `Unknown`. Otherwise the pid is checked with signal 0.
pub fn probe_status(
    probe: &dyn SystemProbe,
    processes: &dyn ProcessController,
    pid_file: &Path,
) -> ServiceStatus {
    let bytes = match probe.read(pid_file) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return ServiceStatus::Stopped,
        Err(e) => {
            return ServiceStatus::Unknown {
                reason: format!("cannot read {}: {e}", pid_file.display()),
            };
        }
    };

    let text = String::from_utf8_lossy(&bytes);
    match text.trim().parse::<u32>() {
        Ok(pid) if pid > 0 => {
            if processes.is_alive(pid) {
                ServiceStatus::Running { pid }
            } else {
                ServiceStatus::Stopped
            }
        }
        _ => ServiceStatus::Unknown {
            reason: format!("{} does not contain a pid", pid_file.display()),
        },
    }
}

pub(super) fn apply(spec: &ServiceSpec, elevated: bool, ctx: &ApplyContext) -> CauseResult<ApplyResult> {
    let status = probe_status(ctx.host.probe, ctx.host.processes, &spec.pid_file);
    log::debug!("{} status: {status:?}", spec.name);

    match spec.action {
        ServiceAction::Status => match status {
            ServiceStatus::Running { .. } => Ok(ApplyResult::NoChange),
            ServiceStatus::Stopped => Err(FailureCause::NotRunning {
                service: spec.name.clone(),
            }),
            ServiceStatus::Unknown { reason } => Err(FailureCause::StatusUnknown {
                service: spec.name.clone(),
                reason,
            }),
        },
        ServiceAction::Start => {
            if status.is_running() {
                return Ok(ApplyResult::NoChange);
            }
            let start = command(spec, spec.start.as_ref(), "start")?;
            log::info!("starting {}", spec.name);
            ctx.run_checked(start, elevated)?;
            Ok(ApplyResult::Executed)
        }
        ServiceAction::Stop => match status {
            ServiceStatus::Stopped => {
                if !ctx.host.probe.exists(&spec.pid_file) {
                    return Ok(ApplyResult::NoChange);
                }
                // stale pid file from an unclean exit
                remove_pid_file(&spec.pid_file, elevated, ctx)?;
                log::info!("removed stale pid file {}", spec.pid_file.display());
                Ok(ApplyResult::Removed)
            }
            ServiceStatus::Running { pid } => {
                log::info!("stopping {} (pid {pid})", spec.name);
                match &spec.stop {
                    Some(stop) => {
                        ctx.run_checked(stop, elevated)?;
                    }
                    None => terminate(pid, elevated, ctx)?,
                }
                remove_pid_file(&spec.pid_file, elevated, ctx)?;
                Ok(ApplyResult::Executed)
            }
            ServiceStatus::Unknown { reason } => {
                let Some(stop) = &spec.stop else {
                    return Err(FailureCause::StatusUnknown {
                        service: spec.name.clone(),
                        reason,
                    });
                };
                log::warn!("stopping {} with unknown status: {reason}", spec.name);
                ctx.run_checked(stop, elevated)?;
                remove_pid_file(&spec.pid_file, elevated, ctx)?;
                Ok(ApplyResult::Executed)
            }
        },
    }
}

fn command<'a>(
    spec: &ServiceSpec,
    command: Option<&'a CommandSpec>,
    action: &str,
) -> CauseResult<&'a CommandSpec> {
    command.ok_or_else(|| FailureCause::Conflict {
        message: format!("no {action} command configured for {}", spec.name),
    })
}

fn terminate(pid: u32, elevated: bool, ctx: &ApplyContext) -> CauseResult<()> {
    if elevated {
        let kill = CommandSpec::argv(["kill".to_string(), pid.to_string()]);
        ctx.run_checked(&kill, true)?;
        return Ok(());
    }
    ctx.host
        .processes
        .terminate(pid)
        .map_err(|e| FailureCause::io(format!("/proc/{pid}"), e))
}

fn remove_pid_file(pid_file: &Path, elevated: bool, ctx: &ApplyContext) -> CauseResult<()> {
    match remove_file(pid_file) {
        Err(FailureCause::PermissionDenied { .. }) if elevated => {
            let rm = CommandSpec::argv(["rm".to_string(), "-f".to_string(), pid_file.display().to_string()]);
            ctx.run_checked(&rm, true)?;
            Ok(())
        }
        other => other,
    }
}
