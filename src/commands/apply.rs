//! `apply` and `diff`

use anyhow::{Result, bail};
use colored::Colorize;
use declarative::{
    ConvergencePlan, ExecuteOptions, Host, ServiceStatus, compute_diffs, converge, host,
};

use super::{Exit, build_component, build_monitored, load_config};
use crate::Context;
use crate::cli::{ApplyArgs, DiffArgs};
use crate::report;
use crate::progress::ConsoleProgress;
use crate::services::{Component, LifecycleAction, Monitored};
use crate::settings::Settings;
use crate::sudo::{SudoConfig, SudoContext};
use crate::ui;

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<Exit> {
    let settings = Settings::load()?;
    let config = load_config(&args.config)?;
    let local = host::local();
    let host = local.host();
    let action = LifecycleAction::from(args.action);

    if action == LifecycleAction::Status {
        let service = build_monitored(args.component, &config, host.probe)?;
        return Ok(status(service.as_ref(), host));
    }
    let component = build_component(args.component, &config, host.probe)?;
    let Some(plan) = component.plan(action) else {
        bail!("{} has no plan for {action:?}", component.name());
    };
    let plan = classify(&plan, &settings.sudo).filter_by_target(args.target.as_deref());

    if args.dry_run {
        let diffs = compute_diffs(&plan, host);
        report::display_diff(&diffs, true);
        report::display_sudo_boundary(&diffs);
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(Exit::Success);
    }

    if !ctx.quiet {
        ui::header(&format!("{} {action:?}", component.name()));
        if plan.has_elevated() {
            report::display_sudo_boundary(&compute_diffs(&plan, host));
        }
    }

    let opts = ExecuteOptions {
        verbose: ctx.verbose > 0,
        default_timeout: settings.default_timeout(),
    };
    let mut progress = ConsoleProgress::new(ctx.verbose > 0, ctx.quiet);
    let reason = format!("{} {action:?}", component.name());
    let run = converge(
        &plan,
        &opts,
        host,
        || SudoContext::acquire(&reason),
        &mut progress,
    );

    if !ctx.quiet {
        report::print_summary(&run.summary());
    }
    if let Some(failure) = run.failure() {
        let error = failure
            .error
            .as_ref()
            .map_or_else(|| "failed".to_string(), ToString::to_string);
        ui::error(&format!("{}: {error}", failure.descriptor_id));
        return Ok(Exit::Failed);
    }
    Ok(Exit::Success)
}

pub fn diff(args: &DiffArgs) -> Result<Exit> {
    let settings = Settings::load()?;
    let config = load_config(&args.config)?;
    let local = host::local();
    let host = local.host();
    let action = LifecycleAction::from(args.action);

    if action == LifecycleAction::Status {
        ui::info("status never changes anything");
        return Ok(Exit::Success);
    }
    let component = build_component(args.component, &config, host.probe)?;
    let Some(plan) = component.plan(action) else {
        bail!("{} has no plan for {action:?}", component.name());
    };
    let plan = classify(&plan, &settings.sudo).filter_by_target(args.target.as_deref());

    let diffs = compute_diffs(&plan, host);
    report::display_diff(&diffs, true);
    report::display_sudo_boundary(&diffs);
    Ok(Exit::Success)
}

fn status(service: &dyn Monitored, host: Host<'_>) -> Exit {
    let status = service.status(host);
    report::print_status(service.name(), &status);
    match status {
        ServiceStatus::Running { .. } => Exit::Success,
        ServiceStatus::Stopped => Exit::Stopped,
        ServiceStatus::Unknown { .. } => Exit::StatusUnknown,
    }
}

/// Rebuild a plan, elevating what the sudo allowlist names
fn classify(plan: &ConvergencePlan, sudo: &SudoConfig) -> ConvergencePlan {
    let mut classified = ConvergencePlan::new();
    for descriptor in plan.iter().cloned() {
        classified.add_resource(descriptor, sudo);
    }
    classified
}
