//! `alert` and `tokens`

use anyhow::Result;
use colored::Colorize;
use declarative::{Host, host};

use super::{Exit, load_config};
use crate::Context;
use crate::alerts::oozie::OozieServerCheck;
use crate::alerts::{AlertCheck, AlertOutcome, AlertStatus, Parameters, resolve_tokens};
use crate::cli::{AlertArgs, CheckName};
use crate::settings::Settings;

pub fn run(ctx: &Context, args: &AlertArgs) -> Result<Exit> {
    let settings = Settings::load()?;
    let config = load_config(&args.config)?;
    let local = host::local();
    let check = build_check(args.check, local.host(), &settings);

    // a document without any configuration section supplied nothing at all
    let configurations = config
        .section("/configurations")
        .map(|_| resolve_tokens(check.as_ref(), &config));
    let parameters: Parameters = args.params.iter().cloned().collect();
    let host_name = args
        .host_name
        .clone()
        .or_else(|| config.str("/hostname"))
        .unwrap_or_else(|| "localhost".to_string());
    log::debug!(
        "running {:?} check for {host_name} with {} resolved tokens",
        args.check,
        configurations.as_ref().map_or(0, |c| c.len())
    );

    let outcome = check.execute(configurations.as_ref(), &parameters, &host_name);
    if !ctx.quiet || outcome.status != AlertStatus::Ok {
        print_outcome(&outcome);
    }
    Ok(exit_for(outcome.status))
}

pub fn tokens(check: CheckName) -> Result<Exit> {
    let settings = Settings::load()?;
    let local = host::local();
    for token in build_check(check, local.host(), &settings).tokens() {
        println!("{token}");
    }
    Ok(Exit::Success)
}

fn build_check<'a>(name: CheckName, host: Host<'a>, settings: &Settings) -> Box<dyn AlertCheck + 'a> {
    match name {
        CheckName::Oozie => Box::new(OozieServerCheck::new(host, settings.tmp_dir())),
    }
}

fn print_outcome(outcome: &AlertOutcome) {
    let label = match outcome.status {
        AlertStatus::Ok => outcome.status.to_string().green().bold(),
        AlertStatus::Critical => outcome.status.to_string().red().bold(),
        AlertStatus::Unknown => outcome.status.to_string().yellow().bold(),
    };
    println!("{label}: {}", outcome.messages.join("; "));
}

fn exit_for(status: AlertStatus) -> Exit {
    match status {
        AlertStatus::Ok => Exit::Success,
        AlertStatus::Critical => Exit::Critical,
        AlertStatus::Unknown => Exit::AlertUnknown,
    }
}
