mod alerts;
mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod report;
mod services;
mod settings;
mod sudo;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use commands::Exit;
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    let exit = match cli.command {
        Command::Apply(args) => commands::apply::apply(&ctx, &args)?,
        Command::Diff(args) => commands::apply::diff(&args)?,
        Command::Alert(args) => commands::alert::run(&ctx, &args)?,
        Command::Tokens { check } => commands::alert::tokens(check)?,
        Command::Render(args) => commands::render::run(&args)?,
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "cluster-agent", &mut io::stdout());
            Exit::Success
        }
    };
    Ok(exit.into())
}
