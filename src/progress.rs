//! Terminal progress for convergence runs

use colored::Colorize;
use declarative::{ApplyResult, ExecutionResult, Outcome, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};

use crate::ui;

/// Shows a bar while resources are applied and one line per change
///
/// Unchanged resources are only listed when `verbose` is set.
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
    verbose: bool,
    quiet: bool,
}

impl ConsoleProgress {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            bar: None,
            verbose,
            quiet,
        }
    }

    fn println(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{line}")),
            None => println!("{line}"),
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_run_start(&mut self, count: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(count as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, id: &str, _description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(ui::truncate_path(id, 40));
        }
    }

    fn on_resource_complete(&mut self, result: &ExecutionResult) {
        let id = &result.descriptor_id;
        let line = match &result.outcome {
            Outcome::Applied {
                result: ApplyResult::NoChange,
            } => self.verbose.then(|| format!("  {} {}", "·".dimmed(), id.dimmed())),
            Outcome::Applied { result: applied } => {
                Some(format!("  {} {} {}", "✓".green(), id, format!("({applied})").dimmed()))
            }
            Outcome::SkippedGuard { reason } => match &result.error {
                Some(error) => Some(format!("  {} {} ({error})", "⚠".yellow(), id)),
                None => self
                    .verbose
                    .then(|| format!("  {} {} {}", "-".dimmed(), id, format!("({reason})").dimmed())),
            },
            Outcome::Failed => {
                let error = result
                    .error
                    .as_ref()
                    .map_or_else(|| "failed".to_string(), ToString::to_string);
                Some(format!("  {} {} ({error})", "✗".red(), id))
            }
        };
        // failures are shown even when quiet
        if let Some(line) = line
            && (!self.quiet || result.is_failed())
        {
            self.println(&line);
        }
        if let Some(bar) = &self.bar {
            bar.inc(1);
        }
    }

    fn on_run_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
