//! Diff and summary display

use colored::Colorize;
use declarative::{
    ContentChange, DiffSummary, ExecuteSummary, ResourceDiff, ResourceState, ServiceStatus,
    group_by_type,
};
use similar::{ChangeTag, TextDiff};

/// Privileged operations listed before the rest are elided
const SUDO_LIST_LIMIT: usize = 10;

/// Display a list of diffs grouped by resource type
pub fn display_diff(diffs: &[ResourceDiff], show_content: bool) {
    if diffs.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Configuration Diff".bold()
    );
    println!("│");

    for (resource_type, type_diffs) in group_by_type(diffs) {
        println!("│ {}", type_heading(&resource_type).bold());

        for diff in type_diffs {
            let symbol = if diff.is_addition() {
                "+".green()
            } else if diff.is_removal() {
                "-".red()
            } else {
                "~".yellow()
            };

            let sudo_indicator = if diff.requires_sudo {
                " [sudo]".red().to_string()
            } else {
                String::new()
            };

            println!(
                "│   {} {:<40} {}{}",
                symbol,
                diff.resource_id,
                state_change(diff).dimmed(),
                sudo_indicator
            );

            if show_content && let Some(change) = &diff.content {
                for line in content_diff(change) {
                    println!("│       {line}");
                }
            }
        }
        println!("│");
    }

    let summary = DiffSummary::from_diffs(diffs);
    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} changes ({} to add, {} to change, {} to remove, {} require sudo)",
        summary.total().to_string().bold(),
        summary.additions.to_string().green(),
        summary.modifications.to_string().yellow(),
        summary.removals.to_string().red(),
        summary.sudo_required.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display the operations that will run through sudo
pub fn display_sudo_boundary(diffs: &[ResourceDiff]) {
    let privileged: Vec<&ResourceDiff> = diffs.iter().filter(|d| d.requires_sudo).collect();
    if privileged.is_empty() {
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Privilege Boundary".yellow().bold()
    );
    println!("│");
    println!(
        "│  {}  The following {} operations require sudo:",
        "⚠".yellow(),
        privileged.len()
    );
    println!("│");

    for diff in privileged.iter().take(SUDO_LIST_LIMIT) {
        println!("│  • {}", diff.description);
    }

    if privileged.len() > SUDO_LIST_LIMIT {
        println!("│  • ... and {} more", privileged.len() - SUDO_LIST_LIMIT);
    }

    println!("│");
    println!("│  Sudo will be checked once and released after the run.");
    println!("│");
    println!("└─────────────────────────────────────────────────────────────┘");
}

/// Print the outcome of a convergence run
pub fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() {
        println!("  {} Converged successfully", "✓".green().bold());
    } else {
        println!("  {} Convergence aborted", "✗".red().bold());
    }

    let counts = [
        (summary.created, "created"),
        (summary.modified, "modified"),
        (summary.removed, "removed"),
        (summary.executed, "executed"),
        (summary.skipped, "skipped"),
        (summary.no_change, "unchanged"),
    ];
    for (count, label) in counts {
        if count > 0 {
            println!("    • {count} {label}");
        }
    }
    if summary.failed > 0 {
        println!("    • {} {}", summary.failed, "failed".red());
    }
}

/// Print the probed status of a service
pub fn print_status(name: &str, status: &ServiceStatus) {
    match status {
        ServiceStatus::Running { pid } => {
            println!("  {} {name} is running (pid {pid})", "●".green());
        }
        ServiceStatus::Stopped => println!("  {} {name} is stopped", "○".dimmed()),
        ServiceStatus::Unknown { reason } => {
            println!("  {} {name} status unknown: {reason}", "?".yellow());
        }
    }
}

fn type_heading(resource_type: &str) -> &str {
    match resource_type {
        "directory" => "Directories",
        "file" => "Files",
        "symlink" => "Symlinks",
        "command" => "Commands",
        "service" => "Services",
        other => other,
    }
}

fn state_change(diff: &ResourceDiff) -> String {
    match (&diff.current, &diff.desired) {
        (ResourceState::Absent, ResourceState::Present { details }) => format!(
            "(missing){}",
            details.as_ref().map(|d| format!(" → {d}")).unwrap_or_default()
        ),
        (ResourceState::Present { details: from }, ResourceState::Present { details: to }) => format!(
            "{} → {}",
            from.as_deref().unwrap_or("current"),
            to.as_deref().unwrap_or("desired")
        ),
        (ResourceState::Modified { from, to }, _) | (_, ResourceState::Modified { from, to }) => {
            format!("{from} → {to}")
        }
        (_, ResourceState::Absent) => "(will remove)".to_string(),
        (_, ResourceState::Unknown) | (ResourceState::Unknown, _) => diff.description.clone(),
    }
}

/// Unified-style line diff of file content, colored
fn content_diff(change: &ContentChange) -> Vec<String> {
    changed_lines(change)
        .into_iter()
        .map(|(tag, line)| match tag {
            ChangeTag::Delete => format!("- {line}").red().to_string(),
            ChangeTag::Insert => format!("+ {line}").green().to_string(),
            ChangeTag::Equal => line,
        })
        .collect()
}

fn changed_lines(change: &ContentChange) -> Vec<(ChangeTag, String)> {
    TextDiff::from_lines(&change.current, &change.desired)
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .map(|c| (c.tag(), c.value().trim_end_matches('\n').to_string()))
        .collect()
}
