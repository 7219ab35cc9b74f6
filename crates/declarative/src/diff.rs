//! Diff computation for plans
//!
//! A preview of what a run would change, computed from probe answers
//! without touching the host. Guards are evaluated, so a descriptor whose
//! guard does not hold is left out of the preview.

use crate::actions::{current_state, desired_state};
use crate::context::Host;
use crate::guard::evaluate;
use crate::plan::ConvergencePlan;
use crate::template;
use crate::types::{ContentSource, ResourceDescriptor, ResourceSpec, ResourceState};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Textual before/after of a file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentChange {
    pub current: String,
    pub desired: String,
}

/// A diff between current and desired state of a resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Identity of the descriptor
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
    /// Whether this resource runs with elevated privileges
    pub requires_sudo: bool,
    /// Content difference for files whose content can be produced locally
    pub content: Option<ContentChange>,
}

impl ResourceDiff {
    /// Create a diff from a descriptor, returning None if no changes needed
    pub fn from_descriptor(descriptor: &ResourceDescriptor, host: Host<'_>) -> Option<Self> {
        let current = current_state(descriptor, host);
        let desired = desired_state(descriptor);
        let content = content_change(descriptor, host);

        if current == desired && content.is_none() {
            return None;
        }

        Some(Self {
            resource_id: descriptor.id(),
            resource_type: descriptor.resource_type().to_string(),
            description: descriptor.description(),
            current,
            desired,
            requires_sudo: descriptor.is_elevated(),
            content,
        })
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }

    /// Check if this diff represents a modification
    pub fn is_modification(&self) -> bool {
        !self.is_addition() && !self.is_removal()
    }
}

/// Content comparison for files with locally producible content
///
/// Remote sources are not downloaded for a preview.
fn content_change(descriptor: &ResourceDescriptor, host: Host<'_>) -> Option<ContentChange> {
    let ResourceSpec::File {
        content: Some(source),
        ensure: crate::types::Ensure::Present,
        ..
    } = &descriptor.spec
    else {
        return None;
    };

    let desired = match source {
        ContentSource::Inline(bytes) => bytes.clone(),
        ContentSource::Template { template, bindings } => template::render(template, bindings)
            .unwrap_or_else(|e| format!("<{e}>").into_bytes()),
        ContentSource::Local(path) => std::fs::read(path).ok()?,
        ContentSource::Remote(_) => return None,
    };
    let current = host.probe.read(descriptor.path()).unwrap_or_default();

    if blake3::hash(&current) == blake3::hash(&desired) {
        return None;
    }
    Some(ContentChange {
        current: String::from_utf8_lossy(&current).to_string(),
        desired: String::from_utf8_lossy(&desired).to_string(),
    })
}

/// Compute diffs for a plan
///
/// Returns only descriptors whose guard holds and whose current state differs
/// from the desired one.
pub fn compute_diffs(plan: &ConvergencePlan, host: Host<'_>) -> Vec<ResourceDiff> {
    plan.iter()
        .filter(|d| match &d.guard {
            Some(guard) => {
                let holds = evaluate(guard, host.probe);
                if !holds {
                    log::debug!("{}: guard {guard} does not hold", d.id());
                }
                holds
            }
            None => true,
        })
        .filter_map(|d| ResourceDiff::from_descriptor(d, host))
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
    /// Number of resources requiring sudo
    pub sudo_required: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
            if diff.requires_sudo {
                summary.sudo_required += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// Group diffs by resource type
pub fn group_by_type(diffs: &[ResourceDiff]) -> BTreeMap<String, Vec<&ResourceDiff>> {
    let mut groups: BTreeMap<String, Vec<&ResourceDiff>> = BTreeMap::new();
    for diff in diffs {
        groups
            .entry(diff.resource_type.clone())
            .or_default()
            .push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::GuardExpr;
    use crate::host::LocalHost;
    use crate::types::CommandSpec;
    use std::fs;

    #[test]
    fn test_compute_diffs() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("conf");
        fs::create_dir(&existing).unwrap();
        let file = existing.join("server.properties");
        fs::write(&file, "broker.id=1\n").unwrap();

        let mut plan = ConvergencePlan::new();
        plan.push(ResourceDescriptor::directory(&existing))
            .push(ResourceDescriptor::directory(tmp.path().join("new")))
            .push(ResourceDescriptor::file(&file).content(ContentSource::text("broker.id=0\n")))
            .push(
                ResourceDescriptor::command(CommandSpec::shell("echo skipped"))
                    .only_if(GuardExpr::Const(false)),
            );

        let host = LocalHost::new();
        let diffs = compute_diffs(&plan, host.host());
        assert_eq!(diffs.len(), 2);

        assert!(diffs[0].is_addition());
        let content = diffs[1].content.as_ref().unwrap();
        assert_eq!(content.current, "broker.id=1\n");
        assert_eq!(content.desired, "broker.id=0\n");

        let summary = DiffSummary::from_diffs(&diffs);
        assert_eq!(summary.additions, 1);
        assert_eq!(summary.modifications, 1);
        assert!(summary.has_changes());

        let groups = group_by_type(&diffs);
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["directory", "file"]);
    }

    #[test]
    fn test_preview_does_not_touch_host() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("new-dir");
        let mut plan = ConvergencePlan::new();
        plan.push(ResourceDescriptor::directory(&path));

        let host = LocalHost::new();
        assert_eq!(compute_diffs(&plan, host.host()).len(), 1);
        assert!(!path.exists());
    }
}
