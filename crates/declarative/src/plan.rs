//! Convergence plan - the ordered list of descriptors a run applies

use crate::context::SudoClassifier;
use crate::types::{ResourceDescriptor, ResourceSpec};

/// Descriptors in the order the caller declared them
///
/// Order is significant: the driver applies descriptors strictly in sequence
/// and never reorders them.
#[derive(Debug, Clone, Default)]
pub struct ConvergencePlan {
    descriptors: Vec<ResourceDescriptor>,
}

impl ConvergencePlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor
    pub fn push(&mut self, descriptor: ResourceDescriptor) -> &mut Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Append a descriptor, elevating it when the classifier says so
    ///
    /// Commands are classified by program name, services by service name.
    pub fn add_resource<C: SudoClassifier + ?Sized>(
        &mut self,
        descriptor: ResourceDescriptor,
        classifier: &C,
    ) -> &mut Self {
        let key = match &descriptor.spec {
            ResourceSpec::Command(spec) => spec.line.program().to_string(),
            ResourceSpec::Service(spec) => spec.name.clone(),
            _ => descriptor.target.clone(),
        };
        let descriptor = if classifier.requires_sudo(descriptor.resource_type(), &key) {
            log::debug!("{} classified as privileged", descriptor.id());
            descriptor.elevated()
        } else {
            descriptor
        };
        self.push(descriptor)
    }

    /// Append every descriptor of another plan
    pub fn extend(&mut self, other: ConvergencePlan) -> &mut Self {
        self.descriptors.extend(other.descriptors);
        self
    }

    /// Filter plan to only include descriptors matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&ResourceDescriptor) -> bool,
    {
        Self {
            descriptors: self.descriptors.into_iter().filter(|d| predicate(d)).collect(),
        }
    }

    /// Filter plan to only include descriptors matching a target pattern
    ///
    /// Target format: "type" or "type:name", e.g. `directory` or
    /// `file:server.properties`.
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|d| matches_filter(d, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check if plan has any privileged descriptors
    pub fn has_elevated(&self) -> bool {
        self.descriptors.iter().any(ResourceDescriptor::is_elevated)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourceDescriptor> {
        self.descriptors.iter()
    }

    pub fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }
}

impl<'a> IntoIterator for &'a ConvergencePlan {
    type Item = &'a ResourceDescriptor;
    type IntoIter = std::slice::Iter<'a, ResourceDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}

impl FromIterator<ResourceDescriptor> for ConvergencePlan {
    fn from_iter<I: IntoIterator<Item = ResourceDescriptor>>(iter: I) -> Self {
        Self {
            descriptors: iter.into_iter().collect(),
        }
    }
}

/// Parse a target string like "type:name" into (type, name)
///
/// Paths contain dots, so the separator is a colon.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once(':') {
        None => (Some(target.to_string()), None),
        Some(("", name)) => (None, Some(name.to_string())),
        Some((kind, name)) => (Some(kind.to_string()), Some(name.to_string())),
    }
}

/// Check if a descriptor matches the filter criteria
fn matches_filter(descriptor: &ResourceDescriptor, resource_type: Option<&str>, name: Option<&str>) -> bool {
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "dirs" | "directories" => descriptor.resource_type() == "directory",
            "files" => descriptor.resource_type() == "file",
            "links" | "symlinks" => descriptor.resource_type() == "symlink",
            "exec" | "execute" | "commands" => descriptor.resource_type() == "command",
            "services" => descriptor.resource_type() == "service",
            _ => descriptor.resource_type() == rt,
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name
        && !descriptor.target.contains(n)
    {
        return false;
    }

    true
}
