//! Service lifecycle plans
//!
//! Each component turns its parameters into ordered convergence plans for
//! `configure`, `start` and `stop`. Parameters are read once from the
//! cluster configuration when the component is built and never change
//! afterwards; `status` is answered from the PID file alone, which is all a
//! [`Monitored`] service offers.

pub mod datanode;
pub mod falcon;
pub mod kafka;

use declarative::{ConvergencePlan, GuardExpr, Host, ResourceDescriptor, ServiceStatus, probe_status};
use std::path::{Path, PathBuf};

pub use datanode::DataNode;
pub use falcon::FalconServer;
pub use kafka::KafkaBroker;

/// What the agent was asked to do with a component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Configure,
    Start,
    Stop,
    Status,
}

/// A service whose liveness is read from its PID file
pub trait Monitored {
    fn name(&self) -> &'static str;

    fn pid_file(&self) -> PathBuf;

    /// Probe the PID file; never changes anything
    fn status(&self, host: Host<'_>) -> ServiceStatus {
        probe_status(host.probe, host.processes, &self.pid_file())
    }
}

pub trait Component: Monitored {
    /// Write configuration and create directories
    fn configure(&self) -> ConvergencePlan;

    /// Bring the service up; includes `configure`
    fn start(&self) -> ConvergencePlan;

    fn stop(&self) -> ConvergencePlan;

    /// Plan for a mutating action; `Status` has none
    fn plan(&self, action: LifecycleAction) -> Option<ConvergencePlan> {
        match action {
            LifecycleAction::Configure => Some(self.configure()),
            LifecycleAction::Start => Some(self.start()),
            LifecycleAction::Stop => Some(self.stop()),
            LifecycleAction::Status => None,
        }
    }
}

/// Guard that holds while the process named by a PID file is alive
pub fn process_running(pid_file: &Path) -> GuardExpr {
    let pid_file = pid_file.display();
    GuardExpr::command(format!(
        "ls {pid_file} >/dev/null 2>&1 && ps -p `cat {pid_file}` >/dev/null 2>&1"
    ))
}

/// Remove a PID file left behind by a process that is gone
pub fn stale_pid_file(pid_file: &Path) -> ResourceDescriptor {
    ResourceDescriptor::file(pid_file)
        .absent()
        .not_if(process_running(pid_file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ResourceSpec, host};
    use std::fs;

    struct Fixed(PathBuf);

    impl Monitored for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn pid_file(&self) -> PathBuf {
            self.0.clone()
        }
    }

    impl Component for Fixed {
        fn configure(&self) -> ConvergencePlan {
            let mut plan = ConvergencePlan::new();
            plan.push(ResourceDescriptor::directory("/tmp"));
            plan
        }

        fn start(&self) -> ConvergencePlan {
            ConvergencePlan::new()
        }

        fn stop(&self) -> ConvergencePlan {
            ConvergencePlan::new()
        }
    }

    #[test]
    fn test_status_has_no_plan() {
        let component = Fixed(PathBuf::from("/nonexistent/fixed.pid"));
        assert!(component.plan(LifecycleAction::Status).is_none());
        assert_eq!(component.plan(LifecycleAction::Configure).map(|p| p.len()), Some(1));
    }

    #[test]
    fn test_status_reads_pid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let pid_file = tmp.path().join("fixed.pid");
        let component = Fixed(pid_file.clone());
        let local = host::local();

        assert_eq!(component.status(local.host()), ServiceStatus::Stopped);
        fs::write(&pid_file, std::process::id().to_string()).unwrap();
        assert!(component.status(local.host()).is_running());
    }

    #[test]
    fn test_stale_pid_file_descriptor() {
        let descriptor = stale_pid_file(Path::new("/var/run/kafka/kafka.pid"));
        assert!(matches!(descriptor.spec, ResourceSpec::File { .. }));
        let guard = descriptor.guard.unwrap().to_string();
        assert!(guard.contains("ps -p `cat /var/run/kafka/kafka.pid`"));
    }
}
