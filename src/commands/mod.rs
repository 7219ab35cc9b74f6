//! Subcommand handlers

pub mod alert;
pub mod apply;
pub mod render;

use crate::cli::{ComponentName, ConfigArg};
use crate::config::ClusterConfig;
use crate::paths;
use crate::services::{Component, DataNode, FalconServer, KafkaBroker, Monitored};
use anyhow::{Result, bail};
use declarative::SystemProbe;
use std::process::ExitCode;

/// Process exit status of a subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Success,
    /// Convergence aborted
    Failed,
    /// Alert check is CRITICAL
    Critical,
    /// Alert check could not decide
    AlertUnknown,
    /// Service not running
    Stopped,
    StatusUnknown,
}

impl Exit {
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
            Self::Critical => 2,
            Self::AlertUnknown | Self::Stopped => 3,
            Self::StatusUnknown => 4,
        }
    }
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        Self::from(exit.code())
    }
}

/// Load the cluster command document named on the command line, or the
/// default one in the config directory
fn load_config(arg: &ConfigArg) -> Result<ClusterConfig> {
    let path = match &arg.config {
        Some(path) => path.clone(),
        None => paths::default_command_file()?,
    };
    ClusterConfig::load(&path)
}

fn build_component(
    name: ComponentName,
    config: &ClusterConfig,
    probe: &dyn SystemProbe,
) -> Result<Box<dyn Component>> {
    Ok(match name {
        ComponentName::Datanode => Box::new(DataNode::from_config(config, probe)?),
        ComponentName::Kafka => Box::new(KafkaBroker::from_config(config)?),
        ComponentName::Falcon => bail!("falcon is only monitored; status is its one action"),
    })
}

fn build_monitored(
    name: ComponentName,
    config: &ClusterConfig,
    probe: &dyn SystemProbe,
) -> Result<Box<dyn Monitored>> {
    Ok(match name {
        ComponentName::Datanode => Box::new(DataNode::from_config(config, probe)?),
        ComponentName::Kafka => Box::new(KafkaBroker::from_config(config)?),
        ComponentName::Falcon => Box::new(FalconServer::from_config(config)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Exit::Success.code(), 0);
        assert_eq!(Exit::Failed.code(), 1);
        assert_eq!(Exit::Critical.code(), 2);
        assert_eq!(Exit::Stopped.code(), 3);
        assert_eq!(Exit::AlertUnknown.code(), 3);
        assert_eq!(Exit::StatusUnknown.code(), 4);
    }

    #[test]
    fn test_falcon_is_status_only() {
        let config = ClusterConfig::new(serde_json::json!({
            "configurations": { "falcon-env": { "falcon_pid_dir": "/var/run/falcon" } }
        }));
        let probe = declarative::host::LocalProbe::new();

        let err = build_component(ComponentName::Falcon, &config, &probe).err().unwrap();
        assert!(err.to_string().contains("status"));

        let falcon = build_monitored(ComponentName::Falcon, &config, &probe).ok().unwrap();
        assert_eq!(falcon.pid_file(), std::path::PathBuf::from("/var/run/falcon/falcon.pid"));
    }
}
