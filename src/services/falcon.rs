//! Falcon server
//!
//! Only monitored: the agent answers `status` from the server's PID file and
//! leaves configuration and startup to Falcon's own scripts.

use super::Monitored;
use crate::config::ClusterConfig;
use anyhow::Result;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FalconServer {
    pub falcon_user: String,
    pub pid_dir: PathBuf,
}

impl FalconServer {
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        config.require_all(&["falcon-env/falcon_pid_dir"])?;
        Ok(Self {
            falcon_user: config.get_or("falcon-env/falcon_user", "falcon"),
            pid_dir: PathBuf::from(config.get_or("falcon-env/falcon_pid_dir", "/var/run/falcon")),
        })
    }
}

impl Monitored for FalconServer {
    fn name(&self) -> &'static str {
        "falcon"
    }

    fn pid_file(&self) -> PathBuf {
        self.pid_dir.join("falcon.pid")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{ServiceStatus, host};
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_from_config() {
        let config = ClusterConfig::new(json!({
            "configurations": {
                "falcon-env": { "falcon_pid_dir": "/var/run/falcon", "falcon_user": "falcon-svc" }
            }
        }));
        let falcon = FalconServer::from_config(&config).unwrap();
        assert_eq!(falcon.pid_file(), PathBuf::from("/var/run/falcon/falcon.pid"));
        assert_eq!(falcon.falcon_user, "falcon-svc");
    }

    #[test]
    fn test_pid_dir_is_required() {
        let config = ClusterConfig::new(json!({ "configurations": { "falcon-env": {} } }));
        let err = FalconServer::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("falcon_pid_dir"));
    }

    #[test]
    fn test_status_from_pid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let falcon = FalconServer {
            falcon_user: "falcon".into(),
            pid_dir: tmp.path().to_path_buf(),
        };
        let local = host::local();

        assert_eq!(falcon.status(local.host()), ServiceStatus::Stopped);
        fs::write(tmp.path().join("falcon.pid"), std::process::id().to_string()).unwrap();
        assert!(falcon.status(local.host()).is_running());
        fs::write(tmp.path().join("falcon.pid"), "").unwrap();
        assert!(matches!(falcon.status(local.host()), ServiceStatus::Unknown { .. }));
    }
}
