//! Agent settings (`agent.toml`)
//!
//! ```toml
//! tmp_dir = "/var/lib/cluster-agent/tmp"
//! default_timeout_secs = 600
//!
//! [sudo]
//! commands = ["chown"]
//! services = ["datanode"]
//! ```

use crate::paths;
use crate::sudo::SudoConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Scratch directory for credential caches and backups
    #[serde(default)]
    pub tmp_dir: Option<String>,

    /// Deadline for commands that declare none
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Sudo allowlist
    #[serde(default)]
    pub sudo: SudoConfig,
}

impl Settings {
    /// Load settings from the config directory; a missing file means defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::settings_file()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("no settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read settings file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Invalid TOML format in {}", path.display()))
    }

    /// Scratch directory, expanded
    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir
            .as_deref()
            .map_or_else(std::env::temp_dir, paths::expand)
    }

    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&tmp.path().join("agent.toml")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.tmp_dir(), std::env::temp_dir());
        assert_eq!(settings.default_timeout(), None);
    }

    #[test]
    fn test_load_settings() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agent.toml");
        fs::write(
            &path,
            r#"
tmp_dir = "/var/lib/cluster-agent/tmp"
default_timeout_secs = 600

[sudo]
commands = ["chown"]
services = ["datanode"]
"#,
        )
        .unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.tmp_dir(), PathBuf::from("/var/lib/cluster-agent/tmp"));
        assert_eq!(settings.default_timeout(), Some(Duration::from_secs(600)));
        assert!(settings.sudo.service_requires_sudo("datanode"));
        assert!(settings.sudo.command_requires_sudo("chown"));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let settings = Settings {
            default_timeout_secs: Some(0),
            ..Default::default()
        };
        assert_eq!(settings.default_timeout(), None);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agent.toml");
        fs::write(&path, "tmpdir = \"/tmp\"\n").unwrap();
        assert!(Settings::load_from(&path).is_err());
    }
}
