//! Typed access to the cluster command document
//!
//! The document is the JSON (or TOML) the orchestrator hands to the agent:
//! a `configurations` object of sections (`hdfs-site`, `oozie-env`, ...)
//! plus root keys such as `hostname` and `clusterHostInfo`.
//!
//! # Paths
//!
//! - `oozie-site/oozie.base.url` - `/`-separated segments; a leading `/` is
//!   ignored
//! - `configurations/` is implied when the first segment is not a root key
//! - `hadoop-env.hdfs_user` - without a `/`, the path splits on its first
//!   `.` only, so property names keep their dots

use anyhow::{Context, Result};
use declarative::Error;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Root key holding the configuration sections
const CONFIGURATIONS: &str = "configurations";

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    root: Value,
}

impl ClusterConfig {
    pub fn new(root: Value) -> Self {
        Self { root }
    }

    /// Load a command document; `.toml` files are parsed as TOML, anything
    /// else as JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let root: Value = if path.extension().is_some_and(|ext| ext == "toml") {
            toml::from_str(&content)
                .with_context(|| format!("Invalid TOML format in {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON format in {}", path.display()))?
        };
        log::debug!("loaded cluster configuration from {}", path.display());
        Ok(Self::new(root))
    }

    /// Look up a value by path
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.segments(path)
            .iter()
            .try_fold(&self.root, |value, segment| match value {
                Value::Object(map) => map.get(*segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            })
    }

    /// String value at `path`, or `default` when absent
    pub fn get_or(&self, path: &str, default: &str) -> String {
        self.str(path).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, path: &str) -> declarative::Result<&Value> {
        self.get(path).ok_or_else(|| Error::ConfigurationMissing {
            key: path.to_string(),
        })
    }

    pub fn require_str(&self, path: &str) -> declarative::Result<String> {
        self.require(path).map(scalar_text)
    }

    /// Scalar at `path` as text; objects and arrays are not strings
    pub fn str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::Object(_) | Value::Array(_) | Value::Null => None,
            other => Some(scalar_text(other)),
        }
    }

    /// Boolean at `path`; accepts JSON booleans and `"true"`/`"false"` in any case
    pub fn bool(&self, path: &str) -> Option<bool> {
        match self.get(path)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    /// List at `path`: a JSON array, or a comma-separated string
    ///
    /// Empty entries are dropped.
    pub fn list(&self, path: &str) -> Vec<String> {
        match self.get(path) {
            Some(Value::Array(items)) => items
                .iter()
                .map(scalar_text)
                .filter(|s| !s.is_empty())
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// An object section, e.g. `kafka-broker`
    pub fn section(&self, path: &str) -> Option<&Map<String, Value>> {
        self.get(path).and_then(Value::as_object)
    }

    /// Check that every path is present
    ///
    /// All missing keys are reported together.
    pub fn require_all(&self, paths: &[&str]) -> declarative::Result<()> {
        let missing: Vec<&str> = paths
            .iter()
            .copied()
            .filter(|p| self.get(p).is_none())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigurationMissing {
                key: missing.join(", "),
            })
        }
    }

    /// Name of the host the agent runs on
    pub fn hostname(&self) -> declarative::Result<String> {
        self.require_str("/hostname")
    }

    fn segments<'p>(&self, path: &'p str) -> Vec<&'p str> {
        let path = path.strip_prefix('/').unwrap_or(path);
        let mut segments: Vec<&str> = if path.contains('/') {
            path.split('/').collect()
        } else {
            match path.split_once('.') {
                Some((section, key)) => vec![section, key],
                None => vec![path],
            }
        };

        let is_root_key = self
            .root
            .as_object()
            .is_some_and(|root| segments.first().is_some_and(|s| root.contains_key(*s)));
        if !is_root_key {
            segments.insert(0, CONFIGURATIONS);
        }
        segments
    }
}

/// Text of a scalar: strings verbatim, other values in JSON notation
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> ClusterConfig {
        ClusterConfig::new(json!({
            "hostname": "c6401.example.com",
            "clusterHostInfo": { "kafka_broker_hosts": ["c6402", "c6401"] },
            "configurations": {
                "oozie-site": { "oozie.base.url": "http://c6401:11000/oozie" },
                "cluster-env": { "security_enabled": "TRUE", "smokeuser": "ambari-qa" },
                "hadoop-env": { "hdfs_user": "hdfs", "namenode_heapsize": 1024 },
                "hdfs-site": { "dfs.datanode.data.dir": "/data/1, /data/2,," },
                "kafka-broker": { "log.dirs": "/kafka-logs", "flag": false }
            }
        }))
    }

    #[test]
    fn test_path_forms() {
        let c = config();
        let url = Some("http://c6401:11000/oozie".to_string());
        assert_eq!(c.str("oozie-site/oozie.base.url"), url);
        assert_eq!(c.str("/oozie-site/oozie.base.url"), url);
        assert_eq!(c.str("configurations/oozie-site/oozie.base.url"), url);
        assert_eq!(c.str("hadoop-env.hdfs_user"), Some("hdfs".to_string()));
        assert_eq!(c.str("hostname"), Some("c6401.example.com".to_string()));
        assert_eq!(c.str("clusterHostInfo/kafka_broker_hosts/1"), Some("c6401".to_string()));
    }

    #[test]
    fn test_typed_accessors() {
        let c = config();
        assert_eq!(c.bool("cluster-env/security_enabled"), Some(true));
        assert_eq!(c.bool("kafka-broker/flag"), Some(false));
        assert_eq!(c.bool("cluster-env/smokeuser"), None);
        assert_eq!(c.str("hadoop-env/namenode_heapsize"), Some("1024".to_string()));
        assert_eq!(c.list("hdfs-site/dfs.datanode.data.dir"), vec!["/data/1", "/data/2"]);
        assert_eq!(c.list("clusterHostInfo/kafka_broker_hosts"), vec!["c6402", "c6401"]);
        assert!(c.list("hdfs-site/missing").is_empty());
        assert_eq!(c.get_or("oozie-env/oozie_user", "oozie"), "oozie");
        assert!(c.section("kafka-broker").is_some_and(|s| s.len() == 2));
    }

    #[test]
    fn test_require() {
        let c = config();
        assert_eq!(c.hostname().unwrap(), "c6401.example.com");

        let err = c.require("oozie-env/content").unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { ref key } if key == "oozie-env/content"));

        assert!(c.require_all(&["hostname", "hadoop-env/hdfs_user"]).is_ok());
        let err = c.require_all(&["hostname", "a/b", "c/d"]).unwrap_err();
        assert!(matches!(err, Error::ConfigurationMissing { ref key } if key == "a/b, c/d"));
    }

    #[test]
    fn test_load_json_and_toml() {
        let tmp = tempfile::tempdir().unwrap();

        let json_path = tmp.path().join("command.json");
        fs::write(&json_path, r#"{"configurations": {"kafka-env": {"kafka_user": "kafka"}}}"#).unwrap();
        let c = ClusterConfig::load(&json_path).unwrap();
        assert_eq!(c.str("kafka-env/kafka_user"), Some("kafka".to_string()));

        let toml_path = tmp.path().join("command.toml");
        fs::write(&toml_path, "hostname = \"h1\"\n[configurations.kafka-env]\nkafka_user = \"kafka\"\n").unwrap();
        let c = ClusterConfig::load(&toml_path).unwrap();
        assert_eq!(c.str("kafka-env.kafka_user"), Some("kafka".to_string()));
        assert_eq!(c.hostname().unwrap(), "h1");

        let bad = tmp.path().join("bad.json");
        fs::write(&bad, "{").unwrap();
        assert!(ClusterConfig::load(&bad).is_err());
    }
}
