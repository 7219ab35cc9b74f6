//! HDFS DataNode

use super::{Component, Monitored, stale_pid_file};
use crate::config::ClusterConfig;
use anyhow::Result;
use declarative::{
    CdAccess, CommandSpec, ContentSource, ConvergencePlan, Error, FileKind, GuardExpr,
    ResourceDescriptor, ServiceAction, SystemProbe,
};
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

const PROC_MOUNTS: &str = "/proc/mounts";

const MOUNT_FILE_HEADER: &str = "\
# Last known mount point of every DFS data dir.
# Regenerated whenever the DataNode is configured; a data dir whose mount
# point changed to / is a sign that its drive is no longer mounted.
# data_dir,mount_point
";

/// DataNode parameters, resolved once from the cluster configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataNode {
    pub hdfs_user: String,
    pub user_group: String,
    pub domain_socket_dir: PathBuf,
    pub data_dir_mount_file: PathBuf,
    pub data_dirs: Vec<PathBuf>,
    pub pid_dir: PathBuf,
    pub log_dir: PathBuf,
    pub conf_dir: PathBuf,
    pub bin_dir: PathBuf,
    /// Mount points of the host, from `/proc/mounts`
    pub mounts: Vec<PathBuf>,
    /// Mount point of each data dir as recorded by the last configure
    pub previous_mounts: BTreeMap<PathBuf, PathBuf>,
    /// Missing data dirs whose own mount is gone; they are not created
    pub unmounted: Vec<PathBuf>,
}

impl DataNode {
    pub fn from_config(config: &ClusterConfig, probe: &dyn SystemProbe) -> Result<Self> {
        config.require_all(&["hdfs-site/dfs.datanode.data.dir"])?;

        let hdfs_user = config.get_or("hadoop-env/hdfs_user", "hdfs");
        let socket_path = PathBuf::from(config.get_or(
            "hdfs-site/dfs.domain.socket.path",
            "/var/lib/hadoop-hdfs/dn_socket",
        ));
        let domain_socket_dir = socket_path
            .parent()
            .map_or_else(|| socket_path.clone(), Path::to_path_buf);

        let data_dirs: Vec<PathBuf> = config
            .list("hdfs-site/dfs.datanode.data.dir")
            .iter()
            .map(|dir| PathBuf::from(strip_storage_type(dir)))
            .collect();
        if data_dirs.is_empty() {
            return Err(Error::ConfigurationMissing {
                key: "hdfs-site/dfs.datanode.data.dir".to_string(),
            }
            .into());
        }

        let mounts = match probe.read(Path::new(PROC_MOUNTS)) {
            Ok(bytes) => parse_mounts(&String::from_utf8_lossy(&bytes)),
            Err(e) => {
                log::warn!("cannot read {PROC_MOUNTS}: {e}; assuming everything is on /");
                Vec::new()
            }
        };

        let data_dir_mount_file = PathBuf::from(config.get_or(
            "hadoop-env/dfs.datanode.data.dir.mount.file",
            "/etc/hadoop/conf/dfs_data_dir_mount.hist",
        ));
        let previous_mounts = match probe.read(&data_dir_mount_file) {
            Ok(bytes) => parse_mount_history(&String::from_utf8_lossy(&bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                log::warn!("cannot read {}: {e}", data_dir_mount_file.display());
                BTreeMap::new()
            }
        };
        let unmounted = unmounted_dirs(&data_dirs, &mounts, &previous_mounts, probe);
        if !unmounted.is_empty() {
            let dirs: Vec<String> = unmounted.iter().map(|d| d.display().to_string()).collect();
            log::error!(
                "data dirs {} were on their own mount and now resolve to /; \
                 not creating them until the drives are mounted again",
                dirs.join(", ")
            );
        }

        let pid_prefix = config.get_or("hadoop-env/hadoop_pid_dir_prefix", "/var/run/hadoop");
        let log_prefix = config.get_or("hadoop-env/hdfs_log_dir_prefix", "/var/log/hadoop");

        Ok(Self {
            user_group: config.get_or("cluster-env/user_group", "hadoop"),
            domain_socket_dir,
            data_dir_mount_file,
            data_dirs,
            pid_dir: Path::new(&pid_prefix).join(&hdfs_user),
            log_dir: Path::new(&log_prefix).join(&hdfs_user),
            conf_dir: PathBuf::from(config.get_or("hadoop-env/hadoop_conf_dir", "/etc/hadoop/conf")),
            bin_dir: PathBuf::from(config.get_or("hadoop-env/hadoop_bin_dir", "/usr/lib/hadoop/sbin")),
            mounts,
            previous_mounts,
            unmounted,
            hdfs_user,
        })
    }

    /// Mount history: one `data_dir,mount_point` line per data dir
    ///
    /// An unmounted dir keeps its recorded mount point so the next run
    /// still knows where it belongs.
    pub fn mount_file_content(&self) -> String {
        let mut content = MOUNT_FILE_HEADER.to_string();
        for dir in &self.data_dirs {
            let mount = match self.previous_mounts.get(dir) {
                Some(previous) if self.unmounted.contains(dir) => previous.clone(),
                _ => mount_point_of(dir, &self.mounts),
            };
            content.push_str(&format!("{},{}\n", dir.display(), mount.display()));
        }
        content
    }

    fn daemon(&self, action: &str) -> CommandSpec {
        CommandSpec::shell(format!(
            "{}/hadoop-daemon.sh --config {} {action} datanode",
            self.bin_dir.display(),
            self.conf_dir.display()
        ))
        .user(&self.hdfs_user)
    }

    fn owned_dir(&self, path: &Path) -> ResourceDescriptor {
        ResourceDescriptor::directory(path)
            .owner(&self.hdfs_user)
            .group(&self.user_group)
            .recursive(true)
    }

    fn runtime_dirs(&self, plan: &mut ConvergencePlan) {
        plan.push(self.owned_dir(&self.pid_dir).mode(0o755))
            .push(self.owned_dir(&self.log_dir).mode(0o755));
    }
}

impl Monitored for DataNode {
    fn name(&self) -> &'static str {
        "datanode"
    }

    fn pid_file(&self) -> PathBuf {
        self.pid_dir
            .join(format!("hadoop-{}-datanode.pid", self.hdfs_user))
    }
}

impl Component for DataNode {
    fn configure(&self) -> ConvergencePlan {
        let mut plan = ConvergencePlan::new();
        plan.push(self.owned_dir(&self.domain_socket_dir).mode(0o751));

        if let Some(parent) = self.data_dir_mount_file.parent() {
            plan.push(
                self.owned_dir(parent)
                    .mode(0o755)
                    .not_if(GuardExpr::is_directory(parent)),
            );
        }

        // a data dir on a failed disk must not stop the others
        for dir in self.data_dirs.iter().filter(|d| !self.unmounted.contains(*d)) {
            plan.push(
                self.owned_dir(dir)
                    .mode(0o755)
                    .cd_access(CdAccess::All)
                    .ignore_failures(),
            );
        }

        plan.push(
            ResourceDescriptor::file(&self.data_dir_mount_file)
                .owner(&self.hdfs_user)
                .group(&self.user_group)
                .mode(0o644)
                .content(ContentSource::text(self.mount_file_content())),
        );
        plan
    }

    fn start(&self) -> ConvergencePlan {
        let mut plan = self.configure();
        self.runtime_dirs(&mut plan);
        plan.push(stale_pid_file(&self.pid_file())).push(
            ResourceDescriptor::service("datanode", self.pid_file(), ServiceAction::Start)
                .start_with(self.daemon("start")),
        );
        plan
    }

    fn stop(&self) -> ConvergencePlan {
        let mut plan = ConvergencePlan::new();
        self.runtime_dirs(&mut plan);
        plan.push(
            ResourceDescriptor::service("datanode", self.pid_file(), ServiceAction::Stop)
                .stop_with(self.daemon("stop")),
        );
        plan
    }
}

/// Drop a `[SSD]`-style storage type prefix from a data dir
fn strip_storage_type(dir: &str) -> &str {
    match dir.strip_prefix('[').and_then(|rest| rest.split_once(']')) {
        Some((_, path)) => path.trim(),
        None => dir,
    }
}

/// Mount points listed in `/proc/mounts` format
///
/// Spaces and other special characters appear as octal escapes (`\040`).
pub fn parse_mounts(text: &str) -> Vec<PathBuf> {
    text.lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(|field| PathBuf::from(unescape_octal(field)))
        .collect()
}

fn unescape_octal(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            let digits: String = chars.clone().take(3).collect();
            if digits.len() == 3
                && let Ok(code) = u8::from_str_radix(&digits, 8)
            {
                out.push(char::from(code));
                for _ in 0..3 {
                    chars.next();
                }
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Entries of a mount history file, keyed by data dir
pub fn parse_mount_history(text: &str) -> BTreeMap<PathBuf, PathBuf> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(','))
        .map(|(dir, mount)| (PathBuf::from(dir.trim()), PathBuf::from(mount.trim())))
        .collect()
}

/// Data dirs that do not exist, were last seen on a mount of their own, and
/// would now land on `/`
fn unmounted_dirs(
    data_dirs: &[PathBuf],
    mounts: &[PathBuf],
    previous: &BTreeMap<PathBuf, PathBuf>,
    probe: &dyn SystemProbe,
) -> Vec<PathBuf> {
    let root = Path::new("/");
    data_dirs
        .iter()
        .filter(|dir| {
            previous.get(*dir).is_some_and(|mount| mount != root)
                && mount_point_of(dir, mounts) == root
                && !probe.metadata(dir).is_ok_and(|m| m.kind == FileKind::Directory)
        })
        .cloned()
        .collect()
}

/// Longest mount point containing `dir`, `/` when none does
pub fn mount_point_of(dir: &Path, mounts: &[PathBuf]) -> PathBuf {
    mounts
        .iter()
        .filter(|mount| dir.starts_with(mount))
        .max_by_key(|mount| mount.components().count())
        .cloned()
        .unwrap_or_else(|| PathBuf::from("/"))
}
