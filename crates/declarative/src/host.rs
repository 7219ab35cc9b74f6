//! Local host capabilities
//!
//! [`LocalHost`] bundles the implementations of the capability traits for
//! the machine the agent runs on. The OS family is detected once, when the
//! host is created.

use crate::context::{FileKind, FileMeta, Fetcher, Host, OsFamily, ProcessController, SystemProbe};
use crate::error::{Error, FailureCause, Result};
use crate::types::{CommandLine, CommandOutput, CommandSpec, shell_quote};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Maximum download size for remote content (256 MB).
const MAX_BODY_SIZE: u64 = 256 * 1024 * 1024;

/// How often a running command is polled for completion
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long a command gets to exit after SIGTERM before it is killed
const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Capabilities of the local machine
pub struct LocalHost {
    probe: LocalProbe,
    processes: LocalProcesses,
    fetcher: HttpFetcher,
}

impl LocalHost {
    pub fn new() -> Self {
        Self {
            probe: LocalProbe::new(),
            processes: LocalProcesses,
            fetcher: HttpFetcher::new(),
        }
    }

    /// Borrow the capability set
    pub fn host(&self) -> Host<'_> {
        Host {
            probe: &self.probe,
            processes: &self.processes,
            fetcher: &self.fetcher,
        }
    }
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Capabilities of the machine the agent runs on
pub fn local() -> LocalHost {
    LocalHost::new()
}

// ============================================================================
// Probe
// ============================================================================

/// [`SystemProbe`] backed by the local filesystem
pub struct LocalProbe {
    os_family: OsFamily,
}

impl LocalProbe {
    pub fn new() -> Self {
        let os_family = detect_os_family();
        log::debug!("detected OS family: {os_family}");
        Self { os_family }
    }
}

impl Default for LocalProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemProbe for LocalProbe {
    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::symlink_metadata(path)?;
        let file_type = meta.file_type();
        let kind = if file_type.is_symlink() {
            FileKind::Symlink
        } else if file_type.is_dir() {
            FileKind::Directory
        } else if file_type.is_file() {
            FileKind::File
        } else {
            FileKind::Other
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Ok(FileMeta {
                kind,
                mode: meta.mode() & 0o7777,
                uid: meta.uid(),
                gid: meta.gid(),
                len: meta.len(),
            })
        }

        #[cfg(not(unix))]
        Ok(FileMeta {
            kind,
            mode: 0,
            uid: 0,
            gid: 0,
            len: meta.len(),
        })
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn exit_code(&self, command: &str, timeout: Option<Duration>) -> io::Result<i32> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd.spawn()?;
        let status = match timeout {
            None => child.wait()?,
            Some(limit) => wait_with_deadline(&mut child, limit)?.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("`{command}` timed out after {}s", limit.as_secs_f32()),
                )
            })?,
        };
        Ok(status.code().unwrap_or(-1))
    }

    fn os_family(&self) -> OsFamily {
        self.os_family
    }

    fn user_id(&self, name: &str) -> Option<u32> {
        if let Ok(uid) = name.parse() {
            return Some(uid);
        }
        lookup_user(name)
    }

    fn group_id(&self, name: &str) -> Option<u32> {
        if let Ok(gid) = name.parse() {
            return Some(gid);
        }
        lookup_group(name)
    }
}

fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(line);
        cmd
    } else {
        let mut cmd = Command::new("/bin/sh");
        cmd.arg("-c").arg(line);
        cmd
    }
}

fn detect_os_family() -> OsFamily {
    if cfg!(windows) {
        return OsFamily::Windows;
    }
    if cfg!(target_os = "macos") {
        return OsFamily::Darwin;
    }
    match fs::read_to_string("/etc/os-release") {
        Ok(content) => os_family_from_release(&content),
        Err(_) => OsFamily::Other,
    }
}

/// Classify an `/etc/os-release` document by its `ID` and `ID_LIKE` fields
pub(crate) fn os_family_from_release(content: &str) -> OsFamily {
    let mut ids = Vec::new();
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=')
            && (key == "ID" || key == "ID_LIKE")
        {
            ids.extend(
                value
                    .trim_matches('"')
                    .split_whitespace()
                    .map(str::to_lowercase),
            );
        }
    }
    for id in &ids {
        match id.as_str() {
            "rhel" | "centos" | "fedora" | "rocky" | "almalinux" | "amzn" | "ol" => {
                return OsFamily::Redhat;
            }
            "debian" | "ubuntu" => return OsFamily::Debian,
            "suse" | "sles" | "opensuse" | "opensuse-leap" => return OsFamily::Suse,
            _ => {}
        }
    }
    OsFamily::Other
}

#[cfg(unix)]
fn lookup_user(name: &str) -> Option<u32> {
    let c_name = std::ffi::CString::new(name).ok()?;
    // SAFETY: getpwnam returns a pointer into static storage or null; the
    // uid is copied out before any other passwd call.
    unsafe {
        let entry = libc::getpwnam(c_name.as_ptr());
        if entry.is_null() {
            None
        } else {
            Some((*entry).pw_uid)
        }
    }
}

#[cfg(unix)]
fn lookup_group(name: &str) -> Option<u32> {
    let c_name = std::ffi::CString::new(name).ok()?;
    // SAFETY: see lookup_user
    unsafe {
        let entry = libc::getgrnam(c_name.as_ptr());
        if entry.is_null() {
            None
        } else {
            Some((*entry).gr_gid)
        }
    }
}

#[cfg(not(unix))]
fn lookup_user(_name: &str) -> Option<u32> {
    None
}

#[cfg(not(unix))]
fn lookup_group(_name: &str) -> Option<u32> {
    None
}

// ============================================================================
// Processes
// ============================================================================

/// [`ProcessController`] spawning local processes
pub struct LocalProcesses;

impl LocalProcesses {
    fn build(spec: &CommandSpec) -> std::result::Result<Command, FailureCause> {
        if let Some(user) = &spec.user
            && !is_current_user(user)
        {
            // `su` resets the environment, so exports travel inside the script
            let mut script = String::new();
            for (key, value) in &spec.environment {
                script.push_str(&format!("export {key}={} ; ", shell_quote(value)));
            }
            if !spec.path.is_empty() {
                script.push_str(&format!("export PATH={}:$PATH ; ", join_paths(&spec.path)));
            }
            if let Some(cwd) = &spec.cwd {
                script.push_str(&format!("cd {} && ", shell_quote(&cwd.to_string_lossy())));
            }
            script.push_str(&spec.line.to_shell());

            let mut cmd = Command::new("su");
            cmd.args([user.as_str(), "-s", "/bin/bash", "-c", &script]);
            return Ok(cmd);
        }

        let mut cmd = match &spec.line {
            CommandLine::Shell(line) => shell_command(line),
            CommandLine::Argv(argv) => {
                let (program, args) = argv.split_first().ok_or_else(|| FailureCause::MissingBinary {
                    program: String::new(),
                })?;
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
        };
        cmd.envs(&spec.environment);
        if !spec.path.is_empty() {
            let inherited = std::env::var("PATH").unwrap_or_default();
            cmd.env("PATH", format!("{}:{inherited}", join_paths(&spec.path)));
        }
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        Ok(cmd)
    }
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(unix)]
fn is_current_user(user: &str) -> bool {
    // SAFETY: geteuid has no preconditions
    let euid = unsafe { libc::geteuid() };
    match user.parse::<u32>() {
        Ok(uid) => uid == euid,
        Err(_) => lookup_user(user) == Some(euid),
    }
}

#[cfg(not(unix))]
fn is_current_user(_user: &str) -> bool {
    true
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        buf
    })
}

impl ProcessController for LocalProcesses {
    fn run(
        &self,
        spec: &CommandSpec,
        timeout: Option<Duration>,
    ) -> std::result::Result<CommandOutput, FailureCause> {
        let mut cmd = Self::build(spec)?;
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group, so a deadline can signal the whole pipeline
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let program = spec.line.program().to_string();
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                FailureCause::MissingBinary {
                    program: program.clone(),
                }
            } else {
                FailureCause::io(program.clone(), e)
            }
        })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match timeout {
            None => child.wait().map_err(|e| FailureCause::io(program.clone(), e))?,
            Some(limit) => match wait_with_deadline(&mut child, limit) {
                Ok(Some(status)) => status,
                Ok(None) => {
                    // Readers may be held open by orphaned grandchildren; leave them
                    log::warn!("`{}` timed out after {}s", spec.line, limit.as_secs_f32());
                    return Err(FailureCause::Timeout { after: limit });
                }
                Err(e) => return Err(FailureCause::io(program, e)),
            },
        };

        Ok(CommandOutput {
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
            code: status.code(),
        })
    }

    fn is_alive(&self, pid: u32) -> bool {
        process_alive(pid)
    }

    fn terminate(&self, pid: u32) -> io::Result<()> {
        send_terminate(pid as i32)
    }
}

/// Wait for the child until `limit`; on expiry terminate it and return `None`
fn wait_with_deadline(child: &mut Child, limit: Duration) -> io::Result<Option<ExitStatus>> {
    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if started.elapsed() >= limit {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    #[cfg(unix)]
    let _ = send_terminate(-(child.id() as i32));

    let grace_started = Instant::now();
    while grace_started.elapsed() < TERMINATE_GRACE {
        if child.try_wait()?.is_some() {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
    child.kill()?;
    child.wait()?;
    Ok(None)
}

#[cfg(unix)]
fn send_terminate(pid: i32) -> io::Result<()> {
    // SAFETY: kill has no memory-safety preconditions
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn send_terminate(_pid: i32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "signals not supported on this platform",
    ))
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let Ok(pid) = i32::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 only checks for existence
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

// ============================================================================
// Fetcher
// ============================================================================

/// [`Fetcher`] for `http(s)://` and `file://` URIs
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let failed = |message: String| Error::RemoteFetchFailed {
            uri: uri.to_string(),
            message,
        };

        if let Some(path) = uri.strip_prefix("file://") {
            return fs::read(path).map_err(|e| failed(e.to_string()));
        }

        log::info!("downloading {uri}");
        let mut response = self
            .agent
            .get(uri)
            .header("User-Agent", "cluster-agent")
            .call()
            .map_err(|e| match e {
                ureq::Error::StatusCode(code) => failed(format!("HTTP {code}")),
                other => failed(other.to_string()),
            })?;

        response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_to_vec()
            .map_err(|e| failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_family_from_release() {
        let centos = "NAME=\"CentOS Linux\"\nID=\"centos\"\nID_LIKE=\"rhel fedora\"\n";
        assert_eq!(os_family_from_release(centos), OsFamily::Redhat);

        let ubuntu = "NAME=\"Ubuntu\"\nID=ubuntu\nID_LIKE=debian\n";
        assert_eq!(os_family_from_release(ubuntu), OsFamily::Debian);

        let sles = "ID=\"sles\"\n";
        assert_eq!(os_family_from_release(sles), OsFamily::Suse);

        assert_eq!(os_family_from_release("ID=plan9\n"), OsFamily::Other);
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_metadata_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        fs::write(&file, b"abc").unwrap();
        let link = dir.path().join("l");
        std::os::unix::fs::symlink(&file, &link).unwrap();

        let probe = LocalProbe::new();
        assert_eq!(probe.metadata(dir.path()).unwrap().kind, FileKind::Directory);
        let meta = probe.metadata(&file).unwrap();
        assert_eq!(meta.kind, FileKind::File);
        assert_eq!(meta.len, 3);
        assert_eq!(probe.metadata(&link).unwrap().kind, FileKind::Symlink);
        assert!(!probe.exists(&dir.path().join("missing")));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_exit_code() {
        let probe = LocalProbe::new();
        assert_eq!(probe.exit_code("true", None).unwrap(), 0);
        assert_eq!(probe.exit_code("exit 3", None).unwrap(), 3);
        assert_eq!(probe.exit_code("exit 3", Some(Duration::from_secs(5))).unwrap(), 3);
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_exit_code_deadline() {
        let probe = LocalProbe::new();
        let started = Instant::now();
        let err = probe
            .exit_code("sleep 5", Some(Duration::from_millis(200)))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_numeric_ids() {
        let probe = LocalProbe::new();
        assert_eq!(probe.user_id("1234"), Some(1234));
        assert_eq!(probe.group_id("0"), Some(0));
        assert_eq!(probe.user_id("root"), Some(0));
        assert_eq!(probe.user_id("no-such-user-here"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_captures_output_and_code() {
        let spec = CommandSpec::shell("echo out; echo err 1>&2; exit 4").env("UNUSED", "1");
        let output = LocalProcesses.run(&spec, None).unwrap();
        assert_eq!(output.code, Some(4));
        assert_eq!(output.stdout_str(), "out\n");
        assert_eq!(output.stderr_str(), "err\n");
        assert_eq!(output.combined(), "out\nerr\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_environment_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::shell("echo \"$GREETING\"; pwd")
            .env("GREETING", "hello")
            .cwd(dir.path());
        let output = LocalProcesses.run(&spec, None).unwrap();
        let stdout = output.stdout_str();
        let mut lines = stdout.lines();
        assert_eq!(lines.next(), Some("hello"));
        let cwd = PathBuf::from(lines.next().unwrap());
        assert_eq!(cwd.canonicalize().unwrap(), dir.path().canonicalize().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_missing_binary() {
        let spec = CommandSpec::argv(["definitely-not-a-real-program-xyz"]);
        let err = LocalProcesses.run(&spec, None).unwrap_err();
        assert!(matches!(err, FailureCause::MissingBinary { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_timeout_terminates() {
        let spec = CommandSpec::shell("sleep 5");
        let started = Instant::now();
        let err = LocalProcesses
            .run(&spec, Some(Duration::from_millis(200)))
            .unwrap_err();
        assert!(matches!(err, FailureCause::Timeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_is_alive() {
        assert!(LocalProcesses.is_alive(std::process::id()));
        assert!(!LocalProcesses.is_alive(0));
    }

    #[test]
    fn test_fetch_file_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("driver.jar");
        fs::write(&path, b"jar bytes").unwrap();

        let fetcher = HttpFetcher::new();
        let bytes = fetcher.fetch(&format!("file://{}", path.display())).unwrap();
        assert_eq!(bytes, b"jar bytes");

        let err = fetcher
            .fetch(&format!("file://{}", dir.path().join("missing").display()))
            .unwrap_err();
        assert!(matches!(err, Error::RemoteFetchFailed { .. }));
    }
}
