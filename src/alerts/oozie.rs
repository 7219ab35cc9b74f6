//! Oozie server health check
//!
//! Runs `oozie admin -status` against the server URL, after obtaining a
//! Kerberos ticket for the smoke user when security is enabled. What differs
//! between operating systems (token set, HTTPS port syntax in `oozie-env`,
//! loopback address, the command itself) lives behind [`CheckCommand`].

use super::{AlertCheck, AlertOutcome, Configurations, Parameters};
use declarative::{CommandSpec, Error, Host, OsFamily};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use ureq::http::Uri;

const OOZIE_URL_KEY: &str = "{{oozie-site/oozie.base.url}}";
const SECURITY_ENABLED_KEY: &str = "{{cluster-env/security_enabled}}";
const SMOKEUSER_PRINCIPAL_KEY: &str = "{{cluster-env/smokeuser_principal_name}}";
const SMOKEUSER_KEYTAB_KEY: &str = "{{cluster-env/smokeuser_keytab}}";
const KERBEROS_EXECUTABLE_SEARCH_PATHS_KEY: &str = "{{kerberos-env/executable_search_paths}}";
const SMOKEUSER_KEY: &str = "{{cluster-env/smokeuser}}";
const OOZIE_HTTPS_PORT_KEY: &str = "{{oozie-site/oozie.https.port}}";
const OOZIE_ENV_CONTENT_KEY: &str = "{{oozie-env/content}}";

const SMOKEUSER_KEYTAB_PARAM: &str = "default.smoke.keytab";
const SMOKEUSER_KEYTAB_DEFAULT: &str = "/etc/security/keytabs/smokeuser.headless.keytab";
const SMOKEUSER_PRINCIPAL_PARAM: &str = "default.smoke.principal";
const SMOKEUSER_PRINCIPAL_DEFAULT: &str = "ambari-qa@EXAMPLE.COM";
const SMOKEUSER_DEFAULT: &str = "ambari-qa";

const OOZIE_CONF_DIR: &str = "/usr/hdp/current/oozie-server/conf";
const OOZIE_CONF_DIR_LEGACY: &str = "/etc/oozie/conf";

/// Where kinit and klist are looked for after the configured search paths
const KERBEROS_STANDARD_PATHS: &[&str] = &[
    "/usr/bin",
    "/usr/kerberos/bin",
    "/usr/sbin",
    "/usr/lib/mit/bin",
    "/usr/lib/mit/sbin",
];

/// Deadline for every command the check runs
const COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// OS-specific parts of the check
trait CheckCommand {
    fn tokens(&self) -> Vec<&'static str>;

    /// Pattern matching the HTTPS port line of `oozie-env`
    fn https_port_pattern(&self) -> &'static str;

    /// Host substituted into plain-HTTP URLs
    fn local_address(&self) -> &'static str;

    /// Build the status command, authenticating first when needed
    fn command(
        &self,
        url: &str,
        configurations: &Configurations,
        parameters: &Parameters,
        host: Host<'_>,
    ) -> declarative::Result<CommandSpec>;
}

struct UnixCommand {
    tmp_dir: PathBuf,
    pid: u32,
}

impl CheckCommand for UnixCommand {
    fn tokens(&self) -> Vec<&'static str> {
        vec![
            OOZIE_URL_KEY,
            SMOKEUSER_PRINCIPAL_KEY,
            SECURITY_ENABLED_KEY,
            SMOKEUSER_KEYTAB_KEY,
            KERBEROS_EXECUTABLE_SEARCH_PATHS_KEY,
            SMOKEUSER_KEY,
            OOZIE_HTTPS_PORT_KEY,
            OOZIE_ENV_CONTENT_KEY,
        ]
    }

    fn https_port_pattern(&self) -> &'static str {
        r"^export\s+OOZIE_HTTPS_PORT=(\d+)"
    }

    fn local_address(&self) -> &'static str {
        "0.0.0.0"
    }

    fn command(
        &self,
        url: &str,
        configurations: &Configurations,
        parameters: &Parameters,
        host: Host<'_>,
    ) -> declarative::Result<CommandSpec> {
        let smokeuser = lookup(configurations, SMOKEUSER_KEY).unwrap_or(SMOKEUSER_DEFAULT);
        let security_enabled = lookup(configurations, SECURITY_ENABLED_KEY)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let mut environment = BTreeMap::new();
        if security_enabled {
            // configurations take precedence over script parameters
            let principal = lookup(configurations, SMOKEUSER_PRINCIPAL_KEY)
                .or_else(|| parameters.get(SMOKEUSER_PRINCIPAL_PARAM).map(String::as_str))
                .unwrap_or(SMOKEUSER_PRINCIPAL_DEFAULT);
            let keytab = lookup(configurations, SMOKEUSER_KEYTAB_KEY)
                .or_else(|| parameters.get(SMOKEUSER_KEYTAB_PARAM).map(String::as_str))
                .unwrap_or(SMOKEUSER_KEYTAB_DEFAULT);

            let ccache = self
                .tmp_dir
                .join(format!("oozie_alert_cc_{}", self.pid))
                .display()
                .to_string();
            environment.insert("KRB5CCNAME".to_string(), ccache.clone());

            let search_paths: Vec<&str> = lookup(configurations, KERBEROS_EXECUTABLE_SEARCH_PATHS_KEY)
                .map(|paths| paths.split(',').map(str::trim).filter(|p| !p.is_empty()).collect())
                .unwrap_or_default();

            // a cache holding unexpired tickets makes kinit unnecessary
            let klist = CommandSpec::argv([
                find_tool("klist", &search_paths, host),
                "-s".to_string(),
                ccache,
            ])
            .user(smokeuser);
            let cached = host
                .processes
                .run(&klist, Some(COMMAND_TIMEOUT))
                .is_ok_and(|out| out.success());

            if !cached {
                log::debug!("no valid ticket cache, running kinit for {principal}");
                let kinit = CommandSpec::argv([
                    find_tool("kinit", &search_paths, host),
                    "-l".to_string(),
                    "5m".to_string(),
                    "-kt".to_string(),
                    keytab.to_string(),
                    principal.to_string(),
                ])
                .envs(&environment)
                .user(smokeuser);
                match host.processes.run(&kinit, Some(COMMAND_TIMEOUT)) {
                    Ok(out) if out.success() => {}
                    Ok(out) => {
                        return Err(Error::AuthenticationFailed {
                            message: format!(
                                "kinit for {principal} returned {}. {}",
                                out.code.unwrap_or(-1),
                                out.combined().trim()
                            ),
                        });
                    }
                    Err(cause) => {
                        return Err(Error::AuthenticationFailed {
                            message: format!("kinit for {principal} failed: {cause}"),
                        });
                    }
                }
            }
        }

        let conf_dir = if host.probe.exists(Path::new(OOZIE_CONF_DIR)) {
            OOZIE_CONF_DIR
        } else {
            OOZIE_CONF_DIR_LEGACY
        };
        Ok(CommandSpec::bash(format!(
            "source {conf_dir}/oozie-env.sh ; oozie admin -oozie {url} -status"
        ))
        .envs(&environment)
        .user(smokeuser))
    }
}

struct WindowsCommand {
    oozie_home: Option<String>,
}

impl CheckCommand for WindowsCommand {
    fn tokens(&self) -> Vec<&'static str> {
        vec![OOZIE_URL_KEY]
    }

    fn https_port_pattern(&self) -> &'static str {
        r"^set\s+OOZIE_HTTPS_PORT=(\d+)"
    }

    fn local_address(&self) -> &'static str {
        "localhost"
    }

    fn command(
        &self,
        url: &str,
        _configurations: &Configurations,
        _parameters: &Parameters,
        _host: Host<'_>,
    ) -> declarative::Result<CommandSpec> {
        let home = self
            .oozie_home
            .as_deref()
            .ok_or_else(|| Error::ConfigurationMissing {
                key: "OOZIE_HOME".to_string(),
            })?;
        let oozie_cmd = format!("{}\\bin\\oozie.cmd", home.trim_end_matches('\\'));
        Ok(CommandSpec::shell(format!(
            "cmd /c {oozie_cmd} admin -oozie {url} -status"
        )))
    }
}

fn strategy_for(family: OsFamily, tmp_dir: PathBuf) -> Box<dyn CheckCommand> {
    if family.is_windows() {
        Box::new(WindowsCommand {
            oozie_home: std::env::var("OOZIE_HOME").ok(),
        })
    } else {
        Box::new(UnixCommand {
            tmp_dir,
            pid: std::process::id(),
        })
    }
}

/// Checks that the Oozie server answers `oozie admin -status`
pub struct OozieServerCheck<'a> {
    host: Host<'a>,
    strategy: Box<dyn CheckCommand>,
}

impl<'a> OozieServerCheck<'a> {
    /// Check for the given host; Kerberos credential caches go to `tmp_dir`
    pub fn new(host: Host<'a>, tmp_dir: impl Into<PathBuf>) -> Self {
        let strategy = strategy_for(host.probe.os_family(), tmp_dir.into());
        Self { host, strategy }
    }

    fn https_port(&self, configurations: &Configurations) -> Option<String> {
        let from_env = lookup(configurations, OOZIE_ENV_CONTENT_KEY).and_then(|content| {
            let pattern = Regex::new(self.strategy.https_port_pattern()).ok()?;
            content
                .lines()
                .filter_map(|line| pattern.captures(line))
                .filter_map(|caps| caps.get(1))
                .last()
                .map(|m| m.as_str().to_string())
        });
        from_env.or_else(|| lookup(configurations, OOZIE_HTTPS_PORT_KEY).map(String::from))
    }
}

impl AlertCheck for OozieServerCheck<'_> {
    fn tokens(&self) -> Vec<&'static str> {
        self.strategy.tokens()
    }

    fn execute(
        &self,
        configurations: Option<&Configurations>,
        parameters: &Parameters,
        host_name: &str,
    ) -> AlertOutcome {
        let Some(configurations) = configurations else {
            return AlertOutcome::unknown("There were no configurations supplied to the script.");
        };
        let Some(url) = lookup(configurations, OOZIE_URL_KEY) else {
            return AlertOutcome::unknown("The Oozie URL is a required parameter.");
        };

        let https_port = self.https_port(configurations);
        let url = match rewrite_url(url, https_port.as_deref(), self.strategy.local_address()) {
            Ok(url) => url,
            Err(message) => return AlertOutcome::unknown(message),
        };
        log::debug!("checking oozie server at {url} from {host_name}");

        let command = match self.strategy.command(&url, configurations, parameters, self.host) {
            Ok(command) => command,
            Err(e @ Error::AuthenticationFailed { .. }) => return AlertOutcome::critical(e.to_string()),
            Err(e) => return AlertOutcome::unknown(e.to_string()),
        };

        match self.host.processes.run(&command, Some(COMMAND_TIMEOUT)) {
            Ok(output) if output.success() => {
                AlertOutcome::ok(format!("Successful connection to {url}"))
            }
            Ok(output) => AlertOutcome::critical(format!(
                "Execution of '{}' returned {}. {}",
                command.line,
                output.code.unwrap_or(-1),
                output.combined().trim()
            )),
            Err(cause) => AlertOutcome::critical(cause.to_string()),
        }
    }
}

/// Point the URL at the right endpoint
///
/// With an HTTPS port the scheme becomes `https` and an explicit port is
/// replaced; a URL without a port keeps its authority. Without an HTTPS port
/// the host becomes `local_address`.
fn rewrite_url(url: &str, https_port: Option<&str>, local_address: &str) -> Result<String, String> {
    let invalid = || format!("Unable to parse the Oozie URL {url}");
    let uri: Uri = url.parse().map_err(|_| invalid())?;
    let scheme = uri.scheme_str().ok_or_else(invalid)?;
    let authority = uri.authority().ok_or_else(invalid)?;

    let start = url.find(authority.as_str()).ok_or_else(invalid)?;
    let rest = &url[start + authority.as_str().len()..];
    let userinfo = authority
        .as_str()
        .rsplit_once('@')
        .map(|(info, _)| format!("{info}@"))
        .unwrap_or_default();

    let (scheme, host, port) = match https_port {
        Some(https_port) => (
            "https",
            authority.host(),
            authority.port_u16().map(|_| https_port.to_string()),
        ),
        None => (
            scheme,
            local_address,
            authority.port_u16().map(|p| p.to_string()),
        ),
    };
    let port = port.map(|p| format!(":{p}")).unwrap_or_default();
    Ok(format!("{scheme}://{userinfo}{host}{port}{rest}"))
}

fn lookup<'c>(configurations: &'c Configurations, token: &str) -> Option<&'c str> {
    configurations
        .get(super::token_key(token))
        .map(String::as_str)
}

/// First existing `dir/name` in the search paths, else the bare name
fn find_tool(name: &str, search_paths: &[&str], host: Host<'_>) -> String {
    search_paths
        .iter()
        .copied()
        .chain(KERBEROS_STANDARD_PATHS.iter().copied())
        .map(|dir| Path::new(dir).join(name))
        .find(|candidate| host.probe.exists(candidate))
        .map_or_else(|| name.to_string(), |p| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertStatus;
    use declarative::host::HttpFetcher;
    use declarative::{CommandLine, CommandOutput, FailureCause, FileKind, FileMeta, ProcessController, SystemProbe};
    use std::cell::RefCell;
    use std::collections::{HashSet, VecDeque};
    use std::io;

    struct FakeProbe {
        family: OsFamily,
        paths: HashSet<PathBuf>,
    }

    impl FakeProbe {
        fn new(family: OsFamily, paths: &[&str]) -> Self {
            Self {
                family,
                paths: paths.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl SystemProbe for FakeProbe {
        fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
            if self.paths.contains(path) {
                Ok(FileMeta {
                    kind: FileKind::File,
                    mode: 0o755,
                    uid: 0,
                    gid: 0,
                    len: 0,
                })
            } else {
                Err(io::Error::from(io::ErrorKind::NotFound))
            }
        }

        fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }

        fn read_link(&self, _path: &Path) -> io::Result<PathBuf> {
            Err(io::Error::from(io::ErrorKind::NotFound))
        }

        fn exit_code(&self, _command: &str, _timeout: Option<Duration>) -> io::Result<i32> {
            Ok(0)
        }

        fn os_family(&self) -> OsFamily {
            self.family
        }

        fn user_id(&self, _name: &str) -> Option<u32> {
            None
        }

        fn group_id(&self, _name: &str) -> Option<u32> {
            None
        }
    }

    /// Answers commands from a script, in order; exit 0 once the script runs out
    #[derive(Default)]
    struct ScriptedProcesses {
        exits: RefCell<VecDeque<i32>>,
        ran: RefCell<Vec<CommandSpec>>,
    }

    impl ScriptedProcesses {
        fn with_exits(exits: &[i32]) -> Self {
            Self {
                exits: RefCell::new(exits.iter().copied().collect()),
                ..Default::default()
            }
        }

        fn lines(&self) -> Vec<String> {
            self.ran.borrow().iter().map(|s| s.line.to_shell()).collect()
        }
    }

    impl ProcessController for ScriptedProcesses {
        fn run(
            &self,
            spec: &CommandSpec,
            _timeout: Option<Duration>,
        ) -> Result<CommandOutput, FailureCause> {
            self.ran.borrow_mut().push(spec.clone());
            let code = self.exits.borrow_mut().pop_front().unwrap_or(0);
            Ok(CommandOutput {
                stdout: Vec::new(),
                stderr: if code == 0 { Vec::new() } else { b"connection refused".to_vec() },
                code: Some(code),
            })
        }

        fn is_alive(&self, _pid: u32) -> bool {
            false
        }

        fn terminate(&self, _pid: u32) -> io::Result<()> {
            Ok(())
        }
    }

    fn configurations(pairs: &[(&str, &str)]) -> Configurations {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn check<'a>(probe: &'a FakeProbe, processes: &'a ScriptedProcesses, fetcher: &'a HttpFetcher) -> OozieServerCheck<'a> {
        let host = Host {
            probe,
            processes,
            fetcher,
        };
        OozieServerCheck {
            host,
            strategy: Box::new(UnixCommand {
                tmp_dir: PathBuf::from("/var/lib/agent/tmp"),
                pid: 4242,
            }),
        }
    }

    const PLAIN_URL: (&str, &str) = ("oozie-site/oozie.base.url", "http://c6401.example.com:11000/oozie");

    #[test]
    fn test_missing_configurations_and_url() {
        let probe = FakeProbe::new(OsFamily::Redhat, &[]);
        let processes = ScriptedProcesses::default();
        let fetcher = HttpFetcher::new();
        let check = check(&probe, &processes, &fetcher);

        let outcome = check.execute(None, &Parameters::new(), "c6401");
        assert_eq!(outcome.status, AlertStatus::Unknown);
        assert_eq!(outcome.messages, vec!["There were no configurations supplied to the script."]);

        let outcome = check.execute(Some(&configurations(&[])), &Parameters::new(), "c6401");
        assert_eq!(outcome.status, AlertStatus::Unknown);
        assert_eq!(outcome.messages, vec!["The Oozie URL is a required parameter."]);
        assert!(processes.ran.borrow().is_empty());
    }

    #[test]
    fn test_plain_http_without_security() {
        let probe = FakeProbe::new(OsFamily::Redhat, &[]);
        let processes = ScriptedProcesses::default();
        let fetcher = HttpFetcher::new();
        let check = check(&probe, &processes, &fetcher);

        let conf = configurations(&[PLAIN_URL, ("cluster-env/security_enabled", "false")]);
        let outcome = check.execute(Some(&conf), &Parameters::new(), "c6401");

        assert_eq!(outcome.status, AlertStatus::Ok);
        assert_eq!(
            outcome.messages,
            vec!["Successful connection to http://0.0.0.0:11000/oozie"]
        );

        let ran = processes.ran.borrow();
        assert_eq!(ran.len(), 1);
        assert_eq!(
            ran[0].line,
            CommandLine::Argv(vec![
                "/bin/bash".to_string(),
                "-c".to_string(),
                "source /etc/oozie/conf/oozie-env.sh ; oozie admin -oozie http://0.0.0.0:11000/oozie -status"
                    .to_string(),
            ])
        );
        assert_eq!(ran[0].user.as_deref(), Some("ambari-qa"));
        assert!(ran[0].environment.is_empty());
    }

    #[test]
    fn test_nonzero_exit_is_critical() {
        let probe = FakeProbe::new(OsFamily::Redhat, &[OOZIE_CONF_DIR]);
        let processes = ScriptedProcesses::with_exits(&[1]);
        let fetcher = HttpFetcher::new();
        let check = check(&probe, &processes, &fetcher);

        let conf = configurations(&[PLAIN_URL, ("cluster-env/smokeuser", "smoke")]);
        let outcome = check.execute(Some(&conf), &Parameters::new(), "c6401");

        assert_eq!(outcome.status, AlertStatus::Critical);
        assert!(outcome.messages[0].contains("returned 1"));
        assert!(outcome.messages[0].contains("connection refused"));
        assert!(processes.lines()[0].contains("source /usr/hdp/current/oozie-server/conf/oozie-env.sh"));
        assert_eq!(processes.ran.borrow()[0].user.as_deref(), Some("smoke"));
    }

    #[test]
    fn test_https_port_from_env_content_wins() {
        let probe = FakeProbe::new(OsFamily::Redhat, &[]);
        let fetcher = HttpFetcher::new();
        let processes = ScriptedProcesses::default();
        let check = check(&probe, &processes, &fetcher);

        let content = "export OOZIE_HTTPS_PORT=11443\n# comment\nexport OOZIE_HTTPS_PORT=11444\n";
        let conf = configurations(&[
            PLAIN_URL,
            ("oozie-env/content", content),
            ("oozie-site/oozie.https.port", "9999"),
        ]);
        let outcome = check.execute(Some(&conf), &Parameters::new(), "c6401");
        assert_eq!(
            outcome.messages,
            vec!["Successful connection to https://c6401.example.com:11444/oozie"]
        );
    }

    #[test]
    fn test_rewrite_url() {
        assert_eq!(
            rewrite_url("http://c6401:11000/oozie", Some("11443"), "0.0.0.0").unwrap(),
            "https://c6401:11443/oozie"
        );
        // no explicit port: only the scheme changes
        assert_eq!(
            rewrite_url("http://c6401/oozie", Some("11443"), "0.0.0.0").unwrap(),
            "https://c6401/oozie"
        );
        assert_eq!(
            rewrite_url("http://c6401:11000/oozie?x=1", None, "localhost").unwrap(),
            "http://localhost:11000/oozie?x=1"
        );
        assert!(rewrite_url("not a url", None, "0.0.0.0").is_err());
    }

    #[test]
    fn test_kerberos_kinit_when_cache_is_stale() {
        let probe = FakeProbe::new(OsFamily::Redhat, &["/opt/krb5/bin/kinit"]);
        // klist -s fails, kinit succeeds, status succeeds
        let processes = ScriptedProcesses::with_exits(&[1, 0, 0]);
        let fetcher = HttpFetcher::new();
        let check = check(&probe, &processes, &fetcher);

        let conf = configurations(&[
            PLAIN_URL,
            ("cluster-env/security_enabled", "TRUE"),
            ("cluster-env/smokeuser_keytab", "/etc/keytabs/smoke.keytab"),
            ("kerberos-env/executable_search_paths", "/opt/krb5/bin, /usr/local/bin"),
        ]);
        let mut params = Parameters::new();
        params.insert("default.smoke.principal".into(), "smoke@REALM".into());
        params.insert("default.smoke.keytab".into(), "/ignored.keytab".into());

        let outcome = check.execute(Some(&conf), &params, "c6401");
        assert_eq!(outcome.status, AlertStatus::Ok);

        assert_eq!(
            processes.lines(),
            vec![
                "klist -s /var/lib/agent/tmp/oozie_alert_cc_4242".to_string(),
                "/opt/krb5/bin/kinit -l 5m -kt /etc/keytabs/smoke.keytab smoke@REALM".to_string(),
                "/bin/bash -c 'source /etc/oozie/conf/oozie-env.sh ; oozie admin -oozie http://0.0.0.0:11000/oozie -status'"
                    .to_string(),
            ]
        );
        let ran = processes.ran.borrow();
        let ccache = Some("/var/lib/agent/tmp/oozie_alert_cc_4242");
        assert_eq!(ran[1].environment.get("KRB5CCNAME").map(String::as_str), ccache);
        assert_eq!(ran[2].environment.get("KRB5CCNAME").map(String::as_str), ccache);
    }

    #[test]
    fn test_valid_cache_skips_kinit() {
        let probe = FakeProbe::new(OsFamily::Redhat, &[]);
        let processes = ScriptedProcesses::default();
        let fetcher = HttpFetcher::new();
        let check = check(&probe, &processes, &fetcher);

        let conf = configurations(&[PLAIN_URL, ("cluster-env/security_enabled", "true")]);
        assert_eq!(check.execute(Some(&conf), &Parameters::new(), "h").status, AlertStatus::Ok);
        assert_eq!(processes.ran.borrow().len(), 2);
        assert!(processes.lines()[0].starts_with("klist -s "));
    }

    #[test]
    fn test_kinit_failure_is_critical() {
        let probe = FakeProbe::new(OsFamily::Redhat, &[]);
        let processes = ScriptedProcesses::with_exits(&[1, 1]);
        let fetcher = HttpFetcher::new();
        let check = check(&probe, &processes, &fetcher);

        let conf = configurations(&[PLAIN_URL, ("cluster-env/security_enabled", "True")]);
        let outcome = check.execute(Some(&conf), &Parameters::new(), "h");
        assert_eq!(outcome.status, AlertStatus::Critical);
        assert!(outcome.messages[0].contains("ambari-qa@EXAMPLE.COM"));
        // the status command never ran
        assert_eq!(processes.ran.borrow().len(), 2);
    }

    #[test]
    fn test_windows_strategy() {
        let probe = FakeProbe::new(OsFamily::Windows, &[]);
        let processes = ScriptedProcesses::default();
        let fetcher = HttpFetcher::new();
        let host = Host {
            probe: &probe,
            processes: &processes,
            fetcher: &fetcher,
        };
        let mut check = OozieServerCheck {
            host,
            strategy: Box::new(WindowsCommand {
                oozie_home: Some("C:\\hdp\\oozie".to_string()),
            }),
        };
        assert_eq!(check.tokens(), vec![OOZIE_URL_KEY]);

        let conf = configurations(&[PLAIN_URL]);
        let outcome = check.execute(Some(&conf), &Parameters::new(), "h");
        assert_eq!(outcome.status, AlertStatus::Ok);
        assert_eq!(
            processes.lines(),
            vec!["cmd /c C:\\hdp\\oozie\\bin\\oozie.cmd admin -oozie http://localhost:11000/oozie -status".to_string()]
        );

        check.strategy = Box::new(WindowsCommand { oozie_home: None });
        let outcome = check.execute(Some(&conf), &Parameters::new(), "h");
        assert_eq!(outcome.status, AlertStatus::Unknown);
    }

    #[test]
    fn test_strategy_follows_os_family() {
        let processes = ScriptedProcesses::default();
        let fetcher = HttpFetcher::new();

        let probe = FakeProbe::new(OsFamily::Debian, &[]);
        let host = Host {
            probe: &probe,
            processes: &processes,
            fetcher: &fetcher,
        };
        assert_eq!(OozieServerCheck::new(host, "/tmp").tokens().len(), 8);
    }
}
