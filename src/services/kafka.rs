//! Kafka broker

use super::{Component, Monitored, stale_pid_file};
use crate::config::ClusterConfig;
use anyhow::{Context, Result, bail};
use declarative::{
    Bindings, CdAccess, CommandSpec, ContentSource, ConvergencePlan, GuardExpr, ResourceDescriptor,
    ServiceAction, Template,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Directories the kafka launcher script writes to regardless of configuration
const MANAGED_PID_DIR: &str = "/var/run/kafka";
const MANAGED_LOG_DIR: &str = "/var/log/kafka";

/// First stack release whose brokers understand `listeners`
const LISTENERS_SINCE: &str = "2.3.0.0";

const TIMELINE_REPORTER: &str = "org.apache.hadoop.metrics2.sink.kafka.KafkaTimelineMetricsReporter";
const DEFAULT_COLLECTOR_PORT: &str = "6188";

const SERVER_JAAS: &str = r#"KafkaServer {
   com.sun.security.auth.module.Krb5LoginModule required
   useKeyTab=true
   keyTab="{{ kafka_keytab }}"
   storeKey=true
   useTicketCache=false
   serviceName="{{ kafka_service_name }}"
   principal="{{ kafka_principal }}";
};
Client {
   com.sun.security.auth.module.Krb5LoginModule required
   useKeyTab=true
   keyTab="{{ kafka_keytab }}"
   storeKey=true
   useTicketCache=false
   serviceName="zookeeper"
   principal="{{ kafka_principal }}";
};
"#;

const CLIENT_JAAS: &str = r#"KafkaClient {
   com.sun.security.auth.module.Krb5LoginModule required
   useTicketCache=true
   renewTicket=true
   serviceName="{{ kafka_service_name }}";
};
"#;

/// Keytab and principal used when brokers authenticate with Kerberos
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KafkaKerberos {
    pub keytab: String,
    /// Principal with `_HOST` already replaced by the hostname
    pub principal: String,
}

impl KafkaKerberos {
    /// Primary of the principal, e.g. `kafka` for `kafka/h1@REALM`
    pub fn service_name(&self) -> &str {
        self.principal
            .split(['/', '@'])
            .next()
            .unwrap_or(&self.principal)
    }
}

/// Kafka broker parameters, resolved once from the cluster configuration
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaBroker {
    pub kafka_user: String,
    pub user_group: String,
    pub hostname: String,
    pub log_dir: PathBuf,
    pub pid_dir: PathBuf,
    pub conf_dir: PathBuf,
    pub kafka_bin: String,
    pub java_home: String,
    /// `server.properties` content, broker id and listeners already set
    pub server_config: serde_json::Map<String, Value>,
    pub data_dirs: Vec<PathBuf>,
    pub env_template: String,
    pub log4j_props: Option<String>,
    pub kerberos: Option<KafkaKerberos>,
    pub managed_pid_dir: PathBuf,
    pub managed_log_dir: PathBuf,
}

impl KafkaBroker {
    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        config.require_all(&["kafka-broker", "kafka-env/content"])?;
        let hostname = config.hostname()?;

        let broker_hosts = config.list("clusterHostInfo/kafka_broker_hosts");
        let broker_id = broker_id(&broker_hosts, &hostname)?;

        let security_enabled = config.bool("cluster-env/security_enabled").unwrap_or(false);
        let kerberos_enabled = security_enabled
            && config.get_or("kafka-broker/security.inter.broker.protocol", "") == "PLAINTEXTSASL";

        let stack_version = config.get_or("hostLevelParams/stack_version", "");
        let has_listeners =
            !stack_version.is_empty() && compare_versions(&stack_version, LISTENERS_SINCE) != Ordering::Less;

        let collectors = config.list("clusterHostInfo/metrics_collector_hosts");
        let collector_port = config
            .get_or("ams-site/timeline.metrics.service.webapp.address", "")
            .rsplit_once(':')
            .map_or_else(|| DEFAULT_COLLECTOR_PORT.to_string(), |(_, port)| port.to_string());

        let mut server_config = config
            .section("kafka-broker")
            .cloned()
            .context("kafka-broker is not a configuration section")?;
        server_config.insert("broker.id".into(), Value::String(broker_id.to_string()));
        if has_listeners {
            rewrite_listeners(&mut server_config, &hostname, kerberos_enabled);
        } else {
            server_config.insert("host.name".into(), Value::String(hostname.clone()));
        }
        let reporters = if collectors.is_empty() { "" } else { TIMELINE_REPORTER };
        server_config.insert("kafka.metrics.reporters".into(), Value::String(reporters.into()));
        if let Some(collector) = collectors.first() {
            server_config.insert("kafka.timeline.metrics.host".into(), Value::String(collector.clone()));
            server_config.insert("kafka.timeline.metrics.port".into(), Value::String(collector_port));
        }

        let data_dirs = server_config
            .get("log.dirs")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from)
            .collect();

        let kerberos = kerberos_enabled.then(|| KafkaKerberos {
            keytab: config.get_or("kafka-env/kafka_keytab", "/etc/security/keytabs/kafka.service.keytab"),
            principal: config
                .get_or("kafka-env/kafka_principal_name", "kafka/_HOST")
                .replace("_HOST", &hostname.to_lowercase()),
        });

        Ok(Self {
            kafka_user: config.get_or("kafka-env/kafka_user", "kafka"),
            user_group: config.get_or("cluster-env/user_group", "hadoop"),
            log_dir: PathBuf::from(config.get_or("kafka-env/kafka_log_dir", MANAGED_LOG_DIR)),
            pid_dir: PathBuf::from(config.get_or("kafka-env/kafka_pid_dir", MANAGED_PID_DIR)),
            conf_dir: PathBuf::from(config.get_or("kafka-env/conf_dir", "/etc/kafka/conf")),
            kafka_bin: config.get_or("kafka-env/kafka_bin", "/usr/lib/kafka/bin/kafka"),
            java_home: config.get_or("hostLevelParams/java_home", "/usr/jdk64/jdk1.8.0_40"),
            server_config,
            data_dirs,
            env_template: config.require_str("kafka-env/content")?,
            log4j_props: config.str("kafka-log4j/content"),
            kerberos,
            managed_pid_dir: PathBuf::from(MANAGED_PID_DIR),
            managed_log_dir: PathBuf::from(MANAGED_LOG_DIR),
            hostname,
        })
    }

    /// Names available to the `kafka-env` template, as the stock content
    /// refers to them
    fn env_bindings(&self) -> Bindings {
        let kerberos_params = match &self.kerberos {
            Some(_) => format!(
                "-Djava.security.auth.login.config={}",
                self.conf_dir.join("kafka_jaas.conf").display()
            ),
            None => String::new(),
        };
        let mut bindings: Bindings = [
            ("kafka_user", self.kafka_user.clone()),
            ("user_group", self.user_group.clone()),
            ("kafka_log_dir", self.log_dir.display().to_string()),
            ("kafka_pid_dir", self.pid_dir.display().to_string()),
            ("conf_dir", self.conf_dir.display().to_string()),
            ("kafka_bin", self.kafka_bin.clone()),
            ("hostname", self.hostname.clone()),
            ("java64_home", self.java_home.clone()),
            ("kafka_kerberos_params", kerberos_params),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value)))
        .collect();

        if let Some(kerberos) = &self.kerberos {
            for (key, value) in [
                ("kafka_keytab_path", kerberos.keytab.as_str()),
                ("kafka_jaas_principal", kerberos.principal.as_str()),
                ("kafka_bare_jaas_principal", kerberos.service_name()),
            ] {
                bindings.insert(key.to_string(), Value::String(value.to_string()));
            }
        }
        bindings
    }

    fn owned_dir(&self, path: &Path) -> ResourceDescriptor {
        ResourceDescriptor::directory(path)
            .owner(&self.kafka_user)
            .group(&self.user_group)
            .mode(0o755)
            .cd_access(CdAccess::All)
            .recursive(true)
    }

    fn owned_file(&self, name: &str) -> ResourceDescriptor {
        ResourceDescriptor::file(self.conf_dir.join(name))
            .owner(&self.kafka_user)
            .group(&self.user_group)
    }

    /// Point a launcher-managed directory at the configured one
    ///
    /// When both are the same path, a leftover link is replaced by a real
    /// directory. Otherwise existing contents are copied over before the
    /// directory is turned into a link.
    fn managed_dir(&self, plan: &mut ConvergencePlan, managed: &Path, configured: &Path) {
        if managed == configured {
            plan.push(
                ResourceDescriptor::symlink(managed, configured)
                    .absent()
                    .only_if(GuardExpr::is_symlink(managed)),
            )
            .push(self.owned_dir(managed));
            return;
        }

        plan.push(
            ResourceDescriptor::command(CommandSpec::argv([
                "cp".to_string(),
                "-a".to_string(),
                format!("{}/.", managed.display()),
                format!("{}/", configured.display()),
            ]))
            .only_if(GuardExpr::is_directory(managed)),
        )
        .push(ResourceDescriptor::symlink(managed, configured).force());
    }

    fn daemon(&self, action: &str) -> CommandSpec {
        CommandSpec::bash(format!(
            "source {}/kafka-env.sh ; {} {action}",
            self.conf_dir.display(),
            self.kafka_bin
        ))
        .user(&self.kafka_user)
    }
}

impl Monitored for KafkaBroker {
    fn name(&self) -> &'static str {
        "kafka"
    }

    fn pid_file(&self) -> PathBuf {
        self.pid_dir.join("kafka.pid")
    }
}

impl Component for KafkaBroker {
    fn configure(&self) -> ConvergencePlan {
        let mut plan = ConvergencePlan::new();
        for dir in [&self.log_dir, &self.pid_dir, &self.conf_dir] {
            plan.push(self.owned_dir(dir));
        }
        for dir in &self.data_dirs {
            plan.push(self.owned_dir(dir));
        }

        let server_properties: Bindings = self
            .server_config
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        plan.push(
            self.owned_file("server.properties")
                .content(ContentSource::template(Template::Properties, server_properties)),
        )
        .push(
            ResourceDescriptor::file(self.conf_dir.join("kafka-env.sh"))
                .owner(&self.kafka_user)
                .content(ContentSource::template(
                    Template::text(&self.env_template),
                    self.env_bindings(),
                )),
        );

        if let Some(log4j) = &self.log4j_props {
            plan.push(
                self.owned_file("log4j.properties")
                    .mode(0o644)
                    .content(ContentSource::text(log4j)),
            );
        }

        if let Some(kerberos) = &self.kerberos {
            let bindings: Bindings = [
                ("kafka_keytab", kerberos.keytab.as_str()),
                ("kafka_principal", kerberos.principal.as_str()),
                ("kafka_service_name", kerberos.service_name()),
            ]
            .into_iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
            for (name, source) in [("kafka_jaas.conf", SERVER_JAAS), ("kafka_client_jaas.conf", CLIENT_JAAS)] {
                plan.push(
                    ResourceDescriptor::file(self.conf_dir.join(name))
                        .owner(&self.kafka_user)
                        .content(ContentSource::template(Template::text(source), bindings.clone())),
                );
            }
        }

        self.managed_dir(&mut plan, &self.managed_pid_dir, &self.pid_dir);
        self.managed_dir(&mut plan, &self.managed_log_dir, &self.log_dir);
        plan
    }

    fn start(&self) -> ConvergencePlan {
        let mut plan = self.configure();
        plan.push(stale_pid_file(&self.pid_file())).push(
            ResourceDescriptor::service("kafka", self.pid_file(), ServiceAction::Start)
                .start_with(self.daemon("start")),
        );
        plan
    }

    fn stop(&self) -> ConvergencePlan {
        let mut plan = ConvergencePlan::new();
        plan.push(
            ResourceDescriptor::service("kafka", self.pid_file(), ServiceAction::Stop)
                .stop_with(self.daemon("stop")),
        );
        plan
    }
}

/// Position of `hostname` among the sorted broker hosts
fn broker_id(hosts: &[String], hostname: &str) -> Result<usize> {
    let mut sorted: Vec<&str> = hosts.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    match sorted.iter().position(|h| *h == hostname) {
        Some(id) => Ok(id),
        None => bail!("{hostname} is not listed in clusterHostInfo/kafka_broker_hosts"),
    }
}

/// Point listeners at this host, switching to SASL under Kerberos
fn rewrite_listeners(server: &mut serde_json::Map<String, Value>, hostname: &str, kerberos: bool) {
    let listeners = server
        .get("listeners")
        .and_then(Value::as_str)
        .unwrap_or("PLAINTEXT://localhost:6667")
        .replace("localhost", hostname);

    if kerberos {
        let listeners = listeners.replace("PLAINTEXT", "PLAINTEXTSASL");
        server.insert("listeners".into(), Value::String(listeners.clone()));
        server.insert("advertised.listeners".into(), Value::String(listeners));
        return;
    }

    server.insert("listeners".into(), Value::String(listeners));
    if let Some(advertised) = server.get("advertised.listeners").and_then(Value::as_str) {
        let advertised = advertised.replace("localhost", hostname);
        server.insert("advertised.listeners".into(), Value::String(advertised));
    }
}

/// Compare dotted versions numerically; missing parts count as zero
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| {
                part.chars()
                    .take_while(char::is_ascii_digit)
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let (a, b) = (parse(a), parse(b));
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| a.get(i).unwrap_or(&0).cmp(b.get(i).unwrap_or(&0)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}
