//! Collector configuration
//!
//! Handles:
//! - Host inventory (order drives output order)
//! - SSH transport settings (password only from the environment)
//! - PTP retrieval and recency window
//! - Event log location and cap
//! - Server scan targets

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable pointing at the TOML config file
pub const CONFIG_PATH_ENV: &str = "EXPECA_COLLECTOR_CONFIG";
/// Environment variable carrying the SSH password (never read from the file)
pub const SSH_PASSWORD_ENV: &str = "EXPECA_SSH_PASSWORD";

const DEFAULT_CONFIG_FILE: &str = "collector.toml";

/// Trailing window used to decide whether a syslog sample is still current.
///
/// The deployed collector filtered with 365 seconds while its note said
/// "only use logs from within last 6 minutes". Kept at the deployed value;
/// set `ptp.recency_window_secs` to change it.
pub const DEFAULT_RECENCY_WINDOW_SECS: u64 = 365;

/// Number of syslog lines fetched per retrieval command
pub const DEFAULT_TAIL_LINES: usize = 720;

/// Lines kept in the event log, oldest evicted first
pub const DEFAULT_EVENT_LOG_LINES: usize = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub ssh: SshConfig,
    pub ptp: PtpConfig,
    pub event_log: EventLogConfig,
    pub sweep: SweepConfig,
    pub hosts: Vec<Host>,
    pub scan: ScanConfig,
}

/// A worker host reachable over SSH
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    #[serde(alias = "hostname")]
    pub name: String,
    #[serde(alias = "hostIP")]
    pub address: String,
}

impl Host {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    #[serde(skip)] // Never serialize passwords
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PtpConfig {
    pub syslog_path: String,
    pub tail_lines: usize,
    pub recency_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLogConfig {
    pub path: PathBuf,
    pub max_lines: usize,
    pub identity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Hosts swept at the same time; 1 keeps the sweep sequential
    pub concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub tcp_timeout_ms: u64,
    pub targets: Vec<ScanTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTarget {
    pub name: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
}

fn default_ssh_port() -> u16 {
    22
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "expeca".to_string(),
            port: default_ssh_port(),
            identity_file: None,
            connect_timeout_secs: 10,
            command_timeout_secs: 60,
            password: None,
        }
    }
}

impl Default for PtpConfig {
    fn default() -> Self {
        Self {
            syslog_path: "/var/log/syslog".to_string(),
            tail_lines: DEFAULT_TAIL_LINES,
            recency_window_secs: DEFAULT_RECENCY_WINDOW_SECS,
        }
    }
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("event.log"),
            max_lines: DEFAULT_EVENT_LOG_LINES,
            identity: "expeca-ptp-collector".to_string(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        let mut targets = vec![ScanTarget {
            name: "storage-01".to_string(),
            port: 22,
        }];
        targets.extend((1..=10).map(|i| ScanTarget {
            name: format!("worker-{:02}", i),
            port: 22,
        }));

        Self {
            tcp_timeout_ms: 500,
            targets,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        // Testbed inventory, in the order metrics are reported
        let hosts = [
            ("worker-01", "10.20.111.2"),
            ("worker-02", "10.20.111.5"),
            ("worker-03", "10.20.111.6"),
            ("worker-04", "10.20.111.7"),
            ("worker-05", "10.20.111.3"),
            ("worker-06", "10.20.111.4"),
            ("worker-07", "10.20.111.8"),
            ("worker-08", "10.20.111.9"),
            ("worker-09", "10.20.111.10"),
            ("worker-10", "10.20.111.11"),
        ]
        .into_iter()
        .map(|(name, address)| Host::new(name, address))
        .collect();

        Self {
            ssh: SshConfig::default(),
            ptp: PtpConfig::default(),
            event_log: EventLogConfig::default(),
            sweep: SweepConfig::default(),
            hosts,
            scan: ScanConfig::default(),
        }
    }
}

impl CollectorConfig {
    /// Load config from `$EXPECA_COLLECTOR_CONFIG` (or `collector.toml`),
    /// falling back to the built-in inventory when the file is absent
    pub async fn load() -> Result<Self, ConfigError> {
        let path = Self::config_file_path();
        let mut config = Self::load_from(&path).await?;
        config.ssh.password = std::env::var(SSH_PASSWORD_ENV)
            .ok()
            .filter(|p| !p.is_empty());
        Ok(config)
    }

    /// Load and validate a specific file; a missing file yields the defaults
    pub async fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("No config at {}, using built-in defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML content
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: CollectorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_file_path() -> PathBuf {
        std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Reject configurations the sweep cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return Err(ConfigError::Invalid("host with empty name".into()));
            }
            if host.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "host {} has an empty address",
                    host.name
                )));
            }
            if !seen.insert(host.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate host name {}",
                    host.name
                )));
            }
        }

        if self.ssh.user.trim().is_empty() {
            return Err(ConfigError::Invalid("ssh.user must not be empty".into()));
        }
        if self.ssh.connect_timeout_secs == 0 || self.ssh.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid("ssh timeouts must be positive".into()));
        }
        if self.ptp.tail_lines == 0 {
            return Err(ConfigError::Invalid("ptp.tail_lines must be positive".into()));
        }
        if self.ptp.recency_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "ptp.recency_window_secs must be positive".into(),
            ));
        }
        if self.ptp.syslog_path.trim().is_empty() {
            return Err(ConfigError::Invalid("ptp.syslog_path must not be empty".into()));
        }
        if self.event_log.max_lines == 0 {
            return Err(ConfigError::Invalid("event_log.max_lines must be positive".into()));
        }
        if self.sweep.concurrency == 0 {
            return Err(ConfigError::Invalid("sweep.concurrency must be positive".into()));
        }
        if self.scan.tcp_timeout_ms == 0 {
            return Err(ConfigError::Invalid("scan.tcp_timeout_ms must be positive".into()));
        }
        Ok(())
    }
}
