//! Server availability scan
//!
//! For every target: resolve the name, try a TCP connect on its port, then
//! open an SSH session and check that `sudo` works without a password.
//! One `expeca_server_status` record per target, value 1 when the port is up.

use crate::config::{Host, ScanTarget};
use crate::execution::{RemoteExecutor, RemoteSession};
use crate::metrics::{Labels, MetricRecord, MetricValue};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

pub const SERVER_STATUS_METRIC: &str = "expeca_server_status";

const SUDO_CHECK: &str = "sudo -n true";
const NOT_APPLICABLE: &str = "-";

/// TCP reachability of the target port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reachability {
    Up,
    Down,
    HostnameNotFound,
    ConnectError,
}

impl Reachability {
    pub fn as_str(self) -> &'static str {
        match self {
            Reachability::Up => "Up",
            Reachability::Down => "Down",
            Reachability::HostnameNotFound => "Hostname not found",
            Reachability::ConnectError => "Could not connect to server",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SshStatus {
    Success,
    Fail,
    NotTried,
}

impl SshStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SshStatus::Success => "Success",
            SshStatus::Fail => "Fail",
            SshStatus::NotTried => NOT_APPLICABLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SudoStatus {
    Passwordless,
    NeedsPassword,
    Unknown,
}

impl SudoStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SudoStatus::Passwordless => "is passwordless",
            SudoStatus::NeedsPassword => "needs a password",
            SudoStatus::Unknown => NOT_APPLICABLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub server: String,
    pub ip: Option<IpAddr>,
    pub port: u16,
    pub reachability: Reachability,
    pub ssh: SshStatus,
    pub sudo: SudoStatus,
}

impl ScanOutcome {
    pub fn to_record(&self) -> MetricRecord {
        let ip = self
            .ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| NOT_APPLICABLE.to_string());

        let labels = Labels::new()
            .with("remoteServer", self.server.as_str())
            .with("remoteServerIP", ip)
            .with("port", i64::from(self.port))
            .with("resStr", self.reachability.as_str())
            .with("resStrSSH", self.ssh.as_str())
            .with("resStrSUDO", self.sudo.as_str());

        let value = if self.reachability == Reachability::Up { 1 } else { 0 };
        MetricRecord::new(SERVER_STATUS_METRIC, labels, MetricValue::Integer(value))
    }
}

pub struct ServerScan<'a, E: RemoteExecutor> {
    executor: &'a E,
    tcp_timeout: Duration,
}

impl<'a, E: RemoteExecutor> ServerScan<'a, E> {
    pub fn new(executor: &'a E, tcp_timeout: Duration) -> Self {
        Self {
            executor,
            tcp_timeout,
        }
    }

    /// Scan every target in order and return one record each
    pub async fn run(&self, targets: &[ScanTarget]) -> Vec<MetricRecord> {
        info!("Scanning {} servers", targets.len());
        let mut records = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self.scan_target(target).await;
            records.push(outcome.to_record());
        }
        records
    }

    pub async fn scan_target(&self, target: &ScanTarget) -> ScanOutcome {
        let mut outcome = ScanOutcome {
            server: target.name.clone(),
            ip: None,
            port: target.port,
            reachability: Reachability::HostnameNotFound,
            ssh: SshStatus::NotTried,
            sudo: SudoStatus::Unknown,
        };

        let Some(ip) = resolve(&target.name, target.port).await else {
            warn!("Hostname {} not found", target.name);
            return outcome;
        };
        outcome.ip = Some(ip);

        outcome.reachability = self.probe_port(SocketAddr::new(ip, target.port)).await;
        match outcome.reachability {
            Reachability::Up => {}
            Reachability::Down => {
                // Port closed: ssh cannot succeed either
                outcome.ssh = SshStatus::Fail;
                return outcome;
            }
            _ => return outcome,
        }

        let host = Host::new(target.name.clone(), ip.to_string());
        let mut session = match self.executor.connect(&host).await {
            Ok(session) => session,
            Err(e) => {
                debug!("SSH to {} failed: {}", target.name, e);
                outcome.ssh = SshStatus::Fail;
                return outcome;
            }
        };
        outcome.ssh = SshStatus::Success;

        outcome.sudo = match session.exec(SUDO_CHECK).await {
            Ok(output) if output.success() => SudoStatus::Passwordless,
            Ok(_) => SudoStatus::NeedsPassword,
            Err(e) => {
                debug!("sudo check on {} failed: {}", target.name, e);
                SudoStatus::Unknown
            }
        };

        outcome
    }

    async fn probe_port(&self, addr: SocketAddr) -> Reachability {
        match tokio::time::timeout(self.tcp_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => Reachability::Up,
            // Refused / unreachable come back as an OS error code
            Ok(Err(e)) if e.raw_os_error().is_some() => {
                debug!("TCP connect to {} failed: {}", addr, e);
                Reachability::Down
            }
            Ok(Err(e)) => {
                warn!("TCP connect to {} errored: {}", addr, e);
                Reachability::ConnectError
            }
            Err(_) => Reachability::Down,
        }
    }
}

/// First IPv4 address of `name`, falling back to any address
async fn resolve(name: &str, port: u16) -> Option<IpAddr> {
    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((name, port)).await.ok()?.collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .map(|a| a.ip())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_labels() {
        let outcome = ScanOutcome {
            server: "worker-01".to_string(),
            ip: Some("10.20.111.2".parse().unwrap()),
            port: 22,
            reachability: Reachability::Up,
            ssh: SshStatus::Success,
            sudo: SudoStatus::Passwordless,
        };

        let value = serde_json::to_value(outcome.to_record()).unwrap();
        assert_eq!(
            value,
            json!({
                "metric_name": "expeca_server_status",
                "labels": {
                    "remoteServer": "worker-01",
                    "remoteServerIP": "10.20.111.2",
                    "port": 22,
                    "resStr": "Up",
                    "resStrSSH": "Success",
                    "resStrSUDO": "is passwordless"
                },
                "value": 1
            })
        );
    }

    #[test]
    fn test_unresolved_record() {
        let outcome = ScanOutcome {
            server: "storage-01".to_string(),
            ip: None,
            port: 22,
            reachability: Reachability::HostnameNotFound,
            ssh: SshStatus::NotTried,
            sudo: SudoStatus::Unknown,
        };

        let record = outcome.to_record();
        assert_eq!(record.value, MetricValue::Integer(0));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["labels"]["remoteServerIP"], "-");
        assert_eq!(value["labels"]["resStr"], "Hostname not found");
        assert_eq!(value["labels"]["resStrSSH"], "-");
        assert_eq!(value["labels"]["resStrSUDO"], "-");
    }

    #[tokio::test]
    async fn test_resolve_literal_address() {
        assert_eq!(
            resolve("127.0.0.1", 22).await,
            Some("127.0.0.1".parse().unwrap())
        );
    }
}
