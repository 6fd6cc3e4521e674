//! Remote command execution
//!
//! The collectors only need "run command C on host H, get back lines or a
//! failure". `RemoteExecutor` opens a session per host, `RemoteSession` runs
//! commands in it. `SshExecutor` implements both on top of the system `ssh`
//! client (wrapped in `sshpass -e` when a password is configured).

use crate::config::{Host, SshConfig};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command as AsyncCommand;
use tracing::debug;

/// ssh exits with 255 when the connection itself failed
const SSH_CONNECTION_FAILURE: i32 = 255;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("connect to {host} failed: {reason}")]
    Connect { host: String, reason: String },
    #[error("command on {host} timed out after {secs}s")]
    Timeout { host: String, secs: u64 },
    #[error("channel failure on {host}: {reason}")]
    Channel { host: String, reason: String },
    #[error("failed to start ssh client: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Command execution result
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub execution_time_ms: u128,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout split into lines, without terminators
    pub fn lines(&self) -> Vec<String> {
        self.stdout.lines().map(str::to_string).collect()
    }
}

/// Opens command sessions to hosts
#[allow(async_fn_in_trait)]
pub trait RemoteExecutor {
    type Session: RemoteSession;

    async fn connect(&self, host: &Host) -> Result<Self::Session, RemoteError>;
}

/// A session established with one host
#[allow(async_fn_in_trait)]
pub trait RemoteSession {
    /// Run a command. A non-zero exit code is not an error; a broken channel is.
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Run a command and return its stdout lines
    async fn run_lines(&mut self, command: &str) -> Result<Vec<String>, RemoteError> {
        Ok(self.exec(command).await?.lines())
    }
}

/// Executor backed by the system ssh client
#[derive(Debug, Clone)]
pub struct SshExecutor {
    config: Arc<SshConfig>,
}

#[derive(Debug)]
pub struct SshSession {
    host: Host,
    config: Arc<SshConfig>,
}

impl SshExecutor {
    pub fn new(config: SshConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl RemoteExecutor for SshExecutor {
    type Session = SshSession;

    /// Probe the host with `true`; anything but a clean exit is a connect failure
    async fn connect(&self, host: &Host) -> Result<SshSession, RemoteError> {
        debug!("Connecting to {} ({})", host.name, host.address);

        let timeout_secs = self.config.connect_timeout_secs;
        let output = run_ssh(&self.config, &host.address, "true", timeout_secs)
            .await
            .map_err(|e| RemoteError::Connect {
                host: host.name.clone(),
                reason: e.to_string(),
            })?;

        if !output.success() {
            return Err(RemoteError::Connect {
                host: host.name.clone(),
                reason: failure_reason(&output),
            });
        }

        Ok(SshSession {
            host: host.clone(),
            config: Arc::clone(&self.config),
        })
    }
}

impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandOutput, RemoteError> {
        debug!("Executing on {}: {}", self.host.name, command);

        let timeout_secs = self.config.command_timeout_secs;
        let output = run_ssh(&self.config, &self.host.address, command, timeout_secs)
            .await
            .map_err(|e| match e {
                SshRunError::TimedOut => RemoteError::Timeout {
                    host: self.host.name.clone(),
                    secs: timeout_secs,
                },
                SshRunError::Io(e) => RemoteError::Spawn(e),
            })?;

        if output.exit_code == SSH_CONNECTION_FAILURE {
            return Err(RemoteError::Channel {
                host: self.host.name.clone(),
                reason: failure_reason(&output),
            });
        }

        debug!(
            "Command on {} exited with {} in {}ms",
            self.host.name, output.exit_code, output.execution_time_ms
        );
        Ok(output)
    }
}

#[derive(Debug, thiserror::Error)]
enum SshRunError {
    #[error("timed out")]
    TimedOut,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn failure_reason(output: &CommandOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        format!("exit code {}", output.exit_code)
    } else {
        format!("exit code {}: {}", output.exit_code, stderr)
    }
}

/// Build the client invocation for `remote` on `address`
fn ssh_command(config: &SshConfig, address: &str, remote: &str) -> AsyncCommand {
    let mut cmd = match &config.password {
        Some(password) => {
            let mut cmd = AsyncCommand::new("sshpass");
            cmd.arg("-e").arg("ssh").env("SSHPASS", password);
            cmd
        }
        None => {
            let mut cmd = AsyncCommand::new("ssh");
            cmd.args(["-o", "BatchMode=yes"]);
            cmd
        }
    };

    cmd.args(["-o", "StrictHostKeyChecking=accept-new"])
        .arg("-o")
        .arg(format!("ConnectTimeout={}", config.connect_timeout_secs))
        .arg("-p")
        .arg(config.port.to_string())
        .arg("-l")
        .arg(&config.user);

    if let Some(identity) = &config.identity_file {
        cmd.arg("-i").arg(identity);
    }

    cmd.arg(address)
        .arg(remote)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

async fn run_ssh(
    config: &SshConfig,
    address: &str,
    remote: &str,
    timeout_secs: u64,
) -> Result<CommandOutput, SshRunError> {
    let start_time = Instant::now();

    let output = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        ssh_command(config, address, remote).output(),
    )
    .await
    .map_err(|_| SshRunError::TimedOut)??;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
        execution_time_ms: start_time.elapsed().as_millis(),
    })
}
