//! EXPECA server scan
//!
//! Checks every scan target for an open SSH port, a working SSH login and
//! passwordless sudo, and prints one `expeca_server_status` record per target.

use anyhow::{Context, Result};
use expeca_collector::{init_tracing, metrics, CollectorConfig, ServerScan, SshExecutor};
use std::io::Write;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = CollectorConfig::load()
        .await
        .context("Failed to load collector configuration")?;

    let executor = SshExecutor::new(config.ssh.clone());
    let scan = ServerScan::new(&executor, Duration::from_millis(config.scan.tcp_timeout_ms));

    let records = scan.run(&config.scan.targets).await;
    info!("Scanned {} servers", records.len());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    metrics::write_json(&records, &mut out).context("Failed to serialize scan results")?;
    writeln!(out).context("Failed to write scan results")?;

    Ok(())
}
