//! EXPECA PTP collector
//!
//! Connects to every worker over SSH, reads the ptp4l and phc2sys offsets
//! from syslog and prints the per-host statistics as a JSON array for the
//! exporter. Failures go to `event.log`; the output is always a valid array.

use anyhow::{Context, Result};
use expeca_collector::{
    init_tracing, metrics, CollectorConfig, EventLog, HostSweep, SshExecutor, SweepSettings,
};
use std::io::Write;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Charger les variables d'environnement depuis .env (si présent)
    dotenvy::dotenv().ok();
    init_tracing();

    let config = CollectorConfig::load()
        .await
        .context("Failed to load collector configuration")?;

    let event_log = EventLog::from_config(&config.event_log);
    let executor = SshExecutor::new(config.ssh.clone());
    let sweep = HostSweep::new(&executor, &event_log, SweepSettings::from_config(&config));

    let now = chrono::Local::now().naive_local();
    let records = sweep.run(&config.hosts, now).await;
    info!("Collected {} PTP metric records", records.len());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    metrics::write_json(&records, &mut out).context("Failed to serialize metrics")?;
    writeln!(out).context("Failed to write metrics")?;

    Ok(())
}
