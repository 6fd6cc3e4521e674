//! EXPECA collectors - one-shot metric collection for the testbed
//!
//! - PTP offset collection: remote syslog retrieval over SSH, offset parsing,
//!   recency filtering and per-host stddev / max / min aggregation
//! - Server scan: TCP, SSH and passwordless sudo checks
//! - Bounded event log for diagnosing collection failures
//!
//! Both binaries print one JSON array of metric records on stdout.

pub mod config;
pub mod eventlog;
pub mod execution;
pub mod filter;
pub mod metrics;
pub mod parser;
pub mod scan;
pub mod stats;
pub mod sweep;

pub use config::{CollectorConfig, Host, ScanTarget};
pub use eventlog::{EventLog, ExceptionDetail};
pub use execution::{CommandOutput, RemoteError, RemoteExecutor, RemoteSession, SshExecutor};
pub use filter::RecencyWindow;
pub use metrics::{LabelValue, Labels, MetricEmitter, MetricRecord, MetricValue};
pub use parser::{OffsetSample, OffsetSource};
pub use scan::ServerScan;
pub use stats::AggregateStats;
pub use sweep::{HostSweep, SweepSettings};

/// Install the stderr tracing subscriber (stdout carries the JSON output)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
