//! Host sweep: one pass over the configured hosts
//!
//! For each host: open a session, fetch the ptp4l and phc2sys offset lines,
//! parse, keep the recent ones, aggregate, build records. A host that cannot
//! be reached or whose output cannot be read is written to the event log and
//! skipped; the other hosts are still swept.

use crate::config::{CollectorConfig, Host};
use crate::eventlog::{EventLog, ExceptionDetail};
use crate::execution::{RemoteError, RemoteExecutor, RemoteSession};
use crate::filter::RecencyWindow;
use crate::metrics::{offset_records, MetricEmitter, MetricRecord};
use crate::parser::{parse_series, LineError, OffsetSource};
use crate::stats::AggregateStats;
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use std::panic::Location;
use tracing::{debug, info, warn};

/// Event log notice for a sweep that produced nothing
pub const EMPTY_SWEEP_NOTICE: &str = "Empty PTP list";

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Parse(#[from] LineError),
}

/// A host-level error and the place it was raised
#[derive(Debug)]
pub struct Failure {
    pub error: HostError,
    pub location: &'static Location<'static>,
}

impl Failure {
    pub fn detail(&self) -> ExceptionDetail {
        ExceptionDetail {
            line: self.location.line(),
            message: self.error.to_string(),
        }
    }
}

impl From<RemoteError> for Failure {
    #[track_caller]
    fn from(error: RemoteError) -> Self {
        Self {
            error: error.into(),
            location: Location::caller(),
        }
    }
}

impl From<LineError> for Failure {
    #[track_caller]
    fn from(error: LineError) -> Self {
        Self {
            error: error.into(),
            location: Location::caller(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SweepSettings {
    pub syslog_path: String,
    pub tail_lines: usize,
    pub window: RecencyWindow,
    pub concurrency: usize,
}

impl SweepSettings {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            syslog_path: config.ptp.syslog_path.clone(),
            tail_lines: config.ptp.tail_lines,
            window: RecencyWindow::from_secs(config.ptp.recency_window_secs),
            concurrency: config.sweep.concurrency,
        }
    }
}

pub struct HostSweep<'a, E: RemoteExecutor> {
    executor: &'a E,
    event_log: &'a EventLog,
    settings: SweepSettings,
}

impl<'a, E: RemoteExecutor> HostSweep<'a, E> {
    pub fn new(executor: &'a E, event_log: &'a EventLog, settings: SweepSettings) -> Self {
        Self {
            executor,
            event_log,
            settings,
        }
    }

    /// Sweep every host and return the records in host order.
    ///
    /// Up to `concurrency` hosts are in flight at once; results are merged
    /// back in configuration order.
    pub async fn run(&self, hosts: &[Host], now: NaiveDateTime) -> Vec<MetricRecord> {
        info!(
            "Sweeping {} hosts (concurrency {})",
            hosts.len(),
            self.settings.concurrency
        );

        let per_host: Vec<Vec<MetricRecord>> = stream::iter(hosts)
            .map(|host| self.sweep_host(host, now))
            .buffered(self.settings.concurrency.max(1))
            .collect()
            .await;

        let mut emitter = MetricEmitter::new(EMPTY_SWEEP_NOTICE);
        for records in per_host {
            emitter.extend(records);
        }

        if emitter.is_empty() {
            warn!("Sweep produced no PTP metrics");
        }
        emitter.finish(self.event_log)
    }

    /// All records of one host; failures end up in the event log
    pub async fn sweep_host(&self, host: &Host, now: NaiveDateTime) -> Vec<MetricRecord> {
        let mut session = match self.executor.connect(host).await {
            Ok(session) => session,
            Err(e) => {
                let failure = Failure::from(e);
                warn!("Connect to host {} failed: {}", host.name, failure.error);
                self.event_log.record(
                    format!("Connect to host {} failed", host.name),
                    Some(&failure.detail()),
                );
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        for source in OffsetSource::ALL {
            match self.collect_source(&mut session, source, now).await {
                Ok(Some(stats)) => {
                    debug!("{} {} offsets: {:?}", host.name, source, stats);
                    records.extend(offset_records(&host.name, source, &stats));
                }
                Ok(None) => {
                    debug!("No recent {} offsets on {}", source, host.name);
                }
                Err(failure) => {
                    warn!(
                        "Reading {} offsets from {} failed: {}",
                        source, host.name, failure.error
                    );
                    self.event_log.record(
                        format!("Reading {} offsets from host {} failed", source, host.name),
                        Some(&failure.detail()),
                    );
                }
            }
        }

        records
    }

    async fn collect_source(
        &self,
        session: &mut E::Session,
        source: OffsetSource,
        now: NaiveDateTime,
    ) -> Result<Option<AggregateStats>, Failure> {
        let command = source.retrieval_command(&self.settings.syslog_path, self.settings.tail_lines);
        let lines = session.run_lines(&command).await?;
        let samples = parse_series(&lines, source, now)?;
        let offsets = self.settings.window.select(now, &samples);

        debug!(
            "{} lines, {} samples, {} recent ({})",
            lines.len(),
            samples.len(),
            offsets.len(),
            source
        );
        Ok(AggregateStats::from_offsets(&offsets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseError;

    #[test]
    fn test_failure_detail_points_at_raise_site() {
        let line = line!() + 1;
        let failure = Failure::from(RemoteError::Timeout {
            host: "worker-04".to_string(),
            secs: 60,
        });

        let detail = failure.detail();
        assert_eq!(detail.line, line);
        assert_eq!(detail.message, "command on worker-04 timed out after 60s");
    }

    #[test]
    fn test_parse_failure_message() {
        let source = "x".parse::<i64>().unwrap_err();
        let failure = Failure::from(LineError {
            line: 7,
            source: ParseError::Offset {
                token: "x".to_string(),
                source,
            },
        });

        assert!(matches!(failure.error, HostError::Parse(_)));
        assert_eq!(
            failure.detail().message,
            "output line 7: unparsable offset 'x': invalid digit found in string"
        );
    }

    #[test]
    fn test_settings_from_config() {
        let config = CollectorConfig::default();
        let settings = SweepSettings::from_config(&config);
        assert_eq!(settings.tail_lines, 720);
        assert_eq!(settings.window, RecencyWindow::from_secs(365));
        assert_eq!(settings.concurrency, 1);
    }
}
