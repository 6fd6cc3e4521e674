/*!
Test Harness pour les collecteurs EXPECA

Facilite l'écriture de tests de balayage avec:
- Un exécuteur distant simulé pré-câblé
- Un journal d'événements dans un répertoire temporaire
- Une horloge figée pour des fenêtres de récence déterministes
*/

use crate::mock_remote::MockRemote;
use crate::syslog_lines::SyslogLineBuilder;
use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use expeca_collector::config::{DEFAULT_RECENCY_WINDOW_SECS, DEFAULT_TAIL_LINES};
use expeca_collector::{EventLog, Host, HostSweep, MetricRecord, RecencyWindow, SweepSettings};
use tempfile::TempDir;

const TEST_EVENT_LOG_LINES: usize = 100;

/// Harness de test complet pour un balayage PTP
pub struct TestHarness {
    pub remote: MockRemote,
    pub event_log: EventLog,
    pub now: NaiveDateTime,
    pub hosts: Vec<Host>,
    pub settings: SweepSettings,
    _dir: TempDir,
}

impl TestHarness {
    /// Harness avec `host_count` workers (worker-01, worker-02, ...)
    pub fn new(host_count: usize) -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        let dir = tempfile::tempdir()?;
        let event_log = EventLog::new(
            dir.path().join("event.log"),
            TEST_EVENT_LOG_LINES,
            "expeca-ptp-collector",
        );

        let hosts = (1..=host_count)
            .map(|i| Host::new(format!("worker-{:02}", i), format!("10.20.111.{}", i + 1)))
            .collect();

        Ok(Self {
            remote: MockRemote::new(),
            event_log,
            now: Self::fixed_now(),
            hosts,
            settings: SweepSettings {
                syslog_path: "/var/log/syslog".to_string(),
                tail_lines: DEFAULT_TAIL_LINES,
                window: RecencyWindow::from_secs(DEFAULT_RECENCY_WINDOW_SECS),
                concurrency: 1,
            },
            _dir: dir,
        })
    }

    /// 2024-10-09 08:00:01, l'instant de référence des tests
    pub fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 10, 9)
            .and_then(|d| d.and_hms_opt(8, 0, 1))
            .unwrap()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.settings.concurrency = concurrency;
        self
    }

    pub fn lines_for(&self, host: &str) -> SyslogLineBuilder {
        SyslogLineBuilder::new(host)
    }

    /// Scripte des offsets ptp4l récents pour un hôte
    pub fn hardware_offsets(&self, host: &str, offsets: &[i64]) -> &Self {
        let lines = self.lines_for(host).ptp4l_series(self.now, offsets);
        self.remote.respond(host, "ptp4l", lines);
        self
    }

    /// Scripte des offsets phc2sys récents pour un hôte
    pub fn software_offsets(&self, host: &str, offsets: &[i64]) -> &Self {
        let lines = self.lines_for(host).phc2sys_series(self.now, offsets);
        self.remote.respond(host, "phc2sys", lines);
        self
    }

    /// Lance un balayage complet sur tous les hôtes du harness
    pub async fn sweep(&self) -> Vec<MetricRecord> {
        let sweep = HostSweep::new(&self.remote, &self.event_log, self.settings.clone());
        let records = sweep.run(&self.hosts, self.now).await;
        log::info!("🧪 Sweep produced {} records", records.len());
        records
    }

    /// Lignes actuelles du journal d'événements (vide si jamais écrit)
    pub fn event_log_lines(&self) -> Vec<String> {
        std::fs::read_to_string(self.event_log.path())
            .map(|content| content.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Vérifie qu'au moins une entrée du journal contient `needle`
    pub fn assert_event_logged(&self, needle: &str) {
        let lines = self.event_log_lines();
        assert!(
            lines.iter().any(|l| l.contains(needle)),
            "no event log entry contains {:?}, got {:#?}",
            needle,
            lines
        );
    }

    pub fn assert_event_log_empty(&self) {
        let lines = self.event_log_lines();
        assert!(lines.is_empty(), "expected empty event log, got {:#?}", lines);
    }
}
