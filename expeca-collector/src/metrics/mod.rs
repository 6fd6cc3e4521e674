//! Metric records for the exporter
//!
//! Output schema (one array element per metric):
//! `{"metric_name": <string>, "labels": {<name>: <string|number>}, "value": <number>}`
//!
//! Label order is kept as inserted so the JSON reads the same on every run.

use crate::eventlog::EventLog;
use crate::parser::OffsetSource;
use crate::stats::AggregateStats;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;
use std::io::Write;
use tracing::debug;

/// Metric value, integer or float
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
}

/// Label value, text or number
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    Text(String),
    Number(i64),
}

impl From<&str> for LabelValue {
    fn from(value: &str) -> Self {
        LabelValue::Text(value.to_string())
    }
}

impl From<String> for LabelValue {
    fn from(value: String) -> Self {
        LabelValue::Text(value)
    }
}

impl From<i64> for LabelValue {
    fn from(value: i64) -> Self {
        LabelValue::Number(value)
    }
}

/// Ordered label set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels(Vec<(String, LabelValue)>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<LabelValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a label, replacing an existing value in place
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<LabelValue>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LabelValue> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Labels {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetricRecord {
    pub metric_name: String,
    pub labels: Labels,
    pub value: MetricValue,
}

impl MetricRecord {
    pub fn new(metric_name: impl Into<String>, labels: Labels, value: MetricValue) -> Self {
        Self {
            metric_name: metric_name.into(),
            labels,
            value,
        }
    }
}

/// Statistic carried by a PTP offset metric
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Std,
    Max,
    Min,
}

impl StatKind {
    /// Emission order within a source
    pub const ALL: [StatKind; 3] = [StatKind::Std, StatKind::Max, StatKind::Min];
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKind::Std => write!(f, "std"),
            StatKind::Max => write!(f, "max"),
            StatKind::Min => write!(f, "min"),
        }
    }
}

/// `expeca_ptp_{hw|sw}{std|max|min}offset`
pub fn ptp_metric_name(source: OffsetSource, kind: StatKind) -> String {
    format!("expeca_ptp_{}{}offset", source.metric_prefix(), kind)
}

/// The three records (stddev, max, min) of one host and source
pub fn offset_records(host: &str, source: OffsetSource, stats: &AggregateStats) -> Vec<MetricRecord> {
    StatKind::ALL
        .iter()
        .map(|&kind| {
            let value = match kind {
                StatKind::Std => MetricValue::Float(stats.stddev),
                StatKind::Max => MetricValue::Integer(stats.max),
                StatKind::Min => MetricValue::Integer(stats.min),
            };
            MetricRecord::new(
                ptp_metric_name(source, kind),
                Labels::new().with("host", host),
                value,
            )
        })
        .collect()
}

/// Collects the records of one run, in production order
#[derive(Debug)]
pub struct MetricEmitter {
    records: Vec<MetricRecord>,
    empty_notice: String,
}

impl MetricEmitter {
    /// `empty_notice` goes to the event log when the run produced nothing
    pub fn new(empty_notice: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            empty_notice: empty_notice.into(),
        }
    }

    pub fn push(&mut self, record: MetricRecord) {
        self.records.push(record);
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = MetricRecord>) {
        self.records.extend(records);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Hand out the ordered batch; an empty batch is noted in the event log
    pub fn finish(self, event_log: &EventLog) -> Vec<MetricRecord> {
        if self.records.is_empty() {
            event_log.record(&self.empty_notice, None);
        }
        debug!("Emitting {} metric records", self.records.len());
        self.records
    }
}

/// JSON array, 4-space indent
pub fn to_json(records: &[MetricRecord]) -> serde_json::Result<String> {
    let mut out = Vec::new();
    write_json(records, &mut out)?;
    // serde_json only emits UTF-8
    Ok(String::from_utf8_lossy(&out).into_owned())
}

pub fn write_json<W: Write>(records: &[MetricRecord], writer: W) -> serde_json::Result<()> {
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
    records.serialize(&mut serializer)
}
