//! End-to-end PTP sweeps against a scripted remote

use chrono::Duration;
use expeca_collector::metrics::to_json;
use expeca_collector::sweep::EMPTY_SWEEP_NOTICE;
use expeca_collector::{LabelValue, MetricRecord, MetricValue};
use expeca_devkit::TestHarness;

fn names(records: &[MetricRecord]) -> Vec<&str> {
    records.iter().map(|r| r.metric_name.as_str()).collect()
}

fn host_of(record: &MetricRecord) -> Option<&str> {
    match record.labels.get("host") {
        Some(LabelValue::Text(host)) => Some(host.as_str()),
        _ => None,
    }
}

#[tokio::test]
async fn test_hardware_only_host() {
    let harness = TestHarness::new(1).unwrap();
    harness.hardware_offsets("worker-01", &[100, 200, 300]);

    let records = harness.sweep().await;

    assert_eq!(
        names(&records),
        vec![
            "expeca_ptp_hwstdoffset",
            "expeca_ptp_hwmaxoffset",
            "expeca_ptp_hwminoffset"
        ]
    );
    assert!(records.iter().all(|r| host_of(r) == Some("worker-01")));
    assert_eq!(records[0].value, MetricValue::Float(100.0));
    assert_eq!(records[1].value, MetricValue::Integer(300));
    assert_eq!(records[2].value, MetricValue::Integer(100));
    harness.assert_event_log_empty();
}

#[tokio::test]
async fn test_unreachable_host_is_skipped() {
    let harness = TestHarness::new(3).unwrap();
    harness.remote.unreachable("worker-02", "Connection timed out");
    harness
        .hardware_offsets("worker-01", &[10, 20])
        .hardware_offsets("worker-03", &[-5, 5]);

    let records = harness.sweep().await;

    assert!(records.iter().all(|r| host_of(r) != Some("worker-02")));
    assert_eq!(records.iter().filter(|r| host_of(r) == Some("worker-01")).count(), 3);
    assert_eq!(records.iter().filter(|r| host_of(r) == Some("worker-03")).count(), 3);
    harness.assert_event_logged("Connect to host worker-02 failed");
    harness.assert_event_logged("Connection timed out");

    // nothing was run on the unreachable host
    assert!(harness.remote.commands_for("worker-02").is_empty());
    assert_eq!(
        harness.remote.connect_attempts(),
        vec!["worker-01", "worker-02", "worker-03"]
    );
}

#[tokio::test]
async fn test_empty_sweep_logs_once() {
    let harness = TestHarness::new(4).unwrap();

    let records = harness.sweep().await;

    assert!(records.is_empty());
    assert_eq!(to_json(&records).unwrap(), "[]");
    let lines = harness.event_log_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].ends_with(&format!("expeca-ptp-collector: {}", EMPTY_SWEEP_NOTICE)));
}

#[tokio::test]
async fn test_emission_order_hosts_then_sources() {
    let harness = TestHarness::new(2).unwrap();
    harness
        .hardware_offsets("worker-01", &[1, 2])
        .software_offsets("worker-01", &[3, 4])
        .software_offsets("worker-02", &[7]);

    let records = harness.sweep().await;

    assert_eq!(
        names(&records),
        vec![
            "expeca_ptp_hwstdoffset",
            "expeca_ptp_hwmaxoffset",
            "expeca_ptp_hwminoffset",
            "expeca_ptp_swstdoffset",
            "expeca_ptp_swmaxoffset",
            "expeca_ptp_swminoffset",
            "expeca_ptp_swstdoffset",
            "expeca_ptp_swmaxoffset",
            "expeca_ptp_swminoffset",
        ]
    );
    let hosts: Vec<_> = records.iter().filter_map(host_of).collect();
    assert_eq!(&hosts[..6], &["worker-01"; 6]);
    assert_eq!(&hosts[6..], &["worker-02"; 3]);
    // single sample
    assert_eq!(records[6].value, MetricValue::Float(0.0));
}

#[tokio::test]
async fn test_concurrent_sweep_keeps_host_order() {
    let harness = TestHarness::new(6).unwrap().with_concurrency(4);
    for (i, host) in harness.hosts.iter().enumerate() {
        harness.hardware_offsets(&host.name, &[i as i64 * 10]);
    }

    let records = harness.sweep().await;

    let hosts: Vec<_> = records.iter().filter_map(host_of).collect();
    let mut expected = Vec::new();
    for host in &harness.hosts {
        expected.extend([host.name.as_str(); 3]);
    }
    assert_eq!(hosts, expected);
}

#[tokio::test]
async fn test_stale_samples_are_ignored() {
    let harness = TestHarness::new(1).unwrap();
    let builder = harness.lines_for("worker-01");
    let lines = vec![
        builder.ptp4l(harness.now - Duration::minutes(30), 90_000),
        builder.ptp4l(harness.now - Duration::seconds(400), 80_000),
        builder.ptp4l(harness.now - Duration::seconds(60), 40),
        builder.ptp4l(harness.now - Duration::seconds(1), -20),
    ];
    harness.remote.respond("worker-01", "ptp4l", lines);

    let records = harness.sweep().await;

    assert_eq!(records.len(), 3);
    assert_eq!(records[1].value, MetricValue::Integer(40));
    assert_eq!(records[2].value, MetricValue::Integer(-20));
}

#[tokio::test]
async fn test_only_stale_samples_give_no_records() {
    let harness = TestHarness::new(1).unwrap();
    let lines = harness
        .lines_for("worker-01")
        .ptp4l_series(harness.now - Duration::hours(2), &[1, 2, 3]);
    harness.remote.respond("worker-01", "ptp4l", lines);

    let records = harness.sweep().await;

    assert!(records.is_empty());
    harness.assert_event_logged(EMPTY_SWEEP_NOTICE);
}

#[tokio::test]
async fn test_bad_offset_only_drops_its_source() {
    let harness = TestHarness::new(1).unwrap();
    let builder = harness.lines_for("worker-01");
    let lines = vec![
        builder.ptp4l(harness.now, 12),
        builder.ptp4l_raw_offset(harness.now, "12ns"),
    ];
    harness.remote.respond("worker-01", "ptp4l", lines);
    harness.software_offsets("worker-01", &[5, 6]);

    let records = harness.sweep().await;

    assert_eq!(
        names(&records),
        vec![
            "expeca_ptp_swstdoffset",
            "expeca_ptp_swmaxoffset",
            "expeca_ptp_swminoffset"
        ]
    );
    harness.assert_event_logged("Reading hardware offsets from host worker-01 failed");
    harness.assert_event_logged("output line 2: unparsable offset '12ns'");
}

#[tokio::test]
async fn test_channel_failure_only_drops_its_source() {
    let harness = TestHarness::new(1).unwrap();
    harness.hardware_offsets("worker-01", &[3, 4]);
    harness
        .remote
        .fail_command("worker-01", "phc2sys", "connection reset by peer");

    let records = harness.sweep().await;

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.metric_name.starts_with("expeca_ptp_hw")));
    harness.assert_event_logged("Reading software offsets from host worker-01 failed");
    harness.assert_event_logged("connection reset by peer");
}

#[tokio::test]
async fn test_non_offset_lines_are_skipped() {
    let harness = TestHarness::new(1).unwrap();
    let builder = harness.lines_for("worker-01");
    let lines = vec![
        builder.ptp4l_state_change(harness.now),
        builder.ptp4l(harness.now, 8),
        String::new(),
    ];
    harness.remote.respond("worker-01", "ptp4l", lines);

    let records = harness.sweep().await;

    assert_eq!(records.len(), 3);
    assert_eq!(records[1].value, MetricValue::Integer(8));
    harness.assert_event_log_empty();
}

#[tokio::test]
async fn test_retrieval_commands() {
    let harness = TestHarness::new(1).unwrap();

    harness.sweep().await;

    assert_eq!(
        harness.remote.commands_for("worker-01"),
        vec![
            "cat /var/log/syslog | grep ptp4l | grep 'master offset' | tail -n 720",
            "cat /var/log/syslog | grep phc2sys | grep 'phc offset' | tail -n 720",
        ]
    );
}

#[tokio::test]
async fn test_json_output_shape() {
    let harness = TestHarness::new(1).unwrap();
    harness.hardware_offsets("worker-01", &[100, 200, 300]);

    let records = harness.sweep().await;
    let json = to_json(&records).unwrap();

    assert!(json.starts_with("[\n    {\n        \"metric_name\": \"expeca_ptp_hwstdoffset\""));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value[0]["labels"]["host"], "worker-01");
    assert_eq!(value[0]["value"], 100.0);
    assert_eq!(value[1]["value"], 300);
}
