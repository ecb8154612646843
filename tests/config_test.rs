//! Integration tests for configuration loading

use navscore::infra::Config;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_config_from_file() {
    let mut temp_file = NamedTempFile::new().unwrap();

    let config_content = r#"
[contest]
id = "nationals-day1"
route_file = "routes/day1.json"

[listener]
enabled = true
port = 26000

[egress]
file = "out/scores.jsonl"
buffer = 500

[metrics]
interval_secs = 15

[session]
grace_secs = 120
report_buffer = 64

[replay]
speed_factor = 25.0

[[contestants]]
id = "dev-101"
name = "First Pilot"
takeoff = "2024-06-01T09:00:00Z"
finished_by = "2024-06-01T11:00:00Z"

[contestants.gate_times]
SP = "2024-06-01T09:10:00Z"
TP1 = "2024-06-01T09:25:00Z"
FP = "2024-06-01T09:40:00Z"

[[contestants]]
id = "dev-102"
takeoff = "2024-06-01T09:30:00Z"
finished_by = "2024-06-01T11:30:00Z"

[contestants.gate_times]
SP = "2024-06-01T09:40:00Z"
TP1 = "2024-06-01T09:55:00Z"
FP = "2024-06-01T10:10:00Z"
"#;

    temp_file.write_all(config_content.as_bytes()).unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.contest_id(), "nationals-day1");
    assert_eq!(config.route_file(), "routes/day1.json");
    assert_eq!(config.listener_port(), 26000);
    assert_eq!(config.egress_file(), "out/scores.jsonl");
    assert_eq!(config.egress_buffer(), 500);
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.session_grace_secs(), 120);
    assert_eq!(config.report_buffer(), 64);
    assert_eq!(config.replay_speed_factor(), 25.0);

    let contestants = config.contestants();
    assert_eq!(contestants.len(), 2);
    assert_eq!(contestants[0].id.0, "dev-101");
    assert_eq!(contestants[0].name, "First Pilot");
    assert_eq!(contestants[0].gate_times.len(), 3);
    assert!(contestants[0].takeoff < contestants[0].finished_by);
    assert_eq!(contestants[1].name, "");
}

#[test]
fn test_partial_config_uses_section_defaults() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file
        .write_all(
            br#"
[contest]
id = "minimal"
"#,
        )
        .unwrap();
    temp_file.flush().unwrap();

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.contest_id(), "minimal");
    assert_eq!(config.route_file(), "routes/demo.json");
    assert_eq!(config.listener_port(), 25410);
    assert!(config.listener_enabled());
    assert_eq!(config.egress_file(), "scores.jsonl");
    assert_eq!(config.session_grace_secs(), 300);
    assert!(config.contestants().is_empty());
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("this/file/does/not/exist.toml");
    assert_eq!(config.contest_id(), "contest");
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_from_file_rejects_invalid_toml() {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(b"this is not toml [").unwrap();
    temp_file.flush().unwrap();

    assert!(Config::from_file(temp_file.path()).is_err());
}
