use pretty_assertions::assert_eq;

use super::*;
use crate::types::Redundance;

const SAMPLE: &str = r#"
temp_dir = "/tmp/distbuild-test"

[[tools]]
id = "gcc9"
names = ["gcc-9", "g++-9"]
dialect = "gcc"

[[tools]]
id = "touch"
names = ["touch"]
dialect = "update_file"
version = "1.0"

[client]
queue_timeout = "1s"
request_timeout = "30s"
invocation_attempts = 3
compression = { type = "zstd", level = 3 }

[client.coordinator]
enabled = true
hosts = ["coord1.lan", "coord2.lan"]
port = 7700
redundance = "any"
send_info_interval = "2s"

[worker]
listen_port = 7767
thread_count = 8
host_allowlist = ["10.0.0.1"]

[coordinator_server]
listen_port = 7700
"#;

fn write_sample(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_full_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir, SAMPLE);

    let config = load_config(&path).unwrap();
    assert_eq!(config.tools.len(), 2);
    assert_eq!(config.tool_ids(), vec!["gcc9", "touch"]);
    assert_eq!(
        config.client.queue_timeout,
        std::time::Duration::from_secs(1)
    );
    assert_eq!(config.client.invocation_attempts, 3);
    assert_eq!(config.client.coordinator.redundance, Redundance::Any);
    assert_eq!(
        config.client.coordinator.hosts,
        vec!["coord1.lan", "coord2.lan"]
    );

    let worker = config.worker.as_ref().unwrap();
    assert_eq!(worker.thread_count, 8);
    assert!(worker.use_client_compression);

    assert_eq!(config.coordinator_server.as_ref().unwrap().listen_port, 7700);
}

#[test]
fn test_tool_lookup_by_name_and_stem() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir, SAMPLE);
    let config = load_config(&path).unwrap();

    assert_eq!(config.tool_by_name("g++-9").unwrap().id, "gcc9");
    assert_eq!(config.tool_by_name("/usr/bin/gcc-9").unwrap().id, "gcc9");
    assert!(config.tool_by_name("icc").is_none());

    assert_eq!(config.tool_by_id("touch").unwrap().version.as_deref(), Some("1.0"));
}

#[test]
fn test_duplicate_tool_ids_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(
        &dir,
        r#"
[[tools]]
id = "gcc9"
names = ["gcc-9"]

[[tools]]
id = "gcc9"
names = ["g++-9"]
"#,
    );
    assert!(load_config(&path).is_err());
}

#[test]
fn test_missing_file_is_config_error() {
    let result = load_config(std::path::Path::new("/nonexistent/config.toml"));
    assert!(result.is_err());
}

#[test]
fn test_malformed_toml_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir, "[[tools\nid = ");
    assert!(load_config(&path).is_err());
}

#[test]
fn test_minimal_config_gets_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_sample(&dir, "");
    let config = load_config(&path).unwrap();

    assert!(config.tools.is_empty());
    assert!(config.worker.is_none());
    assert_eq!(
        config.client.request_timeout,
        std::time::Duration::from_secs(240)
    );
    assert!(config.temp_dir().ends_with("distbuild"));
}

#[test]
fn test_find_config_prefers_explicit() {
    let explicit = std::path::Path::new("/etc/distbuild.toml");
    assert_eq!(find_config(Some(explicit)), explicit);
}
