use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_tool_requires_id_and_names() {
    let tool = ToolDefinition {
        id: "gcc9".to_string(),
        names: vec!["gcc-9".to_string()],
        ..Default::default()
    };
    assert!(tool.validate().is_ok());

    let no_names = ToolDefinition {
        id: "gcc9".to_string(),
        ..Default::default()
    };
    assert!(no_names.validate().is_err());

    let no_id = ToolDefinition {
        names: vec!["gcc-9".to_string()],
        ..Default::default()
    };
    assert!(no_id.validate().is_err());
}

#[test]
fn test_client_defaults() {
    let client = ClientConfig::default();
    assert_eq!(client.queue_timeout, Duration::from_secs(10));
    assert_eq!(client.request_timeout, Duration::from_secs(240));
    assert_eq!(client.invocation_attempts, 2);
    assert_eq!(client.minimal_remote_tasks, 10);
    assert_eq!(client.max_load_average, 0.0);
    assert!(client.validate().is_ok());
}

#[test]
fn test_client_rejects_zero_attempts() {
    let client = ClientConfig {
        invocation_attempts: 0,
        ..Default::default()
    };
    assert!(client.validate().is_err());
}

#[test]
fn test_coordinator_disabled_skips_validation() {
    let settings = CoordinatorSettings::default();
    assert!(!settings.enabled);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_coordinator_enabled_needs_hosts_and_port() {
    let mut settings = CoordinatorSettings {
        enabled: true,
        ..Default::default()
    };
    assert!(settings.validate().is_err());

    settings.hosts = vec!["coord1.lan".to_string()];
    assert!(settings.validate().is_err());

    settings.port = 7700;
    assert!(settings.validate().is_ok());
}

#[test]
fn test_worker_validation() {
    let worker = WorkerConfig {
        server_name: String::new(),
        listen_host: String::new(),
        listen_port: 7767,
        thread_count: 4,
        host_allowlist: Vec::new(),
        compression: Default::default(),
        use_client_compression: true,
        coordinator: CoordinatorSettings::default(),
    };
    assert!(worker.validate().is_ok());

    let no_port = WorkerConfig {
        listen_port: 0,
        ..worker.clone()
    };
    assert!(no_port.validate().is_err());

    let no_threads = WorkerConfig {
        thread_count: 0,
        ..worker
    };
    assert!(no_threads.validate().is_err());
}

#[test]
fn test_dialect_serde_names() {
    let parsed: ToolchainDialect = toml::from_str::<toml::Value>("v = \"update_file\"")
        .unwrap()
        .get("v")
        .unwrap()
        .clone()
        .try_into()
        .unwrap();
    assert_eq!(parsed, ToolchainDialect::UpdateFile);
}
