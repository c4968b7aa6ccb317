use bytes::BytesMut;
use pretty_assertions::assert_eq;

use super::*;

fn sample_server() -> ToolServerInfo {
    ToolServerInfo {
        host: "build-07".to_string(),
        port: 7767,
        total_threads: 16,
        running_tasks: 3,
        queued_tasks: 1,
        tool_ids: vec!["gcc9".to_string(), "clang12".to_string()],
        tool_versions: std::collections::BTreeMap::from([
            ("gcc9".to_string(), "9.3.0".to_string()),
            ("clang12".to_string(), "12.0.1".to_string()),
        ]),
        connected_clients: vec![ConnectedClientInfo {
            client_id: "dev-laptop".to_string(),
            client_host: "10.0.0.42".to_string(),
            session_id: 0xDEAD_BEEF,
            used_threads: 2,
        }],
    }
}

#[test]
fn test_tool_server_info_round_trip() {
    let info = sample_server();
    let mut buf = BytesMut::new();
    info.encode(&mut buf);

    let mut read = buf.freeze();
    assert_eq!(ToolServerInfo::decode(&mut read).unwrap(), info);
}

#[test]
fn test_free_threads() {
    let mut info = sample_server();
    assert_eq!(info.free_threads(), 13);

    info.running_tasks = 20; // overloaded report must not underflow
    assert_eq!(info.free_threads(), 0);
}

#[test]
fn test_key_identifies_endpoint() {
    let info = sample_server();
    assert_eq!(info.key(), ("build-07".to_string(), 7767));
}

#[test]
fn test_coordinator_info_round_trip() {
    let info = CoordinatorInfo {
        tool_servers: vec![sample_server(), ToolServerInfo::default()],
        message: "maintenance at 18:00".to_string(),
    };
    let mut buf = BytesMut::new();
    info.encode(&mut buf);

    let mut read = buf.freeze();
    assert_eq!(CoordinatorInfo::decode(&mut read).unwrap(), info);
}

#[test]
fn test_empty_coordinator_info() {
    let info = CoordinatorInfo::default();
    let mut buf = BytesMut::new();
    info.encode(&mut buf);

    let mut read = buf.freeze();
    let decoded = CoordinatorInfo::decode(&mut read).unwrap();
    assert!(decoded.tool_servers.is_empty());
    assert!(decoded.message.is_empty());
}
