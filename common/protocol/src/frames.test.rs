use std::time::Duration;

use pretty_assertions::assert_eq;

use super::*;
use crate::compress::CompressionType;
use crate::compress::compress;

fn round_trip(frame: Frame) -> Frame {
    Frame::decode(frame.encode()).unwrap()
}

#[test]
fn test_connection_status_round_trip() {
    let frame = Frame::notification(FrameBody::ConnectionStatus {
        protocol_version: CHANNEL_PROTOCOL_VERSION,
    });
    assert_eq!(round_trip(frame.clone()), frame);
}

#[test]
fn test_remote_tool_request_round_trip() {
    let compression = CompressionInfo::new(CompressionType::ZStd, 3);
    let file_data = compress(b"preprocessed translation unit", compression).unwrap();
    let frame = Frame::new(
        42,
        FrameBody::RemoteToolRequest(RemoteToolRequest {
            client_id: "dev-laptop".to_string(),
            session_id: 7,
            file_data,
            args: vec![
                "-O2".to_string(),
                "-c".to_string(),
                "foo.i".to_string(),
                "-o".to_string(),
                "foo.o".to_string(),
            ],
            tool_id: "gcc9".to_string(),
            compression,
        }),
    );
    assert_eq!(round_trip(frame.clone()), frame);
}

#[test]
fn test_remote_tool_response_round_trip() {
    for codec in [
        CompressionType::None,
        CompressionType::Gzip,
        CompressionType::Lz4,
        CompressionType::ZStd,
    ] {
        let compression = CompressionInfo::new(codec, 1);
        let file_data = compress(&[0x7f, b'E', b'L', b'F', 0, 1, 2, 3], compression).unwrap();
        let frame = Frame::new(
            42,
            FrameBody::RemoteToolResponse(RemoteToolResponse {
                success: true,
                file_data,
                std_out: String::new(),
                execution_time: Duration::from_micros(1_234_567),
                compression,
            }),
        );
        assert_eq!(round_trip(frame.clone()), frame);
    }
}

#[test]
fn test_failed_response_round_trip() {
    let frame = Frame::new(
        9,
        FrameBody::RemoteToolResponse(RemoteToolResponse {
            success: false,
            file_data: Vec::new(),
            std_out: "foo.i:12:1: error: expected ';'".to_string(),
            execution_time: Duration::from_micros(40_000),
            compression: CompressionInfo::NONE,
        }),
    );
    assert_eq!(round_trip(frame.clone()), frame);
}

#[test]
fn test_tools_version_pair_round_trip() {
    let request = Frame::new(1, FrameBody::ToolsVersionRequest);
    assert_eq!(round_trip(request.clone()), request);

    let mut versions = std::collections::BTreeMap::new();
    versions.insert("gcc9".to_string(), "9.3.0".to_string());
    let response = Frame::new(
        1,
        FrameBody::ToolsVersionResponse(ToolsVersionResponse { versions }),
    );
    assert_eq!(round_trip(response.clone()), response);
}

#[test]
fn test_worker_status_and_coordinator_info_round_trip() {
    let server = crate::info::ToolServerInfo {
        host: "build-07".to_string(),
        port: 7767,
        total_threads: 8,
        running_tasks: 8,
        queued_tasks: 5,
        tool_ids: vec!["gcc9".to_string()],
        tool_versions: std::collections::BTreeMap::new(),
        connected_clients: Vec::new(),
    };

    let status = Frame::notification(FrameBody::WorkerStatus(server.clone()));
    assert_eq!(round_trip(status.clone()), status);

    let info = Frame::notification(FrameBody::CoordinatorInfo(crate::info::CoordinatorInfo {
        tool_servers: vec![server],
        message: String::new(),
    }));
    assert_eq!(round_trip(info.clone()), info);
}

#[test]
fn test_snapshot_request_round_trip() {
    let frame = Frame::new(3, FrameBody::SnapshotRequest);
    assert_eq!(round_trip(frame.clone()), frame);
}

#[test]
fn test_transaction_id_survives() {
    let frame = Frame::new(u64::MAX, FrameBody::ToolsVersionRequest);
    assert_eq!(round_trip(frame).transaction_id, u64::MAX);
}

#[test]
fn test_unknown_kind_rejected() {
    let raw = crate::codec::RawFrame {
        kind: 200,
        payload: bytes::Bytes::new(),
    };
    assert!(Frame::decode(raw).is_err());
}

#[test]
fn test_truncated_payload_rejected() {
    let frame = Frame::new(
        1,
        FrameBody::RemoteToolRequest(RemoteToolRequest {
            client_id: "c".to_string(),
            tool_id: "gcc9".to_string(),
            ..Default::default()
        }),
    );
    let mut raw = frame.encode();
    raw.payload = raw.payload.slice(0..raw.payload.len() - 3);
    assert!(Frame::decode(raw).is_err());
}
