use bytes::Bytes;
use bytes::BytesMut;
use pretty_assertions::assert_eq;
use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;

use super::*;

fn encode_to_buf(codec: &mut FrameCodec, frame: RawFrame) -> BytesMut {
    let mut buf = BytesMut::new();
    codec.encode(frame, &mut buf).unwrap();
    buf
}

#[test]
fn test_small_frame_round_trip() {
    let mut codec = FrameCodec::default();
    let frame = RawFrame {
        kind: 9,
        payload: Bytes::from_static(b"hello"),
    };
    let mut buf = encode_to_buf(&mut codec, frame.clone());
    // kind + length + payload
    assert_eq!(buf.len(), 5 + 5);

    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded, frame);
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

#[test]
fn test_empty_payload() {
    let mut codec = FrameCodec::default();
    let frame = RawFrame {
        kind: 0,
        payload: Bytes::new(),
    };
    let mut buf = encode_to_buf(&mut codec, frame.clone());
    assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), frame);
}

#[test]
fn test_oversize_payload_is_segmented_and_reassembled() {
    let mut codec = FrameCodec::new(64);
    let payload: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();
    let frame = RawFrame {
        kind: 10,
        payload: Bytes::from(payload.clone()),
    };

    let mut buf = encode_to_buf(&mut codec, frame);
    // Segmented encoding is strictly larger than the payload itself.
    assert!(buf.len() > payload.len());

    let decoded = codec.decode(&mut buf).unwrap().unwrap();
    assert_eq!(decoded.kind, 10);
    assert_eq!(&decoded.payload[..], &payload[..]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

#[test]
fn test_partial_header_needs_more_data() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::from(&[9u8, 5, 0][..]);
    assert!(codec.decode(&mut buf).unwrap().is_none());
}

#[test]
fn test_partial_payload_needs_more_data() {
    let mut codec = FrameCodec::default();
    let frame = RawFrame {
        kind: 9,
        payload: Bytes::from_static(b"hello world"),
    };
    let full = encode_to_buf(&mut codec, frame.clone());

    let mut partial = BytesMut::from(&full[..8]);
    assert!(codec.decode(&mut partial).unwrap().is_none());

    partial.extend_from_slice(&full[8..]);
    assert_eq!(codec.decode(&mut partial).unwrap().unwrap(), frame);
}

#[test]
fn test_interleaved_small_frame_between_segments() {
    let mut sender = FrameCodec::new(32);
    let big = RawFrame {
        kind: 10,
        payload: Bytes::from(vec![0xAB; 100]),
    };
    let heartbeat = RawFrame {
        kind: 0,
        payload: Bytes::from_static(&[1, 0, 0, 0]),
    };

    // Encode the big frame, then splice a heartbeat in between its segments.
    let mut big_buf = BytesMut::new();
    sender.encode(big, &mut big_buf).unwrap();
    let first_segment_len = 5 + 14 + 32; // header + segment prefix + chunk
    let mut wire = BytesMut::new();
    wire.extend_from_slice(&big_buf[..first_segment_len]);
    let mut hb_buf = BytesMut::new();
    sender.encode(heartbeat.clone(), &mut hb_buf).unwrap();
    wire.extend_from_slice(&hb_buf);
    wire.extend_from_slice(&big_buf[first_segment_len..]);

    let mut receiver = FrameCodec::new(32);
    // First decoded frame is the heartbeat; the big frame completes after.
    let first = receiver.decode(&mut wire).unwrap().unwrap();
    assert_eq!(first, heartbeat);
    let second = receiver.decode(&mut wire).unwrap().unwrap();
    assert_eq!(second.kind, 10);
    assert_eq!(second.payload.len(), 100);
}

#[test]
fn test_out_of_order_segment_rejected() {
    let mut sender = FrameCodec::new(16);
    let frame = RawFrame {
        kind: 10,
        payload: Bytes::from(vec![7; 64]),
    };
    let buf = encode_to_buf(&mut sender, frame);

    // Drop the first segment entirely; the second arrives with seq=1.
    let segment_len = 5 + 14 + 16;
    let mut wire = BytesMut::from(&buf[segment_len..]);
    let mut receiver = FrameCodec::new(16);
    assert!(receiver.decode(&mut wire).is_err());
}

#[test]
fn test_declared_length_over_limit_rejected() {
    let mut codec = FrameCodec::default();
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&[9u8]);
    buf.extend_from_slice(&(u32::MAX).to_le_bytes());
    assert!(codec.decode(&mut buf).is_err());
}
