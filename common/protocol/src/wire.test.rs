use bytes::BytesMut;
use pretty_assertions::assert_eq;

use super::*;

#[test]
fn test_string_round_trip() {
    let mut buf = BytesMut::new();
    put_string(&mut buf, "gcc9");
    put_string(&mut buf, "");

    let mut read = buf.freeze();
    assert_eq!(get_string(&mut read, "a").unwrap(), "gcc9");
    assert_eq!(get_string(&mut read, "b").unwrap(), "");
    assert_eq!(read.remaining(), 0);
}

#[test]
fn test_bytes_round_trip() {
    let mut buf = BytesMut::new();
    put_bytes(&mut buf, &[1, 2, 3]);

    let mut read = buf.freeze();
    assert_eq!(get_bytes(&mut read, "data").unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_string_list_round_trip() {
    let args = vec!["-O2".to_string(), "-c".to_string(), "foo.i".to_string()];
    let mut buf = BytesMut::new();
    put_string_list(&mut buf, &args);

    let mut read = buf.freeze();
    assert_eq!(get_string_list(&mut read, "args").unwrap(), args);
}

#[test]
fn test_string_map_round_trip() {
    let mut map = std::collections::BTreeMap::new();
    map.insert("gcc9".to_string(), "9.3.0".to_string());
    map.insert("clang12".to_string(), "12.0.1".to_string());

    let mut buf = BytesMut::new();
    put_string_map(&mut buf, &map);

    let mut read = buf.freeze();
    assert_eq!(get_string_map(&mut read, "versions").unwrap(), map);
}

#[test]
fn test_truncated_read_fails() {
    let mut buf = BytesMut::new();
    buf.put_u32_le(100); // declares 100 bytes, provides none
    let mut read = buf.freeze();
    assert!(get_bytes(&mut read, "data").is_err());
}

#[test]
fn test_underflow_does_not_panic() {
    let mut empty = bytes::Bytes::new();
    assert!(get_u64(&mut empty, "id").is_err());
    assert!(get_u32(&mut empty, "len").is_err());
    assert!(get_u8(&mut empty, "flag").is_err());
}

#[test]
fn test_invalid_utf8_rejected() {
    let mut buf = BytesMut::new();
    put_bytes(&mut buf, &[0xff, 0xfe]);
    let mut read = buf.freeze();
    assert!(get_string(&mut read, "s").is_err());
}

#[test]
fn test_oversize_length_rejected() {
    let mut buf = BytesMut::new();
    buf.put_u32_le((MAX_FIELD_LEN + 1) as u32);
    let mut read = buf.freeze();
    assert!(get_bytes(&mut read, "data").is_err());
}
