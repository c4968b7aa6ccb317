use bytes::BytesMut;
use pretty_assertions::assert_eq;

use super::*;

const SAMPLE: &[u8] = b"#line 1 \"foo.cpp\"\nint main() { return 0; }\n";

#[test]
fn test_none_is_identity() {
    let out = compress(SAMPLE, CompressionInfo::NONE).unwrap();
    assert_eq!(out, SAMPLE);
    let back = decompress(&out, CompressionInfo::NONE).unwrap();
    assert_eq!(back, SAMPLE);
}

#[test]
fn test_gzip_round_trip() {
    let info = CompressionInfo::new(CompressionType::Gzip, 6);
    let packed = compress(SAMPLE, info).unwrap();
    assert_ne!(packed, SAMPLE);
    assert_eq!(decompress(&packed, info).unwrap(), SAMPLE);
}

#[test]
fn test_lz4_round_trip() {
    let info = CompressionInfo::new(CompressionType::Lz4, 0);
    let packed = compress(SAMPLE, info).unwrap();
    assert_eq!(decompress(&packed, info).unwrap(), SAMPLE);
}

#[test]
fn test_zstd_round_trip() {
    let info = CompressionInfo::new(CompressionType::ZStd, 3);
    let packed = compress(SAMPLE, info).unwrap();
    assert_eq!(decompress(&packed, info).unwrap(), SAMPLE);
}

#[test]
fn test_level_is_advisory() {
    // Out-of-range levels are clamped, not rejected.
    let info = CompressionInfo::new(CompressionType::Gzip, 127);
    let packed = compress(SAMPLE, info).unwrap();
    assert_eq!(decompress(&packed, info).unwrap(), SAMPLE);
}

#[test]
fn test_unknown_type_rejected() {
    assert!(CompressionType::from_u8(200).is_err());
}

#[test]
fn test_envelope_round_trip() {
    let info = CompressionInfo::new(CompressionType::ZStd, 5);
    let packed = compress(SAMPLE, info).unwrap();

    let mut buf = BytesMut::new();
    put_envelope(&mut buf, &packed, info);

    let mut read = buf.freeze();
    let (read_info, read_data) = get_envelope(&mut read, "file_data").unwrap();
    assert_eq!(read_info, info);
    assert_eq!(read_data, packed);
    assert_eq!(decompress(&read_data, read_info).unwrap(), SAMPLE);
}

#[test]
fn test_envelope_with_unknown_codec_rejected() {
    let mut buf = BytesMut::new();
    buf.put_u8(9); // no such codec
    buf.put_i8(0);
    crate::wire::put_bytes(&mut buf, b"data");

    let mut read = buf.freeze();
    assert!(get_envelope(&mut read, "file_data").is_err());
}

#[test]
fn test_corrupt_gzip_data_fails_cleanly() {
    let info = CompressionInfo::new(CompressionType::Gzip, 6);
    assert!(decompress(b"not gzip at all", info).is_err());
}
