//! Compression envelope for file payloads.
//!
//! Every variable payload on the wire is wrapped as
//! `type:u8, level:i8, length:u32, bytes[length]`. The envelope is written
//! by [`put_envelope`] / read by [`get_envelope`] without touching the data;
//! [`compress`] / [`decompress`] transcode the bytes themselves. Level is
//! advisory: each codec clamps it to its own valid range.

use std::io::Read;
use std::io::Write;

use bytes::Buf;
use bytes::BufMut;
use serde::Deserialize;
use serde::Serialize;
use snafu::ResultExt;

use crate::error::Result;
use crate::error::protocol_error;
use crate::wire;

/// Compression codec identifier carried inside every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    #[default]
    None,
    Gzip,
    Lz4,
    ZStd,
}

impl CompressionType {
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Gzip => 1,
            Self::Lz4 => 2,
            Self::ZStd => 3,
        }
    }

    pub fn from_u8(id: u8) -> Result<Self> {
        match id {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            2 => Ok(Self::Lz4),
            3 => Ok(Self::ZStd),
            _ => Err(protocol_error::UnsupportedCompressionSnafu { id }.build()),
        }
    }
}

/// Codec plus advisory level, carried alongside every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompressionInfo {
    #[serde(rename = "type", default)]
    pub codec: CompressionType,
    #[serde(default)]
    pub level: i8,
}

impl CompressionInfo {
    pub const NONE: Self = Self {
        codec: CompressionType::None,
        level: 0,
    };

    pub fn new(codec: CompressionType, level: i8) -> Self {
        Self { codec, level }
    }
}

/// Compress `data` according to `info`. `None` never fails.
pub fn compress(data: &[u8], info: CompressionInfo) -> Result<Vec<u8>> {
    match info.codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Gzip => {
            let level = info.level.clamp(0, 9) as u32;
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::new(level));
            encoder
                .write_all(data)
                .context(protocol_error::CodecSnafu { codec: "gzip" })?;
            encoder
                .finish()
                .context(protocol_error::CodecSnafu { codec: "gzip" })
        }
        CompressionType::Lz4 => {
            let mode = match info.level {
                0 => None,
                level if level > 0 => Some(lz4::block::CompressionMode::HIGHCOMPRESSION(
                    i32::from(level).clamp(1, 12),
                )),
                level => Some(lz4::block::CompressionMode::FAST(-i32::from(level))),
            };
            lz4::block::compress(data, mode, true)
                .context(protocol_error::CodecSnafu { codec: "lz4" })
        }
        CompressionType::ZStd => {
            let level = i32::from(info.level).clamp(0, 21);
            zstd::stream::encode_all(data, level)
                .context(protocol_error::CodecSnafu { codec: "zstd" })
        }
    }
}

/// Decompress `data` according to `info`.
pub fn decompress(data: &[u8], info: CompressionInfo) -> Result<Vec<u8>> {
    match info.codec {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Gzip => {
            let mut decoder = flate2::read::GzDecoder::new(data);
            let mut out = Vec::new();
            decoder
                .read_to_end(&mut out)
                .context(protocol_error::CodecSnafu { codec: "gzip" })?;
            Ok(out)
        }
        CompressionType::Lz4 => lz4::block::decompress(data, None)
            .context(protocol_error::CodecSnafu { codec: "lz4" }),
        CompressionType::ZStd => {
            zstd::stream::decode_all(data).context(protocol_error::CodecSnafu { codec: "zstd" })
        }
    }
}

/// Write an envelope: codec, level, then the (already transcoded) bytes.
pub fn put_envelope(buf: &mut impl BufMut, data: &[u8], info: CompressionInfo) {
    buf.put_u8(info.codec.as_u8());
    buf.put_i8(info.level);
    wire::put_bytes(buf, data);
}

/// Read an envelope back as `(info, bytes)`, leaving the bytes compressed.
pub fn get_envelope(buf: &mut impl Buf, what: &'static str) -> Result<(CompressionInfo, Vec<u8>)> {
    let codec = CompressionType::from_u8(wire::get_u8(buf, what)?)?;
    let level = wire::get_i8(buf, what)?;
    let data = wire::get_bytes(buf, what)?;
    Ok((CompressionInfo::new(codec, level), data))
}

#[cfg(test)]
#[path = "compress.test.rs"]
mod tests;
