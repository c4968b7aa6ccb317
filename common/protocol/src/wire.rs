//! Little-endian primitive readers and writers over [`bytes`] buffers.
//!
//! Every read checks the remaining length first; the raw `Buf` accessors
//! panic on underflow and a malformed peer must never be able to do that.

use bytes::Buf;
use bytes::BufMut;

use crate::error::Result;
use crate::error::protocol_error;

/// Largest length any single field may declare (64 MiB). A compile unit's
/// preprocessed output stays well under this.
pub const MAX_FIELD_LEN: usize = 64 * 1024 * 1024;

pub fn get_u8(buf: &mut impl Buf, what: &'static str) -> Result<u8> {
    ensure_remaining(buf, 1, what)?;
    Ok(buf.get_u8())
}

pub fn get_i8(buf: &mut impl Buf, what: &'static str) -> Result<i8> {
    ensure_remaining(buf, 1, what)?;
    Ok(buf.get_i8())
}

pub fn get_u16(buf: &mut impl Buf, what: &'static str) -> Result<u16> {
    ensure_remaining(buf, 2, what)?;
    Ok(buf.get_u16_le())
}

pub fn get_u32(buf: &mut impl Buf, what: &'static str) -> Result<u32> {
    ensure_remaining(buf, 4, what)?;
    Ok(buf.get_u32_le())
}

pub fn get_u64(buf: &mut impl Buf, what: &'static str) -> Result<u64> {
    ensure_remaining(buf, 8, what)?;
    Ok(buf.get_u64_le())
}

pub fn put_string(buf: &mut impl BufMut, s: &str) {
    buf.put_u32_le(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

pub fn get_string(buf: &mut impl Buf, what: &'static str) -> Result<String> {
    let bytes = get_bytes(buf, what)?;
    String::from_utf8(bytes).map_err(|_| protocol_error::InvalidUtf8Snafu { what }.build())
}

pub fn put_bytes(buf: &mut impl BufMut, data: &[u8]) {
    buf.put_u32_le(data.len() as u32);
    buf.put_slice(data);
}

pub fn get_bytes(buf: &mut impl Buf, what: &'static str) -> Result<Vec<u8>> {
    let len = get_u32(buf, what)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(protocol_error::MalformedSnafu {
            what: format!("{what} length {len} exceeds limit"),
        }
        .build());
    }
    ensure_remaining(buf, len, what)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

pub fn put_string_list(buf: &mut impl BufMut, items: &[String]) {
    buf.put_u32_le(items.len() as u32);
    for item in items {
        put_string(buf, item);
    }
}

pub fn get_string_list(buf: &mut impl Buf, what: &'static str) -> Result<Vec<String>> {
    let count = get_u32(buf, what)? as usize;
    let mut out = Vec::with_capacity(count.min(1024));
    for _ in 0..count {
        out.push(get_string(buf, what)?);
    }
    Ok(out)
}

pub fn put_string_map(buf: &mut impl BufMut, map: &std::collections::BTreeMap<String, String>) {
    buf.put_u32_le(map.len() as u32);
    for (key, value) in map {
        put_string(buf, key);
        put_string(buf, value);
    }
}

pub fn get_string_map(
    buf: &mut impl Buf,
    what: &'static str,
) -> Result<std::collections::BTreeMap<String, String>> {
    let count = get_u32(buf, what)? as usize;
    let mut out = std::collections::BTreeMap::new();
    for _ in 0..count {
        let key = get_string(buf, what)?;
        let value = get_string(buf, what)?;
        out.insert(key, value);
    }
    Ok(out)
}

fn ensure_remaining(buf: &impl Buf, needed: usize, what: &'static str) -> Result<()> {
    if buf.remaining() < needed {
        return Err(protocol_error::TruncatedSnafu {
            what,
            needed: needed - buf.remaining(),
        }
        .build());
    }
    Ok(())
}

#[cfg(test)]
#[path = "wire.test.rs"]
mod tests;
