//! Length-prefixed frame codec with oversize-payload segmentation.
//!
//! On the wire every frame is `u8 kind, u32 length, payload`. The encoder
//! splits any payload above the segment size into `Segment` frames
//! (`frame_id:u64, seq:u32, final:u8, inner_kind:u8, bytes`); the decoder
//! reassembles them per frame id before handing the frame up. Segmentation
//! keeps one huge compile payload from monopolizing the connection: the
//! writer can interleave heartbeats between segments.

use std::collections::HashMap;

use bytes::Buf;
use bytes::BufMut;
use bytes::Bytes;
use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tokio_util::codec::Encoder;

use crate::DEFAULT_SEGMENT_SIZE;
use crate::error::ProtocolError;
use crate::error::protocol_error;
use crate::wire::MAX_FIELD_LEN;

/// Frame header: kind byte plus little-endian length.
const HEADER_LEN: usize = 5;

/// Segment payload prefix: frame id, sequence index, final flag, inner kind.
const SEGMENT_PREFIX_LEN: usize = 8 + 4 + 1 + 1;

/// Hard ceiling on any single wire frame and on a reassembled payload.
const MAX_FRAME_LEN: usize = MAX_FIELD_LEN + 4096;

const SEGMENT_KIND: u8 = 1;

/// A frame below the typed layer: kind id plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub kind: u8,
    pub payload: Bytes,
}

#[derive(Debug)]
struct Assembly {
    inner_kind: u8,
    next_seq: u32,
    data: BytesMut,
}

/// Codec state for one connection.
#[derive(Debug)]
pub struct FrameCodec {
    segment_size: usize,
    next_frame_id: u64,
    partial: HashMap<u64, Assembly>,
}

impl FrameCodec {
    pub fn new(segment_size: usize) -> Self {
        Self {
            segment_size,
            next_frame_id: 1,
            partial: HashMap::new(),
        }
    }

    fn write_frame(dst: &mut BytesMut, kind: u8, payload: &[u8]) {
        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u8(kind);
        dst.put_u32_le(payload.len() as u32);
        dst.put_slice(payload);
    }

    fn decode_segment(&mut self, mut payload: Bytes) -> Result<Option<RawFrame>, ProtocolError> {
        if payload.len() < SEGMENT_PREFIX_LEN {
            return Err(protocol_error::TruncatedSnafu {
                what: "segment prefix",
                needed: SEGMENT_PREFIX_LEN - payload.len(),
            }
            .build());
        }
        let frame_id = payload.get_u64_le();
        let seq = payload.get_u32_le();
        let is_final = payload.get_u8() != 0;
        let inner_kind = payload.get_u8();

        let assembly = self.partial.entry(frame_id).or_insert_with(|| Assembly {
            inner_kind,
            next_seq: 0,
            data: BytesMut::new(),
        });
        if seq != assembly.next_seq || inner_kind != assembly.inner_kind {
            self.partial.remove(&frame_id);
            return Err(protocol_error::MalformedSnafu {
                what: format!("segment {seq} of frame {frame_id} out of order"),
            }
            .build());
        }
        if assembly.data.len() + payload.len() > MAX_FRAME_LEN {
            self.partial.remove(&frame_id);
            return Err(protocol_error::MalformedSnafu {
                what: format!("reassembled frame {frame_id} exceeds limit"),
            }
            .build());
        }
        assembly.next_seq += 1;
        assembly.data.extend_from_slice(&payload);

        if !is_final {
            return Ok(None);
        }
        match self.partial.remove(&frame_id) {
            Some(assembly) => Ok(Some(RawFrame {
                kind: assembly.inner_kind,
                payload: assembly.data.freeze(),
            })),
            None => Err(protocol_error::MalformedSnafu {
                what: format!("final segment for unknown frame {frame_id}"),
            }
            .build()),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SEGMENT_SIZE)
    }
}

impl Encoder<RawFrame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: RawFrame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if frame.payload.len() <= self.segment_size {
            Self::write_frame(dst, frame.kind, &frame.payload);
            return Ok(());
        }

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        let chunks: Vec<&[u8]> = frame.payload.chunks(self.segment_size).collect();
        let last = chunks.len() - 1;
        for (seq, chunk) in chunks.into_iter().enumerate() {
            let mut payload = BytesMut::with_capacity(SEGMENT_PREFIX_LEN + chunk.len());
            payload.put_u64_le(frame_id);
            payload.put_u32_le(seq as u32);
            payload.put_u8(u8::from(seq == last));
            payload.put_u8(frame.kind);
            payload.put_slice(chunk);
            Self::write_frame(dst, SEGMENT_KIND, &payload);
        }
        Ok(())
    }
}

impl Decoder for FrameCodec {
    type Item = RawFrame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }
            let len = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;
            if len > MAX_FRAME_LEN {
                return Err(protocol_error::MalformedSnafu {
                    what: format!("frame length {len} exceeds limit"),
                }
                .build());
            }
            if src.len() < HEADER_LEN + len {
                src.reserve(HEADER_LEN + len - src.len());
                return Ok(None);
            }
            let kind = src[0];
            src.advance(HEADER_LEN);
            let payload = src.split_to(len).freeze();

            if kind == SEGMENT_KIND {
                // A non-final segment consumes bytes without yielding a
                // frame; keep scanning the buffer for the next one.
                match self.decode_segment(payload)? {
                    Some(frame) => return Ok(Some(frame)),
                    None => continue,
                }
            }
            return Ok(Some(RawFrame { kind, payload }));
        }
    }
}

#[cfg(test)]
#[path = "codec.test.rs"]
mod tests;
