//! Length-prefixed MessagePack frames.
//!
//! Frame layout:
//!
//! ```text
//! +--------------------+----------------+------------------+
//! | len (msgpack u32)  | header (map)   | body (map)       |
//! | 5 bytes: 0xce + BE | variable       | variable, opt.   |
//! +--------------------+----------------+------------------+
//! ```
//!
//! `len` is always the exact byte length of header + body.

use crate::error::ProtocolError;
use crate::MAX_FRAME_SIZE;
use bytes::{Buf, BufMut, BytesMut};
use rmpv::Value;
use std::io;

/// Size of the encoded length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 5;

/// MessagePack marker for a big-endian u32.
const U32_MARKER: u8 = 0xce;

/// Encodes a header and optional body into a length-prefixed frame.
pub fn encode_frame(header: &Value, body: Option<&Value>) -> Result<BytesMut, ProtocolError> {
    let mut payload = Vec::with_capacity(64);
    write_value(&mut payload, header)?;
    if let Some(body) = body {
        write_value(&mut payload, body)?;
    }

    let size = payload.len() as u64;
    if size > MAX_FRAME_SIZE as u64 {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u8(U32_MARKER);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    Ok(buf)
}

/// Decodes the length prefix at the start of `bytes`.
pub fn decode_length_prefix(bytes: &[u8]) -> Result<usize, ProtocolError> {
    if bytes.len() < LENGTH_PREFIX_SIZE {
        return Err(ProtocolError::InvalidSize);
    }

    // Always a u32 marker; shorter integer encodings would eat payload bytes.
    if bytes[0] != U32_MARKER {
        return Err(ProtocolError::InvalidSize);
    }
    let size = u64::from(u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]));

    if size > MAX_FRAME_SIZE as u64 {
        return Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(size as usize)
}

/// Decodes every packed value in `bytes`, in order.
///
/// A buffer that ends in the middle of a value is an invalid size.
pub fn decode_objects(bytes: &[u8]) -> Result<Vec<Value>, ProtocolError> {
    let mut cursor = bytes;
    let mut values = Vec::with_capacity(2);
    while !cursor.is_empty() {
        let value = rmpv::decode::read_value(&mut cursor).map_err(decode_error)?;
        values.push(value);
    }
    Ok(values)
}

fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), ProtocolError> {
    rmpv::encode::write_value(buf, value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

fn decode_error(err: rmpv::decode::Error) -> ProtocolError {
    match err {
        rmpv::decode::Error::InvalidMarkerRead(ref e)
        | rmpv::decode::Error::InvalidDataRead(ref e)
            if e.kind() == io::ErrorKind::UnexpectedEof =>
        {
            ProtocolError::InvalidSize
        }
        other => ProtocolError::Decode(other.to_string()),
    }
}

/// A decoded frame: header map and optional body map.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Value,
    pub body: Option<Value>,
}

impl Frame {
    pub fn new(header: Value, body: Option<Value>) -> Self {
        Self { header, body }
    }

    /// Encodes the frame into bytes, length prefix included.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        encode_frame(&self.header, self.body.as_ref())
    }

    /// Parses a frame payload (the bytes following the length prefix).
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut values = decode_objects(payload)?.into_iter();
        let header = values
            .next()
            .ok_or(ProtocolError::InvalidHeader("empty payload"))?;
        let body = values.next();
        if values.next().is_some() {
            return Err(ProtocolError::InvalidSize);
        }
        Ok(Self { header, body })
    }

    /// Decodes a frame from a stream buffer.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let size = decode_length_prefix(&buf[..])?;
        if buf.len() < LENGTH_PREFIX_SIZE + size {
            return Ok(None);
        }

        buf.advance(LENGTH_PREFIX_SIZE);
        let payload = buf.split_to(size).freeze();
        Self::from_payload(&payload).map(Some)
    }
}
