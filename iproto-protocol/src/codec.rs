//! Encoder and decoder for IProto requests and responses.

use crate::codes::{keys, RequestType};
use crate::error::ProtocolError;
use crate::frame::{encode_frame, Frame};
use crate::request::{self, field};
use crate::response::Response;
use bytes::BytesMut;
use rmpv::Value;

/// Encodes requests and responses into frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request frame. The body is dropped for body-less commands.
    pub fn encode_request(
        request_type: RequestType,
        sync: u64,
        body: Option<&Value>,
    ) -> Result<BytesMut, ProtocolError> {
        let header = request::header(request_type, sync);
        let body = if request_type.has_body() { body } else { None };
        encode_frame(&header, body)
    }

    /// Encodes a response frame.
    pub fn encode_response(response: &Response) -> Result<BytesMut, ProtocolError> {
        let header = Value::Map(vec![
            (Value::from(keys::REQUEST_TYPE), Value::from(response.status)),
            (Value::from(keys::SYNC), Value::from(response.sync)),
        ]);
        encode_frame(&header, Some(&response.body()))
    }
}

/// A request as seen by the receiving side.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingRequest {
    pub code: u8,
    pub sync: u64,
    pub body: Option<Value>,
}

impl IncomingRequest {
    pub fn request_type(&self) -> Option<RequestType> {
        RequestType::from_code(self.code)
    }

    /// Looks up a body field by key.
    pub fn field(&self, key: u8) -> Option<&Value> {
        self.body.as_ref().and_then(|body| field(body, key))
    }
}

/// Decodes frames out of a stream buffer.
pub struct Decoder {
    buffer: BytesMut,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Attempts to decode the next frame from the buffer.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode the next request from the buffer.
    pub fn decode_request(&mut self) -> Result<Option<IncomingRequest>, ProtocolError> {
        let Some(frame) = self.decode_frame()? else {
            return Ok(None);
        };
        if !frame.header.is_map() {
            return Err(ProtocolError::UnexpectedType {
                what: "request header",
                expected: "map",
            });
        }
        let code = field(&frame.header, keys::REQUEST_TYPE)
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::InvalidHeader("missing request type"))?;
        let sync = field(&frame.header, keys::SYNC)
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::InvalidHeader("missing sync"))?;
        Ok(Some(IncomingRequest {
            code: code as u8,
            sync,
            body: frame.body,
        }))
    }

    /// Attempts to decode the next response from the buffer.
    pub fn decode_response(&mut self) -> Result<Option<Response>, ProtocolError> {
        match self.decode_frame()? {
            Some(frame) => Response::from_frame(frame).map(Some),
            None => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Key;

    #[test]
    fn test_request_roundtrip() {
        let body = request::delete(512, Key::from(7));
        let encoded = Encoder::encode_request(RequestType::Delete, 42, Some(&body)).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);

        let decoded = decoder.decode_request().unwrap().unwrap();
        assert_eq!(decoded.request_type(), Some(RequestType::Delete));
        assert_eq!(decoded.sync, 42);
        assert_eq!(decoded.body, Some(body));
    }

    #[test]
    fn test_ping_has_no_body() {
        let stray = Value::Map(vec![]);
        let encoded = Encoder::encode_request(RequestType::Ping, 1, Some(&stray)).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded);
        let decoded = decoder.decode_request().unwrap().unwrap();
        assert_eq!(decoded.request_type(), Some(RequestType::Ping));
        assert!(decoded.body.is_none());
    }

    #[test]
    fn test_partial_frame_decoding() {
        let encoded = Encoder::encode_response(&Response::ok(1, Value::Array(vec![]))).unwrap();

        let mut decoder = Decoder::new();
        decoder.extend(&encoded[..3]);
        assert!(decoder.decode_response().unwrap().is_none());

        decoder.extend(&encoded[3..]);
        let decoded = decoder.decode_response().unwrap().unwrap();
        assert_eq!(decoded.sync, 1);
        assert!(decoded.is_ok());
    }

    #[test]
    fn test_incoming_request_field() {
        let body = request::call("echo", vec![Value::from(1)]);
        let encoded = Encoder::encode_request(RequestType::Call, 5, Some(&body)).unwrap();

        let mut decoder = Decoder::default();
        decoder.extend(&encoded);
        let decoded = decoder.decode_request().unwrap().unwrap();
        assert_eq!(
            decoded.field(keys::FUNCTION_NAME).and_then(Value::as_str),
            Some("echo")
        );
        assert_eq!(decoder.buffered(), 0);
    }
}
