//! Response decoding.

use crate::codes::{keys, STATUS_ERROR_FLAG, STATUS_OK};
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::request::field;
use rmpv::Value;
use serde::de::DeserializeOwned;

/// Message used when an error response carries no error text.
pub const INTERNAL_ERROR: &str = "internal error";

/// A decoded response: status from the header, data/error from the body.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u32,
    pub sync: u64,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl Response {
    pub fn ok(sync: u64, data: Value) -> Self {
        Self {
            status: STATUS_OK,
            sync,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(sync: u64, code: u32, message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR_FLAG | code,
            sync,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Builds a response from a decoded frame.
    ///
    /// The header must be a map carrying the status and sync. A missing or
    /// non-map body is treated as empty.
    pub fn from_frame(frame: Frame) -> Result<Self, ProtocolError> {
        if !frame.header.is_map() {
            return Err(ProtocolError::UnexpectedType {
                what: "response header",
                expected: "map",
            });
        }

        let status = field(&frame.header, keys::REQUEST_TYPE)
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::InvalidHeader("missing status"))?;
        let status =
            u32::try_from(status).map_err(|_| ProtocolError::InvalidHeader("status out of range"))?;
        let sync = field(&frame.header, keys::SYNC)
            .and_then(Value::as_u64)
            .ok_or(ProtocolError::InvalidHeader("missing sync"))?;

        let (data, error) = match frame.body {
            Some(ref body) if body.is_map() => (
                field(body, keys::DATA).cloned(),
                field(body, keys::ERROR)
                    .and_then(Value::as_str)
                    .map(str::to_string),
            ),
            _ => (None, None),
        };

        Ok(Self {
            status,
            sync,
            data,
            error,
        })
    }

    /// Decodes a response from a frame payload.
    pub fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_frame(Frame::from_payload(payload)?)
    }

    /// Encodes the response body, as a server would send it.
    pub fn body(&self) -> Value {
        let mut fields = Vec::new();
        if let Some(ref data) = self.data {
            fields.push((Value::from(keys::DATA), data.clone()));
        }
        if let Some(ref error) = self.error {
            fields.push((Value::from(keys::ERROR), Value::from(error.as_str())));
        }
        Value::Map(fields)
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn is_error(&self) -> bool {
        !self.is_ok()
    }

    /// Server error code (status without the error flag), if this is an error.
    pub fn error_code(&self) -> Option<u32> {
        if self.status & STATUS_ERROR_FLAG != 0 {
            Some(self.status & !STATUS_ERROR_FLAG)
        } else if self.is_error() {
            Some(self.status)
        } else {
            None
        }
    }

    /// Error text, falling back to a generic message.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or(INTERNAL_ERROR)
    }

    /// Returns the data tuples; absent data is an empty list.
    pub fn into_tuples(self) -> Vec<Value> {
        match self.data {
            Some(Value::Array(tuples)) => tuples,
            Some(Value::Nil) | None => Vec::new(),
            Some(other) => vec![other],
        }
    }

    /// Deserializes the data tuples into `T`.
    pub fn decode_data<T: DeserializeOwned>(self) -> Result<T, ProtocolError> {
        let data = Value::Array(self.into_tuples());
        rmpv::ext::from_value(data).map_err(|e| ProtocolError::Decode(e.to_string()))
    }
}
