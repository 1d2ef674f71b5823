//! # iproto-protocol
//!
//! Wire protocol implementation for IProto.
//!
//! This crate provides:
//! - Length-prefixed MessagePack framing (header map + optional body map)
//! - Request/response codes, body field keys and iterator types
//! - Greeting parsing and the CHAP-SHA1 authentication scramble
//! - Request body builders for every supported command
//! - Response decoding into a uniform status/data/error shape

pub mod codec;
pub mod codes;
pub mod error;
pub mod frame;
pub mod greeting;
pub mod request;
pub mod response;

pub use codec::{Decoder, Encoder, IncomingRequest};
pub use codes::{
    keys, next_request_id, CallSemantics, IteratorType, RequestType, STATUS_ERROR_FLAG, STATUS_OK,
};
pub use error::ProtocolError;
pub use frame::{decode_length_prefix, decode_objects, encode_frame, Frame, LENGTH_PREFIX_SIZE};
pub use greeting::{scramble, xor, Greeting, GREETING_SIZE, SCRAMBLE_SIZE};
pub use request::{Key, SelectOptions, UpdateOp};
pub use response::Response;

pub use rmpv::Value;

/// Default port for IProto servers.
pub const DEFAULT_PORT: u16 = 3301;

/// Maximum accepted frame payload size (16 MiB).
pub const MAX_FRAME_SIZE: u32 = 16 * 1024 * 1024;

/// Correlation ids wrap at this modulus.
pub const REQUEST_ID_LIMIT: u64 = 1 << 32;
