//! Protocol constants: header and body keys, request codes, iterators.

use crate::error::ProtocolError;
use crate::REQUEST_ID_LIMIT;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer keys used in header and body maps.
pub mod keys {
    pub const REQUEST_TYPE: u8 = 0x00;
    pub const SYNC: u8 = 0x01;

    pub const SPACE_ID: u8 = 0x10;
    pub const INDEX_ID: u8 = 0x11;
    pub const LIMIT: u8 = 0x12;
    pub const OFFSET: u8 = 0x13;
    pub const ITERATOR: u8 = 0x14;

    pub const KEY: u8 = 0x20;
    pub const TUPLE: u8 = 0x21;
    pub const FUNCTION_NAME: u8 = 0x22;
    pub const USER_NAME: u8 = 0x23;
    pub const EXPR: u8 = 0x27;
    /// Operator list for update/upsert (`def_tuple`).
    pub const OPS: u8 = 0x28;

    pub const DATA: u8 = 0x30;
    pub const ERROR: u8 = 0x31;
}

/// Response status for a successful request.
pub const STATUS_OK: u32 = 0x00;

/// Any status with this bit set is an error; the low bits carry the error code.
pub const STATUS_ERROR_FLAG: u32 = 0x8000;

/// Request command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestType {
    Select = 0x01,
    Insert = 0x02,
    Replace = 0x03,
    Update = 0x04,
    Delete = 0x05,
    /// Legacy call: every returned value is wrapped into a tuple.
    CallOld = 0x06,
    Auth = 0x07,
    Eval = 0x08,
    Upsert = 0x09,
    Call = 0x0a,
    Ping = 0x40,
}

impl RequestType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        let ty = match code {
            0x01 => RequestType::Select,
            0x02 => RequestType::Insert,
            0x03 => RequestType::Replace,
            0x04 => RequestType::Update,
            0x05 => RequestType::Delete,
            0x06 => RequestType::CallOld,
            0x07 => RequestType::Auth,
            0x08 => RequestType::Eval,
            0x09 => RequestType::Upsert,
            0x0a => RequestType::Call,
            0x40 => RequestType::Ping,
            _ => return None,
        };
        Some(ty)
    }

    /// Returns whether requests of this type carry a body map.
    pub fn has_body(self) -> bool {
        self != RequestType::Ping
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestType::Select => "SELECT",
            RequestType::Insert => "INSERT",
            RequestType::Replace => "REPLACE",
            RequestType::Update => "UPDATE",
            RequestType::Delete => "DELETE",
            RequestType::CallOld => "CALL_16",
            RequestType::Auth => "AUTH",
            RequestType::Eval => "EVAL",
            RequestType::Upsert => "UPSERT",
            RequestType::Call => "CALL",
            RequestType::Ping => "PING",
        };
        f.write_str(name)
    }
}

/// Index traversal mode for select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum IteratorType {
    #[default]
    Eq = 0,
    Req = 1,
    All = 2,
    Lt = 3,
    Le = 4,
    Ge = 5,
    Gt = 6,
    BitsetAllSet = 7,
    BitsetAnySet = 8,
    BitsetAllNotSet = 9,
}

impl IteratorType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Looks up an iterator by its console name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let ty = match name.to_ascii_uppercase().as_str() {
            "EQ" => IteratorType::Eq,
            "REQ" => IteratorType::Req,
            "ALL" => IteratorType::All,
            "LT" => IteratorType::Lt,
            "LE" => IteratorType::Le,
            "GE" => IteratorType::Ge,
            "GT" => IteratorType::Gt,
            "BITSET_ALL_SET" | "BITS_ALL_SET" => IteratorType::BitsetAllSet,
            "BITSET_ANY_SET" | "BITS_ANY_SET" => IteratorType::BitsetAnySet,
            "BITSET_ALL_NOT_SET" | "BITS_ALL_NOT_SET" => IteratorType::BitsetAllNotSet,
            _ => return None,
        };
        Some(ty)
    }

    /// Like [`IteratorType::from_name`], but unknown names fall back to `Eq`.
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }
}

/// Which call command is used for stored procedure invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallSemantics {
    /// Legacy `CALL_16`: each returned value is wrapped in an extra array.
    Old,
    /// `CALL`: returned values are passed through as is.
    #[default]
    New,
}

impl CallSemantics {
    pub fn request_type(self) -> RequestType {
        match self {
            CallSemantics::Old => RequestType::CallOld,
            CallSemantics::New => RequestType::Call,
        }
    }
}

impl FromStr for CallSemantics {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "old" | "call_16" => Ok(CallSemantics::Old),
            "new" | "call_17" => Ok(CallSemantics::New),
            _ => Err(ProtocolError::UnknownCallSemantics(s.to_string())),
        }
    }
}

impl fmt::Display for CallSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallSemantics::Old => write!(f, "old"),
            CallSemantics::New => write!(f, "new"),
        }
    }
}

/// Returns the correlation id following `previous`, wrapping at [`REQUEST_ID_LIMIT`].
pub fn next_request_id(previous: u64) -> u64 {
    (previous + 1) % REQUEST_ID_LIMIT
}
