//! Request headers and command bodies.
//!
//! Every builder returns the body map with integer keys from [`keys`].
//! Names must already be resolved to numeric space/index ids.

use crate::codes::{keys, IteratorType, RequestType};
use crate::greeting::CHAP_SHA1;
use rmpv::Value;

/// Builds a request header map.
pub fn header(request_type: RequestType, sync: u64) -> Value {
    Value::Map(vec![
        (Value::from(keys::REQUEST_TYPE), Value::from(request_type.code())),
        (Value::from(keys::SYNC), Value::from(sync)),
    ])
}

fn body(fields: Vec<(u8, Value)>) -> Value {
    Value::Map(
        fields
            .into_iter()
            .map(|(key, value)| (Value::from(key), value))
            .collect(),
    )
}

/// A lookup key: nothing, a single scalar, or a composite of parts.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Key {
    #[default]
    Empty,
    Scalar(Value),
    Composite(Vec<Value>),
}

impl Key {
    /// Normalizes the key to the array form sent on the wire.
    pub fn into_parts(self) -> Vec<Value> {
        match self {
            Key::Empty => Vec::new(),
            Key::Scalar(value) => vec![value],
            Key::Composite(parts) => parts,
        }
    }

    fn into_value(self) -> Value {
        Value::Array(self.into_parts())
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        match value {
            Value::Nil => Key::Empty,
            Value::Array(parts) => Key::Composite(parts),
            scalar => Key::Scalar(scalar),
        }
    }
}

impl From<()> for Key {
    fn from(_: ()) -> Self {
        Key::Empty
    }
}

impl From<Vec<Value>> for Key {
    fn from(parts: Vec<Value>) -> Self {
        Key::Composite(parts)
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(key: Option<T>) -> Self {
        key.map(Into::into).unwrap_or_default()
    }
}

macro_rules! scalar_key {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Key {
                fn from(value: $ty) -> Self {
                    Key::Scalar(Value::from(value))
                }
            }
        )*
    };
}

scalar_key!(i32, i64, u32, u64, bool, &str, String);

/// Options for select requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectOptions {
    /// Maximum tuples to return; `None` sends the largest representable limit.
    pub limit: Option<u32>,
    pub offset: u32,
    pub iterator: IteratorType,
}

impl SelectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn iterator(mut self, iterator: IteratorType) -> Self {
        self.iterator = iterator;
        self
    }

    /// Sets the iterator by console name; unknown names select `EQ`.
    pub fn iterator_name(mut self, name: &str) -> Self {
        self.iterator = IteratorType::from_name_or_default(name);
        self
    }

    /// Limit sent on the wire.
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(u32::MAX)
    }
}

/// One update/upsert operation: `(operator, field, args...)`.
///
/// `field` uses console numbering, where the primary key is field 1.
/// The wire does not count the primary key, so the position is sent
/// decremented by one.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOp {
    operator: String,
    field: i64,
    args: Vec<Value>,
}

impl UpdateOp {
    pub fn new(operator: impl Into<String>, field: i64, value: impl Into<Value>) -> Self {
        Self {
            operator: operator.into(),
            field,
            args: vec![value.into()],
        }
    }

    /// Builds an operation with an arbitrary argument list.
    pub fn with_args(operator: impl Into<String>, field: i64, args: Vec<Value>) -> Self {
        Self {
            operator: operator.into(),
            field,
            args,
        }
    }

    pub fn assign(field: i64, value: impl Into<Value>) -> Self {
        Self::new("=", field, value)
    }

    pub fn add(field: i64, value: impl Into<Value>) -> Self {
        Self::new("+", field, value)
    }

    pub fn subtract(field: i64, value: impl Into<Value>) -> Self {
        Self::new("-", field, value)
    }

    pub fn bit_and(field: i64, value: u64) -> Self {
        Self::new("&", field, value)
    }

    pub fn bit_or(field: i64, value: u64) -> Self {
        Self::new("|", field, value)
    }

    pub fn bit_xor(field: i64, value: u64) -> Self {
        Self::new("^", field, value)
    }

    /// Deletes `count` fields starting at `field`.
    pub fn delete(field: i64, count: u32) -> Self {
        Self::new("#", field, count)
    }

    /// Inserts `value` before `field`.
    pub fn insert(field: i64, value: impl Into<Value>) -> Self {
        Self::new("!", field, value)
    }

    /// Replaces `length` characters at `offset` of a string field.
    pub fn splice(field: i64, offset: i64, length: i64, replacement: &str) -> Self {
        Self::with_args(
            ":",
            field,
            vec![
                Value::from(offset),
                Value::from(length),
                Value::from(replacement),
            ],
        )
    }

    pub fn operator(&self) -> &str {
        &self.operator
    }

    pub fn field(&self) -> i64 {
        self.field
    }

    /// Field position as sent on the wire.
    pub fn wire_field(&self) -> i64 {
        self.field - 1
    }

    fn to_value(&self) -> Value {
        let mut parts = Vec::with_capacity(2 + self.args.len());
        parts.push(Value::from(self.operator.as_str()));
        parts.push(Value::from(self.wire_field()));
        parts.extend(self.args.iter().cloned());
        Value::Array(parts)
    }
}

/// Encodes an operator list with every field position renumbered.
pub fn operations(ops: &[UpdateOp]) -> Value {
    Value::Array(ops.iter().map(UpdateOp::to_value).collect())
}

pub fn select(space_id: u32, index_id: u32, key: Key, options: &SelectOptions) -> Value {
    body(vec![
        (keys::SPACE_ID, Value::from(space_id)),
        (keys::INDEX_ID, Value::from(index_id)),
        (keys::LIMIT, Value::from(options.effective_limit())),
        (keys::OFFSET, Value::from(options.offset)),
        (keys::ITERATOR, Value::from(options.iterator.code())),
        (keys::KEY, key.into_value()),
    ])
}

/// Body for insert and replace; both carry the full tuple.
pub fn insert(space_id: u32, tuple: Vec<Value>) -> Value {
    body(vec![
        (keys::SPACE_ID, Value::from(space_id)),
        (keys::TUPLE, Value::Array(tuple)),
    ])
}

pub fn delete(space_id: u32, key: Key) -> Value {
    body(vec![
        (keys::SPACE_ID, Value::from(space_id)),
        (keys::KEY, key.into_value()),
    ])
}

pub fn update(space_id: u32, index_id: u32, key: Key, ops: &[UpdateOp]) -> Value {
    body(vec![
        (keys::SPACE_ID, Value::from(space_id)),
        (keys::INDEX_ID, Value::from(index_id)),
        (keys::KEY, key.into_value()),
        (keys::TUPLE, operations(ops)),
    ])
}

pub fn upsert(space_id: u32, key: Key, ops: &[UpdateOp], tuple: Vec<Value>) -> Value {
    body(vec![
        (keys::SPACE_ID, Value::from(space_id)),
        (keys::KEY, key.into_value()),
        (keys::TUPLE, Value::Array(tuple)),
        (keys::OPS, operations(ops)),
    ])
}

pub fn call(function: &str, args: Vec<Value>) -> Value {
    body(vec![
        (keys::FUNCTION_NAME, Value::from(function)),
        (keys::TUPLE, Value::Array(args)),
    ])
}

pub fn eval(expression: &str, args: Vec<Value>) -> Value {
    body(vec![
        (keys::EXPR, Value::from(expression)),
        (keys::TUPLE, Value::Array(args)),
    ])
}

pub fn auth(user: &str, scramble: &[u8]) -> Value {
    body(vec![
        (keys::USER_NAME, Value::from(user)),
        (
            keys::TUPLE,
            Value::Array(vec![
                Value::from(CHAP_SHA1),
                Value::Binary(scramble.to_vec()),
            ]),
        ),
    ])
}

/// Looks up `key` in a body map.
pub fn field(map: &Value, key: u8) -> Option<&Value> {
    map.as_map()?
        .iter()
        .find(|(k, _)| k.as_u64() == Some(key as u64))
        .map(|(_, v)| v)
}
