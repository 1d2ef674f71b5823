//! # iproto-client
//!
//! Client library for IProto servers.
//!
//! This crate provides:
//! - Async transport sessions over TCP or any tokio byte stream
//! - Greeting, CHAP-SHA1 authentication and the one-at-a-time request engine
//! - Space/index name resolution with a per-connection cache
//! - High-level API for ping, select, insert, replace, update, upsert,
//!   delete, call and eval
//! - Idle session pooling through `set_keepalive`

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod pool;
pub mod schema;
pub mod session;

pub use client::{Client, PONG};
pub use config::ConnectionConfig;
pub use connection::{Connection, ConnectionState};
pub use error::ClientError;
pub use pool::SessionPool;
pub use schema::{Identifier, SchemaCache};
pub use session::{Session, Stream};

pub use iproto_protocol::{CallSemantics, IteratorType, Key, SelectOptions, UpdateOp, Value};
