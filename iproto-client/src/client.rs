//! High-level client API.

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::ClientError;
use crate::pool::SessionPool;
use crate::schema::Identifier;
use crate::session::{Session, Stream};
use iproto_protocol::{request, Key, RequestType, SelectOptions, UpdateOp, Value};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Token returned by a successful ping.
pub const PONG: &str = "PONG";

/// High-level client for IProto servers.
pub struct Client<S = TcpStream> {
    conn: Connection<S>,
}

impl Client<TcpStream> {
    /// Connects to the server, reusing a pooled session when possible.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        self.conn.connect().await
    }
}

impl<S: Stream> Client<S> {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            conn: Connection::new(config),
        }
    }

    pub fn from_connection(conn: Connection<S>) -> Self {
        Self { conn }
    }

    /// Uses `pool` for `set_keepalive` and pooled reuse.
    pub fn with_pool(mut self, pool: Arc<SessionPool<S>>) -> Self {
        self.conn = self.conn.with_pool(pool);
        self
    }

    /// Attaches an already open session and runs the handshake.
    pub async fn attach(&mut self, session: Session<S>) -> Result<(), ClientError> {
        self.conn.attach(session).await
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_connected()
    }

    pub fn connection(&self) -> &Connection<S> {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut Connection<S> {
        &mut self.conn
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.conn.set_timeout(timeout);
    }

    /// Closes the connection.
    pub async fn disconnect(&mut self) {
        self.conn.disconnect().await;
    }

    /// Returns the session to the pool instead of closing it.
    pub async fn set_keepalive(&mut self) -> Result<(), ClientError> {
        self.conn.set_keepalive().await
    }

    // =========================================================================
    // Helper methods
    // =========================================================================

    async fn request(
        &mut self,
        request_type: RequestType,
        body: Option<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        let response = self.conn.execute(request_type, None, body).await?;

        if let Some(code) = response.error_code() {
            return Err(ClientError::ServerError {
                code,
                message: response.error_message().to_string(),
            });
        }

        Ok(response.into_tuples())
    }

    async fn resolve(
        &mut self,
        space: Identifier,
        index: Identifier,
    ) -> Result<(u32, u32), ClientError> {
        let space_id = self.conn.resolve_space(space).await?;
        let index_id = self.conn.resolve_index(space_id, index).await?;
        Ok((space_id, index_id))
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Pings the server.
    pub async fn ping(&mut self) -> Result<&'static str, ClientError> {
        self.request(RequestType::Ping, None).await?;
        Ok(PONG)
    }

    /// Selects tuples by key from an index.
    pub async fn select(
        &mut self,
        space: impl Into<Identifier>,
        index: impl Into<Identifier>,
        key: impl Into<Key>,
        options: SelectOptions,
    ) -> Result<Vec<Value>, ClientError> {
        let (space_id, index_id) = self.resolve(space.into(), index.into()).await?;
        let body = request::select(space_id, index_id, key.into(), &options);
        self.request(RequestType::Select, Some(body)).await
    }

    /// Selects tuples and deserializes them into `T`.
    pub async fn select_as<T: DeserializeOwned>(
        &mut self,
        space: impl Into<Identifier>,
        index: impl Into<Identifier>,
        key: impl Into<Key>,
        options: SelectOptions,
    ) -> Result<Vec<T>, ClientError> {
        let tuples = self.select(space, index, key, options).await?;
        rmpv::ext::from_value(Value::Array(tuples))
            .map_err(|e| iproto_protocol::ProtocolError::Decode(e.to_string()).into())
    }

    /// Inserts a tuple; fails if the primary key already exists.
    pub async fn insert(
        &mut self,
        space: impl Into<Identifier>,
        tuple: Vec<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        self.store(RequestType::Insert, space.into(), tuple).await
    }

    /// Inserts a tuple or replaces the one with the same primary key.
    pub async fn replace(
        &mut self,
        space: impl Into<Identifier>,
        tuple: Vec<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        self.store(RequestType::Replace, space.into(), tuple).await
    }

    async fn store(
        &mut self,
        request_type: RequestType,
        space: Identifier,
        tuple: Vec<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        let space_id = self.conn.resolve_space(space).await?;
        self.request(request_type, Some(request::insert(space_id, tuple)))
            .await
    }

    /// Deletes the tuple with the given primary key.
    pub async fn delete(
        &mut self,
        space: impl Into<Identifier>,
        key: impl Into<Key>,
    ) -> Result<Vec<Value>, ClientError> {
        let space_id = self.conn.resolve_space(space.into()).await?;
        let body = request::delete(space_id, key.into());
        self.request(RequestType::Delete, Some(body)).await
    }

    /// Applies `ops` to the tuple found by `key` in `index`.
    ///
    /// Field positions in `ops` count the primary key as field 1.
    pub async fn update(
        &mut self,
        space: impl Into<Identifier>,
        index: impl Into<Identifier>,
        key: impl Into<Key>,
        ops: &[UpdateOp],
    ) -> Result<Vec<Value>, ClientError> {
        let (space_id, index_id) = self.resolve(space.into(), index.into()).await?;
        let body = request::update(space_id, index_id, key.into(), ops);
        self.request(RequestType::Update, Some(body)).await
    }

    /// Updates the tuple found by `key`, or inserts `tuple` if there is none.
    ///
    /// Success yields an empty result either way.
    pub async fn upsert(
        &mut self,
        space: impl Into<Identifier>,
        key: impl Into<Key>,
        ops: &[UpdateOp],
        tuple: Vec<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        let space_id = self.conn.resolve_space(space.into()).await?;
        let body = request::upsert(space_id, key.into(), ops, tuple);
        self.request(RequestType::Upsert, Some(body)).await
    }

    /// Calls a stored procedure using the configured call semantics.
    pub async fn call(
        &mut self,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        let request_type = self.conn.config().call_semantics.request_type();
        self.request(request_type, Some(request::call(function, args)))
            .await
    }

    /// Evaluates an expression on the server with `args` bound.
    pub async fn eval(
        &mut self,
        expression: &str,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, ClientError> {
        self.request(RequestType::Eval, Some(request::eval(expression, args)))
            .await
    }
}
