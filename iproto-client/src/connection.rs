//! Connection: handshake state machine and request engine.
//!
//! A connection owns exactly one [`Session`] and runs at most one request
//! at a time; `execute` takes `&mut self`, so a second request cannot be
//! issued before the previous response has been read.

use crate::config::ConnectionConfig;
use crate::error::ClientError;
use crate::pool::SessionPool;
use crate::schema::SchemaCache;
use crate::session::{Session, Stream};
use iproto_protocol::{
    decode_length_prefix, next_request_id, request, scramble, Encoder, Greeting, ProtocolError,
    RequestType, Response, Value, GREETING_SIZE, LENGTH_PREFIX_SIZE, REQUEST_ID_LIMIT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Handshake state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Greeting read, authentication pending.
    Greeted,
    /// Credentials accepted by the server.
    Authenticated,
    /// Usable without authentication: anonymous, or reused from a pool.
    Ready,
}

impl ConnectionState {
    /// Returns whether requests may be issued in this state.
    pub fn is_usable(self) -> bool {
        matches!(self, ConnectionState::Authenticated | ConnectionState::Ready)
    }
}

/// A single logical client session.
pub struct Connection<S = TcpStream> {
    config: ConnectionConfig,
    session: Option<Session<S>>,
    pool: Option<Arc<SessionPool<S>>>,
    state: ConnectionState,
    sync: u64,
    greeting: Option<Greeting>,
    pub(crate) schema: SchemaCache,
}

impl<S: Stream> Connection<S> {
    /// Creates a disconnected connection.
    ///
    /// A nonzero `pool_size` gives the connection its own session pool,
    /// so `set_keepalive` followed by a reconnect reuses the stream.
    pub fn new(config: ConnectionConfig) -> Self {
        let pool = (config.pool_size > 0).then(|| Arc::new(SessionPool::from_config(&config)));
        Self {
            config,
            session: None,
            pool,
            state: ConnectionState::Disconnected,
            sync: 0,
            greeting: None,
            schema: SchemaCache::new(),
        }
    }

    /// Uses `pool` for `set_keepalive` and for reusing idle sessions.
    pub fn with_pool(mut self, pool: Arc<SessionPool<S>>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn pool(&self) -> Option<&Arc<SessionPool<S>>> {
        self.pool.as_ref()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns whether a session is attached and usable.
    pub fn is_connected(&self) -> bool {
        self.state.is_usable() && self.session.as_ref().is_some_and(Session::is_open)
    }

    /// Server version extracted from the greeting.
    pub fn server_version(&self) -> Option<&str> {
        self.greeting.as_ref().and_then(Greeting::version)
    }

    /// Session salt captured at handshake time.
    pub fn salt(&self) -> Option<&[u8]> {
        self.greeting.as_ref().map(Greeting::salt)
    }

    pub fn greeting(&self) -> Option<&Greeting> {
        self.greeting.as_ref()
    }

    /// Last correlation id used.
    pub fn last_sync(&self) -> u64 {
        self.sync
    }

    pub fn schema(&self) -> &SchemaCache {
        &self.schema
    }

    /// Drops every cached space and index id.
    pub fn clear_schema(&mut self) {
        self.schema.clear();
    }

    /// Sets the send/receive timeout for this and future sessions.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.timeout_ms = timeout.as_millis() as u64;
        if let Some(session) = self.session.as_mut() {
            session.set_timeout(timeout);
        }
    }

    /// Takes an idle session for this server out of the pool, if any.
    pub async fn reuse_pooled(&mut self) -> Result<bool, ClientError> {
        let Some(pool) = self.pool.clone() else {
            return Ok(false);
        };
        match Session::from_pool(&pool, &self.config.pool_key(), self.config.timeout()) {
            Some(session) => {
                self.attach(session).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Attaches a session and brings it to a usable state.
    ///
    /// A session with a nonzero reuse count came from a pool and is treated
    /// as ready; a fresh one goes through greeting and authentication.
    pub async fn attach(&mut self, session: Session<S>) -> Result<(), ClientError> {
        self.close_session().await;
        let reused = session.reuse_count() > 0;
        self.session = Some(session);

        if reused {
            // The greeting belongs to the session that first read it.
            self.greeting = None;
            tracing::debug!(
                "Reusing pooled session to {} (reuse count {})",
                self.config.pool_key(),
                self.session.as_ref().map_or(0, Session::reuse_count)
            );
            self.state = ConnectionState::Ready;
            return Ok(());
        }

        if let Err(e) = self.handshake().await {
            tracing::warn!("Handshake with {} failed: {}", self.config.pool_key(), e);
            self.close_session().await;
            return Err(e);
        }
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), ClientError> {
        let block = self.session_mut()?.receive(GREETING_SIZE).await?;
        let greeting = Greeting::parse(&block).map_err(|e| ClientError::AuthFailed(e.to_string()))?;
        tracing::debug!(
            "Greeting from {}: {}",
            self.config.pool_key(),
            greeting.line()
        );
        self.state = ConnectionState::Greeted;

        let user = match self.config.user.clone() {
            Some(user) => user,
            None => {
                self.greeting = Some(greeting);
                self.state = ConnectionState::Ready;
                tracing::debug!("No user configured, skipping authentication");
                return Ok(());
            }
        };

        let password = self.config.password.clone().unwrap_or_default();
        let scramble = scramble(greeting.salt(), &password)
            .map_err(|e| ClientError::AuthFailed(e.to_string()))?;
        self.greeting = Some(greeting);

        tracing::debug!("Authenticating as {}", user);
        let body = request::auth(&user, &scramble);
        let response = self.execute(RequestType::Auth, None, Some(body)).await?;
        if response.is_error() {
            return Err(ClientError::AuthFailed(response.error_message().to_string()));
        }

        self.state = ConnectionState::Authenticated;
        tracing::debug!("Authenticated as {}", user);
        Ok(())
    }

    /// Sends one request and reads its response.
    ///
    /// `sync` overrides the next correlation id; later ids continue from it.
    /// Ids live in `0..2^32`, so an explicit id at or above the limit is
    /// reduced modulo `REQUEST_ID_LIMIT` before it is sent.
    /// Transport and framing failures close the session.
    pub async fn execute(
        &mut self,
        request_type: RequestType,
        sync: Option<u64>,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        let id = match sync {
            Some(id) => id % REQUEST_ID_LIMIT,
            None => next_request_id(self.sync),
        };
        self.sync = id;

        let frame = Encoder::encode_request(request_type, id, body.as_ref())?;
        tracing::debug!("Sending {} request (sync={})", request_type, id);

        match self.round_trip(&frame, id).await {
            Ok(response) => {
                tracing::debug!(
                    "Received response (sync={}, status={:#x})",
                    response.sync,
                    response.status
                );
                Ok(response)
            }
            Err(e) => {
                if e.is_fatal() || !self.session.as_ref().is_some_and(Session::is_open) {
                    tracing::warn!("Closing connection to {}: {}", self.config.pool_key(), e);
                    self.close_session().await;
                }
                Err(e)
            }
        }
    }

    async fn round_trip(&mut self, frame: &[u8], id: u64) -> Result<Response, ClientError> {
        let session = self.session_mut()?;
        session.send(frame).await?;

        let prefix = session.receive(LENGTH_PREFIX_SIZE).await?;
        let size = decode_length_prefix(&prefix)?;
        let payload = session.receive(size).await?;

        let response = Response::from_payload(&payload)?;
        if response.sync != id {
            return Err(ProtocolError::IdMismatch {
                expected: id,
                actual: response.sync,
            }
            .into());
        }
        Ok(response)
    }

    fn session_mut(&mut self) -> Result<&mut Session<S>, ClientError> {
        self.session
            .as_mut()
            .filter(|session| session.is_open())
            .ok_or(ClientError::NotConnected)
    }

    async fn close_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close().await;
        }
        self.state = ConnectionState::Disconnected;
        self.greeting = None;
        self.schema.clear();
    }

    /// Closes the session.
    pub async fn disconnect(&mut self) {
        if self.session.is_some() {
            tracing::debug!("Disconnecting from {}", self.config.pool_key());
        }
        self.close_session().await;
    }

    /// Hands the session back to the pool for reuse.
    ///
    /// Without a pool, or when the pool is full, the session is closed and
    /// a `Pool` error is returned.
    pub async fn set_keepalive(&mut self) -> Result<(), ClientError> {
        let mut session = self.session.take().ok_or(ClientError::NotConnected)?;
        self.state = ConnectionState::Disconnected;
        self.greeting = None;
        self.schema.clear();

        let Some(pool) = self.pool.clone() else {
            session.close().await;
            return Err(ClientError::Pool("no session pool configured".to_string()));
        };
        session.release_to_pool(&pool, &self.config.pool_key()).await
    }
}

impl Connection<TcpStream> {
    /// Connects to the configured server.
    ///
    /// An idle pooled session is reused when available; otherwise a new TCP
    /// connection is opened and the handshake runs.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.reuse_pooled().await? {
            return Ok(());
        }
        let session =
            Session::connect(&self.config.host, self.config.port, self.config.timeout()).await?;
        self.attach(session).await
    }
}
