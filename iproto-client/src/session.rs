//! Transport session: one stream plus its timeout and reuse count.
//!
//! Every send/receive failure closes the stream before the error is
//! returned; there are no retries at this layer.

use crate::error::ClientError;
use crate::pool::SessionPool;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Byte stream a session can run over.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Stream for T {}

/// A transport session.
pub struct Session<S> {
    stream: Option<S>,
    timeout: Duration,
    reuse_count: u32,
}

impl Session<TcpStream> {
    /// Opens a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        tracing::debug!("Connecting to {}:{}...", host, port);

        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ClientError::Timeout("connect"))?
            .map_err(|e| ClientError::Transport {
                action: "connect",
                source: e,
            })?;

        stream.set_nodelay(true).ok();
        tracing::debug!("TCP connected to {}:{}", host, port);
        Ok(Self::new(stream, timeout))
    }
}

impl<S: Stream> Session<S> {
    /// Wraps a freshly connected stream.
    pub fn new(stream: S, timeout: Duration) -> Self {
        Self::with_reuse_count(stream, timeout, 0)
    }

    pub(crate) fn with_reuse_count(stream: S, timeout: Duration, reuse_count: u32) -> Self {
        Self {
            stream: Some(stream),
            timeout,
            reuse_count,
        }
    }

    /// Takes an idle session for `key` out of `pool`, if one is available.
    pub fn from_pool(pool: &SessionPool<S>, key: &str, timeout: Duration) -> Option<Self> {
        pool.checkout(key)
            .map(|(stream, reuse_count)| Self::with_reuse_count(stream, timeout, reuse_count))
    }

    /// Number of times this stream was taken from a pool; 0 means fresh.
    pub fn reuse_count(&self) -> u32 {
        self.reuse_count
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Writes all of `buf`.
    pub async fn send(&mut self, buf: &[u8]) -> Result<usize, ClientError> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let result = match tokio::time::timeout(timeout, async {
            stream.write_all(buf).await?;
            stream.flush().await
        })
        .await
        {
            Ok(Ok(())) => Ok(buf.len()),
            Ok(Err(e)) => Err(ClientError::Transport {
                action: "send request",
                source: e,
            }),
            Err(_) => Err(ClientError::Timeout("send request")),
        };

        if result.is_err() {
            self.close().await;
        }
        result
    }

    /// Reads exactly `n` bytes.
    pub async fn receive(&mut self, n: usize) -> Result<Vec<u8>, ClientError> {
        let timeout = self.timeout;
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;
        let mut buf = vec![0u8; n];

        let result = match tokio::time::timeout(timeout, stream.read_exact(&mut buf)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(ClientError::ConnectionClosed)
            }
            Ok(Err(e)) => Err(ClientError::Transport {
                action: "receive response",
                source: e,
            }),
            Err(_) => Err(ClientError::Timeout("receive response")),
        };

        match result {
            Ok(()) => Ok(buf),
            Err(e) => {
                self.close().await;
                Err(e)
            }
        }
    }

    /// Shuts the stream down. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("Shutting down session stream");
            let _ = stream.shutdown().await;
        }
    }

    /// Offers the stream back to `pool` under `key`.
    ///
    /// If the pool refuses it, the stream is closed instead.
    pub async fn release_to_pool(
        &mut self,
        pool: &SessionPool<S>,
        key: &str,
    ) -> Result<(), ClientError> {
        let stream = self.stream.take().ok_or(ClientError::NotConnected)?;
        match pool.checkin(key, stream, self.reuse_count) {
            Ok(()) => Ok(()),
            Err(mut stream) => {
                tracing::debug!("Pool for {} is full, closing stream", key);
                let _ = stream.shutdown().await;
                Err(ClientError::Pool(format!("no room for {} in pool", key)))
            }
        }
    }
}
