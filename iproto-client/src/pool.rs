//! Idle session pool.
//!
//! The pool only stores streams handed back by `set_keepalive` and hands
//! them out again; it never opens connections itself. Entries older than
//! the idle timeout are dropped on checkout.

use crate::config::ConnectionConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

struct IdleStream<S> {
    stream: S,
    reuse_count: u32,
    released_at: Instant,
}

/// Bounded pool of idle streams, keyed by `host:port`.
pub struct SessionPool<S> {
    capacity: usize,
    idle_timeout: Duration,
    idle: Mutex<HashMap<String, VecDeque<IdleStream<S>>>>,
}

impl<S> SessionPool<S> {
    /// Creates a pool holding at most `capacity` idle streams per key.
    pub fn new(capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            capacity,
            idle_timeout,
            idle: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a pool sized by `pool_size` and `idle_timeout_ms`.
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.pool_size, config.idle_timeout())
    }

    /// Takes the most recently released live stream for `key`.
    ///
    /// Returns the stream with its incremented reuse count.
    pub fn checkout(&self, key: &str) -> Option<(S, u32)> {
        let mut idle = self.idle.lock();
        let queue = idle.get_mut(key)?;

        // Oldest entries sit at the front.
        let now = Instant::now();
        while let Some(front) = queue.front() {
            if now.duration_since(front.released_at) <= self.idle_timeout {
                break;
            }
            queue.pop_front();
            tracing::debug!("Dropped expired idle session for {}", key);
        }

        let entry = queue.pop_back()?;
        tracing::debug!(
            "Reusing pooled session for {} (reused {} times before)",
            key,
            entry.reuse_count
        );
        Some((entry.stream, entry.reuse_count + 1))
    }

    /// Stores `stream` for later reuse, or gives it back if the pool is full.
    pub fn checkin(&self, key: &str, stream: S, reuse_count: u32) -> Result<(), S> {
        let mut idle = self.idle.lock();
        let queue = idle.entry(key.to_string()).or_default();
        if queue.len() >= self.capacity {
            return Err(stream);
        }
        queue.push_back(IdleStream {
            stream,
            reuse_count,
            released_at: Instant::now(),
        });
        tracing::debug!("Session for {} returned to pool ({} idle)", key, queue.len());
        Ok(())
    }

    /// Number of idle streams stored for `key`.
    pub fn idle_count(&self, key: &str) -> usize {
        self.idle.lock().get(key).map_or(0, VecDeque::len)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
