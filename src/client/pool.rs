//! Bounded request slots for the outbound HTTP client.
//!
//! reqwest pools idle connections but never caps how many requests are in flight.
//! [`ConnectionLimiter`] adds that cap: at most `max_connections` requests run at once,
//! up to `max_pending` further callers wait in FIFO order, and anyone beyond that fails
//! fast with [`ClientError::PoolExhausted`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::error::{ClientError, ClientResult};

#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    permits: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    max_connections: usize,
    max_pending: usize,
}

/// Held for the duration of one request
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

/// Decrements the waiter count even when the acquiring future is dropped by a timeout
struct WaitingGuard(Arc<AtomicUsize>);

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionLimiter {
    pub fn new(max_connections: usize, max_pending: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_connections)),
            waiting: Arc::new(AtomicUsize::new(0)),
            max_connections,
            max_pending,
        }
    }

    pub async fn acquire(&self) -> ClientResult<ConnectionPermit> {
        if let Ok(permit) = Arc::clone(&self.permits).try_acquire_owned() {
            return Ok(ConnectionPermit { _permit: permit });
        }

        let already_waiting = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitingGuard(Arc::clone(&self.waiting));
        if already_waiting >= self.max_pending {
            return Err(ClientError::PoolExhausted {
                pending: already_waiting,
            });
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ClientError::Internal(format!("connection limiter closed: {e}")))?;

        Ok(ConnectionPermit { _permit: permit })
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.max_connections - self.permits.available_permits()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}
