//! Pool of long-lived browser sessions
//!
//! Sessions are launched lazily, handed out one per crawl step through a
//! [`SessionLease`], and returned to the idle list when the lease is dropped.
//! A lease that has been [`retire`](SessionLease::retire)d sends its session
//! to the retired list instead; retired sessions are closed on the next
//! checkout and on [`SessionPool::shutdown`].

use super::{BrowserDriver, BrowserError, BrowserSession};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Shared state between the pool and its outstanding leases
struct PoolInner {
    idle: Mutex<Vec<Box<dyn BrowserSession>>>,
    retired: Mutex<Vec<Box<dyn BrowserSession>>>,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Vec<Box<dyn BrowserSession>>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn retired(&self) -> MutexGuard<'_, Vec<Box<dyn BrowserSession>>> {
        self.retired
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A bounded pool of browser sessions
pub struct SessionPool {
    driver: Arc<dyn BrowserDriver>,
    inner: Arc<PoolInner>,
    permits: Arc<Semaphore>,
    max_size: usize,
}

impl SessionPool {
    /// Creates a pool that keeps at most `max_size` sessions alive
    pub fn new(driver: Arc<dyn BrowserDriver>, max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            driver,
            inner: Arc::new(PoolInner {
                idle: Mutex::new(Vec::new()),
                retired: Mutex::new(Vec::new()),
            }),
            permits: Arc::new(Semaphore::new(max_size)),
            max_size,
        }
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Number of sessions currently waiting in the pool
    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Checks out a session, launching one if none is idle
    ///
    /// Waits while `max_size` leases are outstanding.
    pub async fn checkout(&self) -> Result<SessionLease, BrowserError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::Closed)?;

        self.close_retired().await;

        let reused = self.inner.idle().pop();
        let session = match reused {
            Some(session) => {
                debug!("Reusing pooled {} session", self.driver.name());
                session
            }
            None => {
                debug!("Launching new {} session", self.driver.name());
                self.driver.launch().await?
            }
        };

        Ok(SessionLease {
            session: Some(session),
            inner: Arc::clone(&self.inner),
            retire: false,
            _permit: permit,
        })
    }

    /// Closes every idle and retired session
    ///
    /// Leases still outstanding return their sessions to the pool when
    /// dropped; call this after the crawl has finished.
    pub async fn shutdown(&self) {
        self.permits.close();

        let idle: Vec<_> = self.inner.idle().drain(..).collect();
        let count = idle.len();
        for session in idle {
            if let Err(e) = session.close().await {
                warn!("Failed to close pooled session: {}", e);
            }
        }
        self.close_retired().await;

        info!("Session pool shut down ({} sessions closed)", count);
    }

    async fn close_retired(&self) {
        let retired: Vec<_> = self.inner.retired().drain(..).collect();
        for session in retired {
            debug!("Closing retired {} session", self.driver.name());
            if let Err(e) = session.close().await {
                warn!("Failed to close retired session: {}", e);
            }
        }
    }
}

/// Exclusive use of one pooled session for the duration of a crawl step
///
/// The session goes back to the pool on drop, on every exit path.
pub struct SessionLease {
    session: Option<Box<dyn BrowserSession>>,
    inner: Arc<PoolInner>,
    retire: bool,
    _permit: OwnedSemaphorePermit,
}

impl SessionLease {
    pub fn session(&self) -> Result<&dyn BrowserSession, BrowserError> {
        self.session.as_deref().ok_or(BrowserError::Closed)
    }

    /// Marks the session as unhealthy so it is closed instead of reused
    pub fn retire(&mut self) {
        self.retire = true;
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if self.retire {
                self.inner.retired().push(session);
            } else {
                self.inner.idle().push(session);
            }
        }
    }
}
