//! Pooled session management.
//!
//! Concurrency across callers comes from a pool of independent sessions,
//! not from multiplexing one connection. A session is owned exclusively by
//! one operation at a time; when all `pool_size` sessions are out, further
//! acquires block until one is released.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::config::GridConfig;
use crate::error::FsError;
use crate::protocol::{GridConnector, GridSession};

/// Capacity-bounded pool of authenticated store sessions.
///
/// Sessions are opened lazily: the pool starts empty and connects only when
/// an acquire finds no idle session and the capacity allows growth. Acquired
/// sessions are not validated — a dead one reveals itself through a
/// [`GridError::Disconnected`](crate::GridError::Disconnected) on first use,
/// at which point the holder calls [`PooledSession::discard`] and acquires a
/// replacement.
///
/// The pool is a cheap handle: clones share the same sessions.
/// [`shutdown`](Self::shutdown) is idempotent; once called, every waiter is
/// woken and all subsequent acquires fail.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    connector: Box<dyn GridConnector>,
    config: GridConfig,
    capacity: usize,
    state: Mutex<PoolState>,
    available: Condvar,
}

struct PoolState {
    idle: Vec<Box<dyn GridSession>>,
    /// Sessions currently out, including slots reserved for in-flight connects.
    leased: usize,
    shut: bool,
}

impl SessionPool {
    /// Create an empty pool for `config`, capacity `config.pool_size`.
    pub fn new(connector: Box<dyn GridConnector>, config: GridConfig) -> Self {
        let capacity = config.pool_size.max(1);
        Self {
            inner: Arc::new(PoolInner {
                connector,
                config,
                capacity,
                state: Mutex::new(PoolState {
                    idle: Vec::with_capacity(capacity),
                    leased: 0,
                    shut: false,
                }),
                available: Condvar::new(),
            }),
        }
    }

    /// The configuration this pool connects with.
    pub fn config(&self) -> &GridConfig {
        &self.inner.config
    }

    /// Take exclusive ownership of a session, blocking if the pool is
    /// exhausted.
    ///
    /// The returned guard gives the session back on drop; it is never
    /// handed to two operations at once.
    ///
    /// # Errors
    ///
    /// - [`FsError::PermissionDenied`] if the store rejects the credential
    ///   (never retried)
    /// - [`FsError::ConnectionLost`] if a fresh connect fails
    /// - [`FsError::OperationFailed`] after [`shutdown`](Self::shutdown)
    pub fn acquire(&self) -> Result<PooledSession, FsError> {
        let inner = &self.inner;
        let mut state = inner.lock_state();
        loop {
            if state.shut {
                return Err(FsError::OperationFailed {
                    path: String::new(),
                    operation: "acquire",
                    details: "session pool is shut down".to_string(),
                });
            }
            if let Some(session) = state.idle.pop() {
                state.leased += 1;
                return Ok(PooledSession {
                    pool: Arc::clone(inner),
                    session: Some(session),
                });
            }
            if state.leased < inner.capacity {
                // Reserve the slot before connecting so the capacity bound
                // holds while the handshake is in flight.
                state.leased += 1;
                drop(state);
                debug!(
                    host = %inner.config.host,
                    port = inner.config.port,
                    "opening new store session"
                );
                match inner.connector.connect(&inner.config) {
                    Ok(session) => {
                        return Ok(PooledSession {
                            pool: Arc::clone(inner),
                            session: Some(session),
                        });
                    }
                    Err(err) => {
                        let mut state = inner.lock_state();
                        state.leased -= 1;
                        drop(state);
                        inner.available.notify_one();
                        warn!(error = %err, "store connect failed");
                        return Err(FsError::from_grid(err, "/", "connect"));
                    }
                }
            }
            state = inner
                .available
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close every idle session and refuse further acquires. Idempotent.
    ///
    /// Sessions still held by operations are closed as they come back.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock_state();
        if !state.shut {
            state.shut = true;
            for mut session in state.idle.drain(..) {
                session.close();
            }
            debug!("session pool shut down");
        }
        drop(state);
        self.inner.available.notify_all();
    }
}

impl PoolInner {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn give_back(&self, mut session: Box<dyn GridSession>) {
        let mut state = self.lock_state();
        state.leased -= 1;
        if state.shut {
            session.close();
        } else {
            state.idle.push(session);
        }
        drop(state);
        self.available.notify_one();
    }

    fn forget(&self) {
        let mut state = self.lock_state();
        state.leased -= 1;
        drop(state);
        self.available.notify_one();
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let mut state = self.lock_state();
        for mut session in state.idle.drain(..) {
            session.close();
        }
    }
}

impl std::fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock_state();
        f.debug_struct("SessionPool")
            .field("capacity", &self.inner.capacity)
            .field("idle", &state.idle.len())
            .field("leased", &state.leased)
            .field("shut", &state.shut)
            .finish()
    }
}

/// Exclusive ownership of one pooled session.
///
/// Dropping the guard returns the session to the pool — release is tied to
/// scope exit, so it happens on every path including panics and early
/// returns. A session that produced a connection-level error must instead be
/// [`discard`](Self::discard)ed so the pool can open a fresh one.
pub struct PooledSession {
    pool: Arc<PoolInner>,
    session: Option<Box<dyn GridSession>>,
}

impl PooledSession {
    /// Drop a dead session, freeing its pool slot without reuse.
    pub fn discard(mut self) {
        if let Some(mut session) = self.session.take() {
            warn!("discarding dead store session");
            session.close();
            self.pool.forget();
        }
    }
}

impl Deref for PooledSession {
    type Target = dyn GridSession;

    fn deref(&self) -> &Self::Target {
        self.session
            .as_deref()
            .expect("pooled session accessed after release")
    }
}

impl DerefMut for PooledSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session
            .as_deref_mut()
            .expect("pooled session accessed after release")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.give_back(session);
        }
    }
}
