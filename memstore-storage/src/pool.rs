//! Bounded connection pool: checkout/release, FIFO waiter queue, idle
//! reaper, health probe, graceful shutdown. Generalized from the spec's own
//! algorithm (§4.4) rather than the teacher's reader/writer split, since this
//! store has one logical pool, not a dedicated writer plus round-robin readers.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use rusqlite::Connection;
use tracing::{debug, info};

use memstore_core::{MemStoreError, MemStoreResult};

use crate::pragmas;

enum Target {
    File(PathBuf),
    Memory,
}

struct Waiter {
    id: u64,
    /// Filled in by the releaser when this waiter is served directly.
    handed_off: Mutex<Option<Connection>>,
    served: Condvar,
}

struct State {
    idle: Vec<Connection>,
    waiters: VecDeque<Arc<Waiter>>,
    total: usize,
    shutting_down: bool,
}

/// `{active_connections, idle_connections, total_connections, max_connections, waiting_requests}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub active_connections: usize,
    pub idle_connections: usize,
    pub total_connections: usize,
    pub max_connections: usize,
    pub waiting_requests: usize,
}

pub struct Pool {
    target: Target,
    max_connections: usize,
    idle_timeout: Duration,
    state: Arc<Mutex<State>>,
    next_waiter_id: AtomicU64,
    reaper: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    fn open_inner(target: Target, max_connections: usize, idle_timeout: Duration) -> Arc<Pool> {
        let pool = Arc::new(Pool {
            target,
            max_connections: max_connections.max(1),
            idle_timeout,
            state: Arc::new(Mutex::new(State {
                idle: Vec::new(),
                waiters: VecDeque::new(),
                total: 0,
                shutting_down: false,
            })),
            next_waiter_id: AtomicU64::new(0),
            reaper: Mutex::new(None),
        });
        pool.spawn_reaper();
        pool
    }

    pub fn open(path: impl Into<PathBuf>, max_connections: usize, idle_timeout: Duration) -> Arc<Pool> {
        Self::open_inner(Target::File(path.into()), max_connections, idle_timeout)
    }

    pub fn open_in_memory(max_connections: usize, idle_timeout: Duration) -> Arc<Pool> {
        Self::open_inner(Target::Memory, max_connections, idle_timeout)
    }

    fn connect(&self) -> MemStoreResult<Connection> {
        let conn = match &self.target {
            Target::File(path) => Connection::open(path),
            Target::Memory => Connection::open_in_memory(),
        }
        .map_err(|e| MemStoreError::Storage(e.to_string()))?;
        pragmas::apply_pragmas(&conn).map_err(|e| MemStoreError::Storage(e.to_string()))?;
        Ok(conn)
    }

    /// Checks out a connection, waiting up to `timeout` if the pool is saturated.
    pub fn get_connection(&self, timeout: Duration) -> MemStoreResult<Connection> {
        let lock = &self.state;
        loop {
            let mut state = lock.lock().expect("pool mutex poisoned");

            if state.shutting_down {
                return Err(MemStoreError::PoolShuttingDown);
            }

            if let Some(conn) = state.idle.pop() {
                drop(state);
                if pragmas::health_probe(&conn) {
                    return Ok(conn);
                }
                debug!("health probe failed, replacing connection");
                let mut state = lock.lock().expect("pool mutex poisoned");
                state.total = state.total.saturating_sub(1);
                drop(state);
                continue;
            }

            if state.total < self.max_connections {
                state.total += 1;
                drop(state);
                return self.connect().map_err(|e| {
                    let mut state = lock.lock().expect("pool mutex poisoned");
                    state.total = state.total.saturating_sub(1);
                    drop(state);
                    e
                });
            }

            let waiter = Arc::new(Waiter {
                id: self.next_waiter_id.fetch_add(1, Ordering::SeqCst),
                handed_off: Mutex::new(None),
                served: Condvar::new(),
            });
            state.waiters.push_back(waiter.clone());
            debug!(waiters = state.waiters.len(), "checkout enqueued, pool saturated");
            drop(state);

            let deadline = Instant::now() + timeout;
            loop {
                let mut handoff = waiter.handed_off.lock().expect("waiter mutex poisoned");
                if handoff.is_some() {
                    return Ok(handoff.take().expect("checked is_some"));
                }
                drop(handoff);
                {
                    let mut state = lock.lock().expect("pool mutex poisoned");
                    if state.shutting_down {
                        if let Some(pos) = state.waiters.iter().position(|w| w.id == waiter.id) {
                            state.waiters.remove(pos);
                        }
                        return Err(MemStoreError::PoolShuttingDown);
                    }
                }
                let handoff = waiter.handed_off.lock().expect("waiter mutex poisoned");
                let now = Instant::now();
                if now >= deadline {
                    // Remove self from the queue if still present (not yet served).
                    // `release_connection` pops a waiter and hands off its
                    // connection under this same lock, so "still in the queue"
                    // and "already served" are mutually exclusive outcomes here
                    // — never both, which is what rules out the leaked-connection
                    // race between a timing-out waiter and a concurrent release.
                    let mut state = lock.lock().expect("pool mutex poisoned");
                    if let Some(pos) = state.waiters.iter().position(|w| w.id == waiter.id) {
                        state.waiters.remove(pos);
                        drop(state);
                        return Err(MemStoreError::CheckoutTimeout(timeout));
                    }
                    drop(state);
                    let mut handoff = waiter.handed_off.lock().expect("waiter mutex poisoned");
                    return Ok(handoff
                        .take()
                        .expect("removed from the waiter queue implies release_connection served it"));
                }
                let _ = waiter
                    .served
                    .wait_timeout(handoff, deadline - now)
                    .expect("waiter mutex poisoned");
                // Loop back around: re-lock handoff and re-check shutting_down/deadline.
            }
        }
    }

    /// Returns a connection to the pool. If a waiter is queued, it is handed
    /// directly to the head of the FIFO queue; otherwise it joins the idle set.
    pub fn release_connection(&self, conn: Connection) {
        let lock = &self.state;
        let mut state = lock.lock().expect("pool mutex poisoned");

        if state.shutting_down {
            state.total = state.total.saturating_sub(1);
            drop(state);
            drop(conn);
            return;
        }

        if let Some(waiter) = state.waiters.pop_front() {
            // Hand off while still holding the pool lock, so the dequeue and
            // the handoff are one atomic step from a timing-out waiter's view.
            {
                let mut handoff = waiter.handed_off.lock().expect("waiter mutex poisoned");
                *handoff = Some(conn);
            }
            drop(state);
            waiter.served.notify_one();
            return;
        }

        state.idle.push(conn);
    }

    /// Checks out a connection, runs `op`, and releases it on every exit path
    /// (including a panic unwinding through `op`).
    pub fn with_connection<T>(
        &self,
        timeout: Duration,
        op: impl FnOnce(&Connection) -> MemStoreResult<T>,
    ) -> MemStoreResult<T> {
        let conn = self.get_connection(timeout)?;
        struct ReleaseGuard<'p> {
            pool: &'p Pool,
            conn: Option<Connection>,
        }
        impl Drop for ReleaseGuard<'_> {
            fn drop(&mut self) {
                if let Some(conn) = self.conn.take() {
                    self.pool.release_connection(conn);
                }
            }
        }
        let guard = ReleaseGuard {
            pool: self,
            conn: Some(conn),
        };
        op(guard.conn.as_ref().expect("just set"))
    }

    pub fn stats(&self) -> PoolStats {
        let lock = &self.state;
        let state = lock.lock().expect("pool mutex poisoned");
        let active = state.total - state.idle.len();
        PoolStats {
            active_connections: active,
            idle_connections: state.idle.len(),
            total_connections: state.total,
            max_connections: self.max_connections,
            waiting_requests: state.waiters.len(),
        }
    }

    fn spawn_reaper(self: &Arc<Self>) {
        let pool = Arc::clone(self);
        let period = (pool.idle_timeout / 2).max(Duration::from_millis(50));
        let handle = std::thread::spawn(move || loop {
            std::thread::sleep(period);
            let lock = &pool.state;
            let mut state = lock.lock().expect("pool mutex poisoned");
            if state.shutting_down {
                return;
            }
            const FLOOR: usize = 2;
            while state.idle.len() > FLOOR {
                state.idle.remove(0);
                state.total = state.total.saturating_sub(1);
            }
        });
        *self.reaper.lock().expect("reaper mutex poisoned") = Some(handle);
    }

    /// Idempotent. Rejects queued waiters, closes every connection, stops the reaper.
    pub fn shutdown(&self) {
        let lock = &self.state;
        let mut state = lock.lock().expect("pool mutex poisoned");
        if state.shutting_down {
            return;
        }
        state.shutting_down = true;
        info!("pool shutting down");

        while let Some(waiter) = state.waiters.pop_front() {
            // Waiting checkouts observe PoolShuttingDown because the waiter
            // stays absent from `handed_off`; wake them so they re-check state.
            waiter.served.notify_one();
        }
        state.idle.clear();
        state.total = 0;
        drop(state);

        // The reaper wakes on its own cadence and exits once it observes
        // shutting_down; we don't block here waiting for it, so the handle
        // is simply dropped rather than joined.
        self.reaper.lock().expect("reaper mutex poisoned").take();
    }
}

/// Wraps `op` in `BEGIN IMMEDIATE`/`COMMIT`, rolling back on error. Spans
/// multiple statements against one already-checked-out connection.
pub fn with_transaction<T>(
    conn: &Connection,
    op: impl FnOnce(&Connection) -> MemStoreResult<T>,
) -> MemStoreResult<T> {
    conn.execute_batch("BEGIN IMMEDIATE")
        .map_err(|e| MemStoreError::Storage(e.to_string()))?;
    match op(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")
                .map_err(|e| MemStoreError::Storage(e.to_string()))?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}
