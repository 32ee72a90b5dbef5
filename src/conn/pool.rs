// Copyright (c) 2023 mysql-aio contributors
//
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or http://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. All files in the project carrying such notice may not be copied,
// modified, or distributed except according to those terms.

//! Bounded connection pool.
//!
//! The free list sits behind a plain mutex that is never held across a
//! suspension point; waiters park on a [`Notify`] that wakes one of them
//! per returned slot. All connection setup I/O happens outside the lock.

use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use tokio::sync::Notify;
use tokio::time::{sleep, timeout_at, Instant};

use crate::conn::{Conn, Opts};
use crate::error::{DriverError, Result};

struct Parked {
    conn: Conn,
    needs_reset: bool,
}

struct Protected {
    idle: VecDeque<Parked>,
    /// Slots reserved but never yet connected.
    uninit: usize,
    /// Live sessions, checked-out ones included. Never exceeds `max_size`.
    count: usize,
}

struct Inner {
    opts: Opts,
    protected: Mutex<Protected>,
    wakeup: Notify,
}

enum Candidate {
    Parked(Conn, bool),
    Uninitialized,
}

/// Pool of connections sharing one connect target and credentials.
///
/// Cloning is shallow; all clones draw from the same set of sessions.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("options", &self.inner.opts)
            .finish_non_exhaustive()
    }
}

impl Pool {
    /// Creates a pool. No connection is established until the first
    /// [`get_conn`](Pool::get_conn).
    pub fn new<T: Into<Opts>>(opts: T) -> Result<Pool> {
        let opts = opts.into();
        opts.get_pool_opts().validate()?;
        let initial = opts.get_pool_opts().initial_size();
        Ok(Pool {
            inner: Arc::new(Inner {
                protected: Mutex::new(Protected {
                    idle: VecDeque::new(),
                    uninit: initial,
                    count: initial,
                }),
                wakeup: Notify::new(),
                opts,
            }),
        })
    }

    /// Takes a session from the pool, waiting up to the configured
    /// `idle_wait_timeout` for one to free up.
    pub async fn get_conn(&self) -> Result<PooledConn> {
        let deadline = Instant::now() + self.inner.opts.get_pool_opts().idle_wait_timeout();
        let candidate = loop {
            if let Some(candidate) = self.try_take()? {
                break candidate;
            }
            match timeout_at(deadline, self.inner.wakeup.notified()).await {
                Ok(()) => continue,
                Err(_) => return Err(DriverError::PoolTimeout.into()),
            }
        };
        match self.setup(candidate).await {
            Ok(conn) => Ok(PooledConn {
                pool: self.clone(),
                conn: Some(conn),
                skip_reset: false,
            }),
            Err(err) => {
                self.forget_slot();
                Err(err)
            }
        }
    }

    /// Picks the best available session under the lock: idle first, then
    /// pending-reset, then an unused slot, then a fresh slot if the cap
    /// allows.
    fn try_take(&self) -> Result<Option<Candidate>> {
        let mut protected = self.inner.protected.lock()?;
        if let Some(pos) = protected.idle.iter().position(|parked| !parked.needs_reset) {
            if let Some(parked) = protected.idle.remove(pos) {
                return Ok(Some(Candidate::Parked(parked.conn, false)));
            }
        }
        if let Some(parked) = protected.idle.pop_front() {
            return Ok(Some(Candidate::Parked(parked.conn, parked.needs_reset)));
        }
        if protected.uninit > 0 {
            protected.uninit -= 1;
            return Ok(Some(Candidate::Uninitialized));
        }
        if protected.count < self.inner.opts.get_pool_opts().max_size() {
            protected.count += 1;
            return Ok(Some(Candidate::Uninitialized));
        }
        Ok(None)
    }

    /// Brings the candidate to a healthy, authenticated state. Runs outside
    /// the pool lock. A failed attempt closes the transport, backs off and
    /// starts over from scratch, up to `setup_retry_count` retries.
    async fn setup(&self, candidate: Candidate) -> Result<Conn> {
        let pool_opts = self.inner.opts.get_pool_opts().clone();
        let mut retries_left = pool_opts.setup_retry_count();
        let mut candidate = candidate;
        loop {
            let this_attempt = std::mem::replace(&mut candidate, Candidate::Uninitialized);
            let attempt = match this_attempt {
                Candidate::Parked(mut conn, needs_reset) => {
                    let health = if needs_reset {
                        conn.reset_connection().await
                    } else {
                        conn.ping().await
                    };
                    health.map(|_| conn)
                }
                Candidate::Uninitialized => Conn::new(self.inner.opts.clone()).await,
            };
            match attempt {
                Ok(conn) => return Ok(conn),
                Err(err) if retries_left > 0 => {
                    retries_left -= 1;
                    warn!("connection setup failed ({}), backing off and retrying", err);
                    sleep(pool_opts.retry_backoff()).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns a session to the free list, or drops it when it is no longer
    /// usable. Wakes one waiter either way.
    fn return_conn(&self, conn: Conn, skip_reset: bool) {
        match self.inner.protected.lock() {
            Ok(mut protected) => {
                if conn.is_open() {
                    protected.idle.push_back(Parked {
                        conn,
                        needs_reset: !skip_reset,
                    });
                } else {
                    debug!("discarding unusable pooled connection");
                    protected.count -= 1;
                }
            }
            Err(_) => return,
        }
        self.inner.wakeup.notify_one();
    }

    /// Gives a reserved slot back without a session to park.
    fn forget_slot(&self) {
        if let Ok(mut protected) = self.inner.protected.lock() {
            protected.count -= 1;
        }
        self.inner.wakeup.notify_one();
    }
}

/// Pooled connection handle; derefs to [`Conn`].
///
/// Dropping the handle parks the session for reset-on-reuse, unless it is
/// mid-command or closed, in which case the slot is released instead.
pub struct PooledConn {
    pool: Pool,
    conn: Option<Conn>,
    skip_reset: bool,
}

impl PooledConn {
    pub fn as_ref(&self) -> &Conn {
        self.conn.as_ref().unwrap()
    }

    pub fn as_mut(&mut self) -> &mut Conn {
        self.conn.as_mut().unwrap()
    }

    /// Skips the session reset the next acquirer would otherwise pay for.
    pub fn skip_reset_on_return(&mut self) {
        self.skip_reset = true;
    }

    /// Removes the connection from the pool for good.
    pub fn detach(mut self) -> Conn {
        let conn = self.conn.take().unwrap();
        self.pool.forget_slot();
        conn
    }
}

impl Deref for PooledConn {
    type Target = Conn;

    fn deref(&self) -> &Conn {
        self.as_ref()
    }
}

impl DerefMut for PooledConn {
    fn deref_mut(&mut self) -> &mut Conn {
        self.as_mut()
    }
}

impl fmt::Debug for PooledConn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.conn.fmt(f)
    }
}

impl Drop for PooledConn {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.return_conn(conn, self.skip_reset);
        }
    }
}
