//! A small owned pool of SQLite connections.
//!
//! Connections are opened lazily, so a missing or unreachable database only
//! surfaces when an operation actually needs it. Every checkout is a
//! `PooledConnection` guard that hands the connection back when dropped.

use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::database::schema::SCHEMA;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub path: PathBuf,
    pub max_idle: usize,
    pub busy_timeout: Duration,
}

impl PoolConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_idle: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

pub struct ConnectionPool {
    config: PoolConfig,
    idle: Mutex<Vec<Connection>>,
    schema_ready: AtomicBool,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            schema_ready: AtomicBool::new(false),
        }
    }

    pub fn acquire(&self) -> rusqlite::Result<PooledConnection<'_>> {
        let reused = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        let conn = match reused {
            Some(conn) => conn,
            None => self.open()?,
        };
        Ok(PooledConnection {
            pool: self,
            conn: Some(conn),
        })
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        debug!("Opening database connection to {:?}", self.config.path);
        let conn = Connection::open(&self.config.path)?;
        conn.busy_timeout(self.config.busy_timeout)?;
        if !self.schema_ready.load(Ordering::Acquire) {
            conn.execute_batch(SCHEMA)?;
            self.schema_ready.store(true, Ordering::Release);
        }
        Ok(conn)
    }

    fn release(&self, conn: Connection) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.config.max_idle {
            idle.push(conn);
        }
    }

    #[cfg(test)]
    fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
