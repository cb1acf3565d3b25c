pub mod cancel;
pub mod clock;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod slug;
pub mod social;
pub mod validator;

use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

pub use cancel::Cancellation;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StoreError, StoreResult};
pub use slug::{SlugCandidates, SlugGenerator};
pub use validator::ValidationErrors;

const READER_POOL_SIZE: usize = 4;

/// SQLite-backed text, like and comment stores.
///
/// One writer connection plus a small pool of read-only connections (WAL).
/// Correctness never depends on the writer mutex: slugs are guarded by a
/// `UNIQUE` constraint and updates by a conditional write on `version`.
///
/// Cloning is cheap and shares the connections. Each write runs in its own
/// transaction, which is rolled back if the handle's [`Cancellation`] fires.
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool>,
    cancel: Cancellation,
}

struct Pool {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
    clock: Arc<dyn Clock>,
}

impl Database {
    pub fn open(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        let writer = Connection::open(path)?;

        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&writer)?;

        let mut readers = Vec::with_capacity(READER_POOL_SIZE);
        for _ in 0..READER_POOL_SIZE {
            let conn = Connection::open_with_flags(
                path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.pragma_update(None, "journal_mode", "WAL")?;
            readers.push(Mutex::new(conn));
        }

        info!(
            "Database opened at {} (1 writer + {} readers)",
            path.display(),
            READER_POOL_SIZE
        );
        Ok(Self::from_connections(writer, readers, clock))
    }

    /// Private in-memory database; reads go through the writer connection.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let writer = Connection::open_in_memory()?;
        writer.pragma_update(None, "foreign_keys", "ON")?;
        migrations::run(&writer)?;

        Ok(Self::from_connections(writer, Vec::new(), clock))
    }

    fn from_connections(
        writer: Connection,
        readers: Vec<Mutex<Connection>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool: Arc::new(Pool {
                writer: Mutex::new(writer),
                readers,
                reader_idx: AtomicUsize::new(0),
                clock,
            }),
            cancel: Cancellation::new(),
        }
    }

    /// A handle on the same connections whose calls stop once `cancel` fires.
    pub fn with_cancellation(&self, cancel: Cancellation) -> Self {
        Self {
            pool: self.pool.clone(),
            cancel,
        }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.pool.clock.now()
    }

    pub fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        if self.pool.readers.is_empty() {
            return self.with_conn_mut(f);
        }
        let idx = self.pool.reader_idx.fetch_add(1, Ordering::Relaxed) % self.pool.readers.len();
        let conn = self.pool.readers[idx]
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("reader lock poisoned: {}", e)))?;

        let _active = self.cancel.enter(&conn)?;
        f(&conn).map_err(|e| self.cancelled_or(e))
    }

    /// Runs `f` in a transaction on the writer. Nothing commits if `f` fails
    /// or the handle was cancelled meanwhile.
    pub fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .pool
            .writer
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("writer lock poisoned: {}", e)))?;

        let _active = self.cancel.enter(&conn)?;
        let tx = conn.unchecked_transaction()?;
        let out = f(&*tx).map_err(|e| self.cancelled_or(e))?;
        self.cancel.check()?;
        tx.commit().map_err(|e| self.cancelled_or(e.into()))?;
        Ok(out)
    }

    /// An interrupted statement surfaces as a SQLite error; report it as
    /// what it is.
    fn cancelled_or(&self, err: StoreError) -> StoreError {
        if self.cancel.is_cancelled() {
            StoreError::Cancelled
        } else {
            err
        }
    }
}
