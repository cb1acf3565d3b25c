//! Abandoning store calls whose caller has gone away.
//!
//! A [`Cancellation`] is attached to a [`Database`](crate::Database) handle
//! with `with_cancellation`. Once cancelled, that handle refuses new
//! connection checkouts, interrupts the statement currently running on its
//! connection, and rolls back the write transaction it is in.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, InterruptHandle};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Default)]
pub struct Cancellation {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    /// Interrupt handle of the connection checked out right now, if any.
    active: Mutex<Option<InterruptHandle>>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let active = self.inner.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = active.as_ref() {
            handle.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels when dropped. Hold it for as long as the result is wanted.
    pub fn drop_guard(&self) -> DropGuard {
        DropGuard {
            cancellation: self.clone(),
        }
    }

    pub(crate) fn check(&self) -> StoreResult<()> {
        if self.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        Ok(())
    }

    /// Registers `conn` as the connection to interrupt until the returned
    /// guard is dropped. Fails if already cancelled.
    pub(crate) fn enter(&self, conn: &Connection) -> StoreResult<ActiveConnection> {
        {
            let mut active = self.inner.active.lock().unwrap_or_else(|e| e.into_inner());
            *active = Some(conn.get_interrupt_handle());
        }
        // Checked after registering: a concurrent `cancel` either sees the
        // handle or we see its flag.
        let guard = ActiveConnection {
            state: self.inner.clone(),
        };
        self.check()?;
        Ok(guard)
    }
}

impl std::fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub struct DropGuard {
    cancellation: Cancellation,
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

/// Clears the registered interrupt handle. Must drop before the connection
/// lock is released, so a late `cancel` never interrupts another caller.
pub(crate) struct ActiveConnection {
    state: Arc<CancelState>,
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        let mut active = self.state.active.lock().unwrap_or_else(|e| e.into_inner());
        *active = None;
    }
}
