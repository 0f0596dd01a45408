//! Observation of statements sent to the backend.

use std::sync::{Mutex, MutexGuard};

/// Receives every statement a cursor sends to its backend.
///
/// A cursor and its auxiliary cursor share one observer, so the observer
/// sees both result-set queries and the DML generated by `save`/`delete`.
pub trait SqlObserver: Send + Sync {
    /// Called before the statement is handed to the driver.
    fn on_statement(&self, sql: &str);
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SqlObserver for NoopObserver {
    fn on_statement(&self, _sql: &str) {}
}

/// Observer that keeps every statement in order.
#[derive(Debug, Default)]
pub struct MemoryObserver {
    statements: Mutex<Vec<String>>,
}

impl MemoryObserver {
    /// Creates an empty observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded statements.
    #[must_use]
    pub fn statements(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Returns the recorded statements and clears the log.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        match self.statements.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("statement log mutex was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }
}

impl SqlObserver for MemoryObserver {
    fn on_statement(&self, sql: &str) {
        self.lock().push(sql.to_string());
    }
}
