//! Connection handling for the `SQLite` backend.

use crate::config::SqliteSettings;
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Acquires the connection mutex, recovering from poisoning.
///
/// A panic while the lock was held leaves the connection itself usable, so
/// the guard is recovered and a warning is logged instead of propagating.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("recordset_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies journal, synchronous and busy-timeout pragmas.
///
/// Failures are logged and ignored: in-memory databases, for instance,
/// refuse WAL mode but are otherwise fine.
pub fn configure_connection(conn: &Connection, settings: &SqliteSettings) {
    if let Err(e) = conn.pragma_update(None, "journal_mode", &settings.journal_mode) {
        tracing::debug!(error = %e, mode = %settings.journal_mode, "journal_mode pragma not applied");
    }
    if let Err(e) = conn.pragma_update(None, "synchronous", &settings.synchronous) {
        tracing::debug!(error = %e, "synchronous pragma not applied");
    }
    if let Err(e) = conn.pragma_update(None, "busy_timeout", settings.busy_timeout_ms) {
        tracing::debug!(error = %e, "busy_timeout pragma not applied");
    }
}
