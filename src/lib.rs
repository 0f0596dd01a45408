//! # Recordset
//!
//! A backend-agnostic record-set cursor with memento-based change tracking.
//!
//! A [`Cursor`] executes SQL through a pluggable [`Backend`] adapter, holds the
//! resulting rows in memory, tracks edits against per-record snapshots
//! ([`Memento`]) and writes the minimal set of `INSERT`/`UPDATE`/`DELETE`
//! statements back when asked to save.
//!
//! ## Features
//!
//! - SQL builder with independently settable clauses
//! - Reversible client-side sorting with a three-state sort cycle
//! - Seek by exact or nearest value
//! - Optimistic updates keyed on single or composite primary keys
//! - Temporary negative keys for unsaved records
//! - `SQLite` reference adapter with schema introspection and DDL generation
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use recordset::{Cursor, CursorConfig, SqliteBackend, Value};
//!
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//! let mut cursor = Cursor::new(backend, CursorConfig::default());
//! cursor.set_table("customers");
//! cursor.set_key_field("id");
//! cursor.requery(&[])?;
//! cursor.set_field_val("name", Value::from("Zed"))?;
//! cursor.save(false)?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod backend;
pub mod config;
pub mod cursor;
pub mod models;
pub mod observability;

// Re-exports for convenience
pub use backend::{Backend, LimitPosition, QueryResult, SqliteBackend};
pub use config::{CursorConfig, SqliteSettings};
pub use cursor::{Cursor, SortOrder};
pub use models::{
    ColumnDesc, DataType, FieldDef, FieldInfo, FieldType, IndexDef, Memento, Record, TableDef,
    Value,
};
pub use observability::{MemoryObserver, NoopObserver, SqlObserver};

/// Error type for cursor and backend operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `NoRecords` | Navigation, field access or sorting on an empty record set |
/// | `BeginningOfFile` | `prior()` on the first row |
/// | `EndOfFile` | `next()` on the last row |
/// | `Data` | Unknown field or column, bad sort direction, missing key field, invalid row |
/// | `Execution` | The database driver rejected a statement |
/// | `PropertyUpdate` | A derived property could not be written by the adapter |
/// | `OperationFailed` | Configuration, file I/O or logging setup failed |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The operation requires at least one record.
    #[error("no records: {0}")]
    NoRecords(String),

    /// Navigation moved before the first record.
    #[error("already at the beginning of the data set")]
    BeginningOfFile,

    /// Navigation moved past the last record.
    #[error("already at the end of the data set")]
    EndOfFile,

    /// A precondition on the data set was violated.
    ///
    /// Raised when:
    /// - A field or sort column does not exist in the record shape
    /// - A sort direction is not one of `ASC`, `DESC` or empty
    /// - No key field is configured, or it is absent from the data set
    /// - A row number is out of range
    /// - There is no data to save or cancel
    #[error("data error: {0}")]
    Data(String),

    /// The backend driver failed to execute a statement.
    ///
    /// The driver's message is carried verbatim in `cause`.
    #[error("execution of '{sql}' failed: {cause}")]
    Execution {
        /// The statement that failed.
        sql: String,
        /// The underlying driver error.
        cause: String,
    },

    /// A derived property could not be updated by the adapter layer.
    #[error("property update failed: {0}")]
    PropertyUpdate(String),

    /// A non-SQL operation failed.
    ///
    /// Raised when:
    /// - A configuration file cannot be read or parsed
    /// - A database file cannot be opened
    /// - Logging has already been initialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a [`Error::Data`] for a field missing from the record shape.
    pub(crate) fn no_such_field(field: &str) -> Self {
        Self::Data(format!("field '{field}' does not exist in the data set"))
    }

    /// Builds a [`Error::NoRecords`] with the standard message.
    pub(crate) fn empty_data_set() -> Self {
        Self::NoRecords("no records in the data set".to_string())
    }
}

/// Result type alias for recordset operations.
pub type Result<T> = std::result::Result<T, Error>;
