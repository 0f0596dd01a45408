//! `SQLite` reference backend.
//!
//! Wraps a single `rusqlite` connection behind a mutex so the backend can be
//! shared between a cursor and its auxiliary cursor.
//!
//! # Dialect notes
//!
//! * `SQLite` has no backslash escapes, so only single quotes are doubled.
//! * Column prefixes are never emitted in `UPDATE` or key `WHERE` clauses.
//! * Dates are stored as canonical text and lifted back into typed values
//!   using the column's declared type.
//! * A query column is updatable when the base table has a column of the
//!   same name; declared types of expressions are unavailable in `SQLite`.

mod connection;
mod convert;
mod metrics;

pub use convert::{field_type_from_decl, value_from_sql};

use crate::backend::{Backend, QueryResult};
use crate::config::{CursorConfig, SqliteSettings};
use crate::cursor::Cursor;
use crate::models::{ColumnDesc, DataType, FieldDef, FieldInfo, TableDef, Value};
use crate::{Error, Result};
use connection::{acquire_lock, configure_connection};
use metrics::record_operation_metrics;
use rusqlite::{Connection, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

/// `SQLite` backend.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Opens (or creates) a database file with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_settings(db_path, &SqliteSettings::default())
    }

    /// Opens (or creates) a database file with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn with_settings(db_path: impl Into<PathBuf>, settings: &SqliteSettings) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: format!("{}: {e}", db_path.display()),
        })?;
        configure_connection(&conn, settings);
        tracing::debug!(path = %db_path.display(), "opened sqlite database");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        })
    }

    /// Opens (or creates) a database file using a cursor configuration's
    /// `[sqlite]` settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_config(db_path: impl Into<PathBuf>, config: &CursorConfig) -> Result<Self> {
        Self::with_settings(db_path, &config.sqlite)
    }

    /// Creates an in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;
        configure_connection(&conn, &SqliteSettings::default());

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// Returns the database path, or `None` for in-memory databases.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Returns true when no transaction is open.
    #[must_use]
    pub fn is_autocommit(&self) -> bool {
        acquire_lock(&self.conn).is_autocommit()
    }

    fn run(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let to_err = |e: rusqlite::Error| Error::Execution {
            sql: sql.to_string(),
            cause: e.to_string(),
        };

        let conn = acquire_lock(&self.conn);
        let mut stmt = conn.prepare(sql).map_err(to_err)?;

        if stmt.column_count() == 0 {
            let changed = stmt.execute(params_from_iter(params.iter())).map_err(to_err)?;
            return Ok(QueryResult::affected(u64::try_from(changed).ok()));
        }

        let columns: Vec<ColumnDesc> = stmt
            .columns()
            .iter()
            .map(|col| ColumnDesc::new(col.name().to_lowercase(), col.decl_type().map(str::to_string)))
            .collect();

        let mut rows = stmt.query(params_from_iter(params.iter())).map_err(to_err)?;
        let mut tuples = Vec::new();
        while let Some(row) = rows.next().map_err(to_err)? {
            let mut tuple = Vec::with_capacity(columns.len());
            for (idx, col) in columns.iter().enumerate() {
                let raw = row.get_ref(idx).map_err(to_err)?;
                tuple.push(value_from_sql(raw, col.decl_type.as_deref()));
            }
            tuples.push(tuple);
        }

        Ok(QueryResult::rows(columns, tuples))
    }

    /// Reads `PRAGMA table_info` for `table` into the cursor.
    fn table_info(&self, cursor: &mut Cursor, table: &str) -> Result<()> {
        cursor.execute(&format!("PRAGMA table_info({})", self.esc_quote(table)), &[])
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let start = Instant::now();
        let result = self.run(sql, params);
        let operation = match &result {
            Ok(res) if res.has_result_set() => "query",
            _ => "execute",
        };
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", operation, start, status);
        result
    }

    fn esc_quote(&self, val: &str) -> String {
        format!("'{}'", val.replace('\'', "''"))
    }

    fn where_table_prefix(&self, _table: &str) -> String {
        String::new()
    }

    fn commit_transaction(&self, cursor: &mut Cursor) -> Result<()> {
        if self.is_autocommit() {
            tracing::debug!("commit requested with no active transaction");
            return Ok(());
        }
        cursor.execute("COMMIT", &[])
    }

    fn flush(&self, cursor: &mut Cursor) -> Result<()> {
        if self.is_autocommit() {
            return Ok(());
        }
        cursor.execute("COMMIT", &[])
    }

    fn get_tables(&self, cursor: &mut Cursor, include_system_tables: bool) -> Result<Vec<String>> {
        cursor.execute(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
            &[],
        )?;
        Ok(cursor
            .data_set()
            .iter()
            .filter_map(|rec| rec.get("name").and_then(Value::as_str))
            .filter(|name| include_system_tables || !name.starts_with("sqlite_"))
            .map(str::to_string)
            .collect())
    }

    fn get_fields(&self, cursor: &mut Cursor, table: &str) -> Result<Vec<FieldInfo>> {
        self.table_info(cursor, table)?;
        Ok(cursor
            .data_set()
            .iter()
            .filter_map(|rec| {
                let name = rec.get("name")?.as_str()?.to_string();
                let decl = rec.get("type").and_then(Value::as_str).unwrap_or_default();
                let is_pk = rec.get("pk").and_then(Value::as_i64).is_some_and(|pk| pk > 0);
                Some(FieldInfo {
                    name,
                    field_type: field_type_from_decl(decl),
                    is_pk,
                })
            })
            .collect())
    }

    fn get_last_insert_id(&self, _cursor: &mut Cursor) -> Result<Value> {
        Ok(Value::Integer(acquire_lock(&self.conn).last_insert_rowid()))
    }

    fn is_existing_table(&self, cursor: &mut Cursor, table: &str) -> Result<bool> {
        cursor.execute(
            &format!(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = {}",
                self.esc_quote(table)
            ),
            &[],
        )?;
        Ok(cursor.row_count() > 0)
    }

    fn base_table_columns(&self, cursor: &mut Cursor, table: &str) -> Result<Vec<ColumnDesc>> {
        self.table_info(cursor, table)?;
        Ok(cursor
            .data_set()
            .iter()
            .filter_map(|rec| {
                let name = rec.get("name")?.as_str()?.to_lowercase();
                let decl = rec.get("type").and_then(Value::as_str).map(str::to_string);
                Some(ColumnDesc::new(name, decl))
            })
            .collect())
    }

    fn columns_match(&self, _query_column: &ColumnDesc, _base_column: &ColumnDesc) -> bool {
        true
    }

    fn create_table_sql(&self, def: &TableDef) -> Result<String> {
        crate::backend::validate_table_def(def)?;
        let pk_count = def.fields.iter().filter(|f| f.is_pk).count();

        let mut columns = def
            .fields
            .iter()
            .map(|field| self.column_sql(def, field, pk_count == 1))
            .collect::<Result<Vec<_>>>()?;

        if pk_count > 1 {
            let keys: Vec<&str> = def
                .fields
                .iter()
                .filter(|f| f.is_pk)
                .map(|f| f.name.as_str())
                .collect();
            columns.push(format!("PRIMARY KEY ({})", keys.join(", ")));
        }

        let temp = if def.is_temp { "TEMP " } else { "" };
        Ok(format!("CREATE {temp}TABLE {} ({})", def.name, columns.join(", ")))
    }
}

impl SqliteBackend {
    fn column_sql(&self, def: &TableDef, field: &FieldDef, inline_pk: bool) -> Result<String> {
        let mut col = format!("{} {}", field.name, sqlite_type_name(field.data_type));
        if field.is_pk && inline_pk {
            col.push_str(" PRIMARY KEY");
            if field.is_auto_increment {
                if field.data_type != DataType::Numeric {
                    return Err(Error::Data(format!(
                        "AUTOINCREMENT requires an integer key: {}.{}",
                        def.name, field.name
                    )));
                }
                col.push_str(" AUTOINCREMENT");
            }
        }
        if !field.allow_nulls {
            col.push_str(" NOT NULL");
        }
        match &field.default {
            Some(default) => {
                col.push_str(" DEFAULT ");
                col.push_str(&self.format_for_query(default));
            },
            None if field.data_type == DataType::Stamp => {
                col.push_str(" DEFAULT CURRENT_TIMESTAMP");
            },
            None => {},
        }
        Ok(col)
    }
}

const fn sqlite_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Numeric => "INTEGER",
        DataType::Float => "REAL",
        DataType::Decimal | DataType::String => "TEXT",
        DataType::Date => "DATE",
        DataType::Time => "TIME",
        DataType::DateTime => "DATETIME",
        DataType::Stamp => "TIMESTAMP",
        DataType::Binary => "BLOB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IndexDef;

    #[test]
    fn test_execute_returns_typed_rows() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend
            .execute("CREATE TABLE t (id INTEGER PRIMARY KEY, d DATE, ok BOOLEAN)", &[])
            .unwrap();
        let res = backend
            .execute(
                "INSERT INTO t (id, d, ok) VALUES (?1, ?2, ?3)",
                &[Value::Integer(1), Value::from("2024-01-31"), Value::Bool(true)],
            )
            .unwrap();
        assert_eq!(res.rows_affected, Some(1));

        let res = backend.execute("SELECT id, d, ok FROM t", &[]).unwrap();
        assert_eq!(res.columns.len(), 3);
        assert_eq!(res.columns[0].name, "id");
        assert!(matches!(res.rows[0][1], Value::Date(_)));
        assert_eq!(res.rows[0][2], Value::Bool(true));
    }

    #[test]
    fn test_execute_error_carries_sql() {
        let backend = SqliteBackend::in_memory().unwrap();
        let err = backend.execute("SELECT * FROM missing", &[]).unwrap_err();
        match err {
            Error::Execution { sql, cause } => {
                assert_eq!(sql, "SELECT * FROM missing");
                assert!(cause.contains("missing"));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_esc_quote_keeps_backslashes() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert_eq!(backend.esc_quote(r"it's a\b"), r"'it''s a\b'");
    }

    #[test]
    fn test_create_table_sql() {
        let backend = SqliteBackend::in_memory().unwrap();
        let def = TableDef::new("items")
            .field(FieldDef::new("id", DataType::Numeric).primary_key(true))
            .field(FieldDef::new("name", DataType::String).not_null())
            .field(FieldDef::new("created", DataType::Stamp))
            .index(IndexDef::new("primary", ["id"]));
        assert_eq!(
            backend.create_table_sql(&def).unwrap(),
            "CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL, \
             name TEXT NOT NULL, created TIMESTAMP DEFAULT CURRENT_TIMESTAMP)"
        );
        assert!(backend.create_index_sql(&def).is_empty());
    }

    #[test]
    fn test_create_table_sql_composite_key_and_temp() {
        let backend = SqliteBackend::in_memory().unwrap();
        let mut def = TableDef::new("links")
            .field(FieldDef::new("a", DataType::Numeric).primary_key(false))
            .field(FieldDef::new("b", DataType::Numeric).primary_key(false));
        def.is_temp = true;
        assert_eq!(
            backend.create_table_sql(&def).unwrap(),
            "CREATE TEMP TABLE links (a INTEGER NOT NULL, b INTEGER NOT NULL, PRIMARY KEY (a, b))"
        );
    }

    #[test]
    fn test_autoincrement_requires_integer() {
        let backend = SqliteBackend::in_memory().unwrap();
        let def = TableDef::new("t").field(FieldDef::new("code", DataType::String).primary_key(true));
        assert!(matches!(backend.create_table_sql(&def), Err(Error::Data(_))));
    }

    #[test]
    fn test_autocommit_tracking() {
        let backend = SqliteBackend::in_memory().unwrap();
        assert!(backend.is_autocommit());
        backend.execute("BEGIN", &[]).unwrap();
        assert!(!backend.is_autocommit());
        backend.execute("ROLLBACK", &[]).unwrap();
        assert!(backend.is_autocommit());
    }

    #[test]
    fn test_from_config_applies_sqlite_settings() {
        let dir = tempfile::tempdir().unwrap();
        let config = CursorConfig::from_toml(
            r#"
            [sqlite]
            journal_mode = "TRUNCATE"
            busy_timeout_ms = 1234
            "#,
        )
        .unwrap();
        let backend = SqliteBackend::from_config(dir.path().join("tuned.db"), &config).unwrap();

        let conn = acquire_lock(&backend.conn);
        let mode: String = conn.pragma_query_value(None, "journal_mode", |r| r.get(0)).unwrap();
        let timeout: i64 = conn.pragma_query_value(None, "busy_timeout", |r| r.get(0)).unwrap();
        assert_eq!(mode, "truncate");
        assert_eq!(timeout, 1234);
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.db");
        let backend = SqliteBackend::new(&path).unwrap();
        assert_eq!(backend.db_path(), Some(path.as_path()));
        backend.execute("CREATE TABLE t (id INTEGER)", &[]).unwrap();
        assert!(path.exists());
    }
}
