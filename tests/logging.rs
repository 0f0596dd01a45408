//! Global logging setup writing JSON to a file.
//!
//! Installing the subscriber is process-wide, so this lives in its own test
//! binary with a single test.
#![allow(clippy::unwrap_used)]

use recordset::observability::{LogFormat, LoggingConfig, SQL_LOG_TARGET, init_logging};
use recordset::{Cursor, CursorConfig, Error, SqliteBackend};
use std::sync::Arc;

#[test]
fn test_json_file_logging_records_statements() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("recordset.log");

    init_logging(
        LoggingConfig::default()
            .with_directives("info,recordset=debug")
            .with_format(LogFormat::Json)
            .with_file(&path),
    )
    .unwrap();

    let backend = Arc::new(SqliteBackend::in_memory().unwrap());
    let mut cursor = Cursor::new(backend, CursorConfig::default());
    cursor.execute("SELECT 41 + 1 AS answer", &[]).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let line = contents
        .lines()
        .find(|l| l.contains("SELECT 41 + 1 AS answer"))
        .unwrap();
    assert!(line.starts_with('{') && line.ends_with('}'));
    assert!(line.contains(&format!("\"target\":\"{SQL_LOG_TARGET}\"")));
    assert!(line.contains("\"level\":\"DEBUG\""));
    assert!(line.contains("\"backend\":\"sqlite\""));

    let again = init_logging(LoggingConfig::default()).unwrap_err();
    assert!(matches!(again, Error::OperationFailed { ref operation, .. } if operation == "logging_init"));
}
