//! Shared fixtures for integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use recordset::backend::{Backend, QueryResult};
use recordset::{ColumnDesc, Cursor, CursorConfig, FieldInfo, Result, Value};
use std::sync::{Arc, Mutex};

/// In-process backend that records every statement and answers from a
/// script keyed by statement prefix. Unknown statements get an empty,
/// row-less result.
#[derive(Default)]
pub struct ScriptedBackend {
    statements: Mutex<Vec<String>>,
    answers: Mutex<Vec<(String, QueryResult)>>,
    last_insert_id: Mutex<i64>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answers statements starting with `prefix`. Earlier answers win.
    pub fn answer(&self, prefix: &str, result: QueryResult) {
        self.answers.lock().unwrap().push((prefix.to_string(), result));
    }

    pub fn set_last_insert_id(&self, id: i64) {
        *self.last_insert_id.lock().unwrap() = id;
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn execute(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.statements.lock().unwrap().push(sql.to_string());
        Ok(self
            .answers
            .lock()
            .unwrap()
            .iter()
            .find(|(prefix, _)| sql.starts_with(prefix.as_str()))
            .map(|(_, result)| result.clone())
            .unwrap_or_default())
    }

    fn get_tables(&self, _cursor: &mut Cursor, _include_system: bool) -> Result<Vec<String>> {
        Ok(vec!["t".to_string()])
    }

    fn get_fields(&self, _cursor: &mut Cursor, _table: &str) -> Result<Vec<FieldInfo>> {
        Ok(Vec::new())
    }

    fn get_last_insert_id(&self, _cursor: &mut Cursor) -> Result<Value> {
        Ok(Value::Integer(*self.last_insert_id.lock().unwrap()))
    }
}

pub fn columns(names: &[&str]) -> Vec<ColumnDesc> {
    names.iter().map(|n| ColumnDesc::new(*n, None)).collect()
}

/// Result set for `t(id, name)`.
pub fn id_name_rows(rows: &[(i64, &str)]) -> QueryResult {
    QueryResult::rows(
        columns(&["id", "name"]),
        rows.iter()
            .map(|(id, name)| vec![Value::Integer(*id), Value::from(*name)])
            .collect(),
    )
}

/// Cursor on table `t` keyed by `id`, scripted to return `rows` for
/// `SELECT id, name FROM t`.
pub fn scripted_cursor(rows: &[(i64, &str)]) -> (Arc<ScriptedBackend>, Cursor) {
    let backend = ScriptedBackend::new();
    backend.answer("SELECT id, name FROM t", id_name_rows(rows));
    backend.answer("SELECT * FROM t WHERE 1=0", id_name_rows(&[]));

    let mut cursor = Cursor::new(backend.clone(), CursorConfig::default());
    cursor.set_table("t");
    cursor.set_key_field("id");
    (backend, cursor)
}
