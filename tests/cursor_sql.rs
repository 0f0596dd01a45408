//! SQL emitted by the cursor, checked against a scripted backend.
#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use common::{ScriptedBackend, columns, id_name_rows, scripted_cursor};
use recordset::backend::{Backend, LimitPosition, QueryResult};
use recordset::{Cursor, CursorConfig, Error, FieldInfo, MemoryObserver, Result, Value};
use std::sync::Arc;

#[test]
fn test_update_of_one_field_emits_one_statement() {
    let (backend, mut cursor) = scripted_cursor(&[(1, "A"), (2, "B")]);
    cursor.execute("SELECT id, name FROM t", &[]).unwrap();
    backend.clear();

    cursor.set_field_val("name", "Z").unwrap();
    cursor.save(true).unwrap();

    assert_eq!(backend.statements(), vec!["UPDATE t SET name = 'Z' WHERE t.id=1"]);
}

#[test]
fn test_save_without_changes_emits_nothing() {
    let (backend, mut cursor) = scripted_cursor(&[(1, "A"), (2, "B")]);
    cursor.set_sql("SELECT id, name FROM t");
    cursor.requery(&[]).unwrap();
    backend.clear();

    cursor.save(true).unwrap();
    assert!(backend.statements().is_empty());

    cursor.set_field_val("name", "A").unwrap();
    cursor.save(true).unwrap();
    assert!(backend.statements().is_empty());
}

#[test]
fn test_delete_new_row_never_deletes() {
    let (backend, mut cursor) = scripted_cursor(&[(1, "A")]);
    cursor.set_sql("SELECT id, name FROM t");
    cursor.requery(&[]).unwrap();
    cursor.new_record().unwrap();
    backend.clear();

    cursor.delete(None).unwrap();

    assert!(backend.statements().iter().all(|s| !s.starts_with("DELETE")));
    assert_eq!(cursor.row_count(), 1);
}

#[test]
fn test_delete_persisted_row() {
    let (backend, mut cursor) = scripted_cursor(&[(3, "C"), (5, "E")]);
    backend.answer(
        "SELECT COUNT(*)",
        QueryResult::rows(columns(&["cnt"]), vec![vec![Value::Integer(1)]]),
    );
    backend.answer("DELETE", QueryResult::affected(Some(1)));
    cursor.set_sql("SELECT id, name FROM t");
    cursor.requery(&[]).unwrap();
    cursor.move_to_pk(&[Value::Integer(5)]).unwrap();
    backend.clear();

    cursor.delete(None).unwrap();

    let statements = backend.statements();
    assert!(statements.contains(&"DELETE FROM t WHERE t.id=5".to_string()));
    assert_eq!(cursor.row_count(), 1);
    assert_eq!(cursor.get_field_val("id").unwrap(), &Value::Integer(3));
}

#[test]
fn test_insert_fetches_generated_key() {
    let (backend, mut cursor) = scripted_cursor(&[(1, "A")]);
    backend.set_last_insert_id(41);
    cursor.set_sql("SELECT id, name FROM t");
    cursor.requery(&[]).unwrap();

    cursor.new_record().unwrap();
    cursor.set_field_val("name", "O'Neil").unwrap();
    backend.clear();
    cursor.save(false).unwrap();

    assert_eq!(backend.statements(), vec![r"INSERT INTO t (name) VALUES ('O''Neil')"]);
    assert_eq!(cursor.get_field_val("id").unwrap(), &Value::Integer(41));
}

#[test]
fn test_composite_key_where() {
    let backend = ScriptedBackend::new();
    backend.answer(
        "SELECT a, b, v FROM link",
        QueryResult::rows(
            columns(&["a", "b", "v"]),
            vec![vec![Value::Integer(1), Value::from("x"), Value::Integer(0)]],
        ),
    );
    let mut cursor = Cursor::new(backend.clone(), CursorConfig::default());
    cursor.set_table("link");
    cursor.set_key_field("a, b");
    cursor.execute("SELECT a, b, v FROM link", &[]).unwrap();
    backend.clear();

    cursor.set_field_val("v", 9).unwrap();
    cursor.save(false).unwrap();

    assert_eq!(
        backend.statements(),
        vec!["UPDATE link SET v = 9 WHERE link.a=1 AND link.b='x'"]
    );
}

#[test]
fn test_execution_errors_propagate() {
    struct FailingBackend;

    impl Backend for FailingBackend {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn execute(&self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
            Err(Error::Execution {
                sql: sql.to_string(),
                cause: "connection reset".to_string(),
            })
        }

        fn get_tables(&self, _c: &mut Cursor, _s: bool) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn get_fields(&self, _c: &mut Cursor, _t: &str) -> Result<Vec<FieldInfo>> {
            Ok(Vec::new())
        }

        fn get_last_insert_id(&self, _c: &mut Cursor) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    let mut cursor = Cursor::new(Arc::new(FailingBackend), CursorConfig::default());
    cursor.set_table("t");
    match cursor.requery(&[]) {
        Err(Error::Execution { sql, cause }) => {
            assert!(sql.starts_with("SELECT *"));
            assert_eq!(cause, "connection reset");
        },
        other => panic!("expected execution error, got {other:?}"),
    }
}

#[test]
fn test_observer_sees_primary_and_auxiliary_statements() {
    let (backend, cursor) = scripted_cursor(&[(1, "A")]);
    let observer = Arc::new(MemoryObserver::new());
    let mut cursor = cursor.with_observer(observer.clone());
    cursor.set_sql("SELECT id, name FROM t");
    cursor.requery(&[]).unwrap();
    cursor.set_field_val("name", "B").unwrap();
    cursor.save(false).unwrap();

    assert_eq!(observer.statements(), backend.statements());
    assert_eq!(
        observer.statements().last().map(String::as_str),
        Some("UPDATE t SET name = 'B' WHERE t.id=1")
    );
}

#[test]
fn test_requery_derives_non_update_fields() {
    let backend = ScriptedBackend::new();
    backend.answer(
        "SELECT id, name, total FROM t",
        QueryResult::rows(
            columns(&["id", "name", "total"]),
            vec![vec![Value::Integer(1), Value::from("A"), Value::Integer(10)]],
        ),
    );
    backend.answer("SELECT * FROM t WHERE 1=0", id_name_rows(&[]));
    let mut cursor = Cursor::new(backend.clone(), CursorConfig::default());
    cursor.set_table("t");
    cursor.set_key_field("id");
    cursor.set_sql("SELECT id, name, total FROM t");
    cursor.requery(&[]).unwrap();

    assert_eq!(cursor.non_update_fields(), vec!["total".to_string()]);

    backend.clear();
    cursor.set_field_val("total", 11).unwrap();
    cursor.set_field_val("name", "B").unwrap();
    cursor.save(false).unwrap();
    assert_eq!(backend.statements(), vec!["UPDATE t SET name = 'B' WHERE t.id=1"]);
}

#[test]
fn test_top_limit_backend() {
    struct TopBackend;

    impl Backend for TopBackend {
        fn name(&self) -> &'static str {
            "top"
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
            Ok(QueryResult::default())
        }

        fn set_limit_clause(&self, clause: &str) -> String {
            let clause = clause.trim();
            if clause.is_empty() {
                String::new()
            } else {
                format!("{clause} PERCENT")
            }
        }

        fn limit_word(&self) -> &'static str {
            "TOP"
        }

        fn limit_position(&self) -> LimitPosition {
            LimitPosition::Top
        }

        fn get_tables(&self, _c: &mut Cursor, _s: bool) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn get_fields(&self, _c: &mut Cursor, _t: &str) -> Result<Vec<FieldInfo>> {
            Ok(Vec::new())
        }

        fn get_last_insert_id(&self, _c: &mut Cursor) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    let mut cursor = Cursor::new(Arc::new(TopBackend), CursorConfig::default());
    cursor.set_table("orders");
    cursor.set_field_clause("id, total");
    cursor.set_order_by_clause("total DESC");
    cursor.set_limit_clause(" 10 ");
    assert_eq!(cursor.limit_clause(), "10 PERCENT");
    assert_eq!(
        cursor.get_sql(),
        "SELECT TOP 10 PERCENT id, total\nFROM orders\nORDER BY total DESC"
    );

    cursor.set_limit_clause("");
    assert_eq!(cursor.limit_clause(), "");
    assert_eq!(cursor.get_sql(), "SELECT TOP 1000 id, total\nFROM orders\nORDER BY total DESC");
}

#[test]
fn test_builder_sql_drives_requery() {
    let backend = ScriptedBackend::new();
    let mut cursor = Cursor::new(backend.clone(), CursorConfig::default());
    cursor.set_table("t");
    cursor.set_where_clause("active = 1");
    cursor.set_child_filter_clause("parent_id = 4");
    cursor.requery(&[]).unwrap();

    assert_eq!(
        backend.statements().first().map(String::as_str),
        Some("SELECT *\nFROM t\nWHERE parent_id = 4 AND active = 1\nLIMIT 1000")
    );
    assert_eq!(cursor.row_number(), None);
}
