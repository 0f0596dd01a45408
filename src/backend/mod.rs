//! Backend adapter protocol.
//!
//! A [`Backend`] is the per-engine strategy object behind a [`Cursor`]. It
//! owns the driver connection and decides everything dialect-specific:
//! literal escaping, clause formatting, limit placement, table prefixes,
//! transaction primitives, schema introspection and DDL generation.
//!
//! Only [`Backend::execute`], [`Backend::name`], [`Backend::get_tables`],
//! [`Backend::get_fields`] and [`Backend::get_last_insert_id`] are required;
//! every other hook has a generic default that engines override where their
//! dialect differs.
//!
//! Methods that need to run their own queries receive the cursor's
//! auxiliary [`Cursor`], so structural queries never disturb the primary
//! result set.

pub mod sqlite;

pub use sqlite::SqliteBackend;

use crate::cursor::Cursor;
use crate::models::{ColumnDesc, DataType, FieldInfo, TableDef, Value};
use crate::{Error, Result};

/// Raw outcome of one statement, before the cursor turns it into records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    /// Result columns; empty for statements that return no result set.
    pub columns: Vec<ColumnDesc>,
    /// Row tuples in column order.
    pub rows: Vec<Vec<Value>>,
    /// Rows affected by DML, when the engine reports it.
    pub rows_affected: Option<u64>,
}

impl QueryResult {
    /// A result set.
    #[must_use]
    pub const fn rows(columns: Vec<ColumnDesc>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            rows_affected: None,
        }
    }

    /// The outcome of a statement that returns no rows.
    #[must_use]
    pub const fn affected(count: Option<u64>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: count,
        }
    }

    /// Returns true if the statement produced a result set.
    #[must_use]
    pub fn has_result_set(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Placement of the row-limit clause in a `SELECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitPosition {
    /// Directly after `SELECT` (`SELECT TOP 10 ...`).
    Top,
    /// At the end of the statement (`... LIMIT 10`).
    #[default]
    Bottom,
}

/// Per-engine adapter used by [`Cursor`].
pub trait Backend: Send + Sync {
    /// Short engine name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// Character encoding the adapter decodes text with.
    fn encoding(&self) -> &'static str {
        "utf-8"
    }

    /// Runs one statement on the driver.
    ///
    /// Text must be decoded and date/time values normalized into the
    /// canonical [`Value`] variants before returning.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] carrying the driver's message.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Rewrites field references in a statement before execution.
    fn process_fields(&self, sql: &str) -> String {
        sql.to_string()
    }

    /// Pre-processes a full SQL statement assigned to a cursor.
    fn set_sql(&self, sql: &str) -> String {
        sql.to_string()
    }

    /// Quotes a string literal, doubling backslashes and single quotes.
    fn esc_quote(&self, val: &str) -> String {
        format!("'{}'", val.replace('\\', "\\\\").replace('\'', "''"))
    }

    /// Formats a date/time value as a quoted literal in canonical form.
    fn format_date_time(&self, val: &Value) -> String {
        format!("'{val}'")
    }

    /// Formats any value as a SQL literal.
    fn format_for_query(&self, val: &Value) -> String {
        match val {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.clone(),
            Value::Bool(b) => String::from(if *b { "1" } else { "0" }),
            Value::Text(s) => self.esc_quote(s),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => self.format_date_time(val),
            Value::Blob(bytes) => format!("X'{}'", hex::encode(bytes)),
        }
    }

    /// Formats a replacement field clause.
    fn set_field_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Appends an expression to the field clause.
    fn add_field(&self, current: &str, exp: &str) -> String {
        append_clause(current, exp, ", ")
    }

    /// Formats a replacement from clause.
    fn set_from_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Appends a table to the from clause.
    fn add_from(&self, current: &str, exp: &str) -> String {
        append_clause(current, exp, ", ")
    }

    /// Formats a replacement where clause.
    fn set_where_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Appends a condition to the where clause joined by `comp` (`AND`/`OR`).
    fn add_where(&self, current: &str, exp: &str, comp: &str) -> String {
        append_clause(current, exp, &format!(" {} ", comp.trim().to_uppercase()))
    }

    /// Adjusts a where clause for this engine just before assembly.
    fn prepare_where(&self, clause: &str) -> String {
        clause.to_string()
    }

    /// Formats a replacement child-filter clause.
    fn set_child_filter_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Formats a replacement group-by clause.
    fn set_group_by_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Appends an expression to the group-by clause.
    fn add_group_by(&self, current: &str, exp: &str) -> String {
        append_clause(current, exp, ", ")
    }

    /// Formats a replacement order-by clause.
    fn set_order_by_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Appends an expression to the order-by clause.
    fn add_order_by(&self, current: &str, exp: &str) -> String {
        append_clause(current, exp, ", ")
    }

    /// Formats a replacement limit clause.
    fn set_limit_clause(&self, clause: &str) -> String {
        clause.trim().to_string()
    }

    /// Keyword introducing the row limit.
    fn limit_word(&self) -> &'static str {
        "LIMIT"
    }

    /// Where the limit clause goes.
    fn limit_position(&self) -> LimitPosition {
        LimitPosition::Bottom
    }

    /// Joins the already keyword-prefixed clauses into a `SELECT` statement.
    ///
    /// `fields` is the bare field list; every other argument is either empty
    /// or starts with its keyword (`FROM`, `WHERE`, `GROUP BY`, `ORDER BY`,
    /// limit word).
    fn form_sql(
        &self,
        fields: &str,
        from: &str,
        where_clause: &str,
        group_by: &str,
        order_by: &str,
        limit: &str,
    ) -> String {
        let select = match self.limit_position() {
            LimitPosition::Top => format!("SELECT {limit} {fields}"),
            LimitPosition::Bottom => format!("SELECT {fields}"),
        };
        let tail = match self.limit_position() {
            LimitPosition::Top => "",
            LimitPosition::Bottom => limit,
        };
        [select.as_str(), from, where_clause, group_by, order_by, tail]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Prefix for column names in an `UPDATE ... SET` list.
    fn update_table_prefix(&self, _table: &str) -> String {
        String::new()
    }

    /// Prefix for column names in a key `WHERE` condition.
    fn where_table_prefix(&self, table: &str) -> String {
        format!("{table}.")
    }

    /// Engine-specific zero-row variant of `sql`, if the engine has one.
    ///
    /// Returning `None` lets the cursor fall back to textual rewriting.
    fn structure_only_sql(&self, _sql: &str) -> Option<String> {
        None
    }

    /// Starts a transaction.
    fn begin_transaction(&self, cursor: &mut Cursor) -> Result<()> {
        cursor.execute("BEGIN", &[])
    }

    /// Commits the current transaction.
    fn commit_transaction(&self, cursor: &mut Cursor) -> Result<()> {
        cursor.execute("COMMIT", &[])
    }

    /// Rolls back the current transaction.
    fn rollback_transaction(&self, cursor: &mut Cursor) -> Result<()> {
        cursor.execute("ROLLBACK", &[])
    }

    /// Forces pending changes to durable storage.
    fn flush(&self, _cursor: &mut Cursor) -> Result<()> {
        Ok(())
    }

    /// Lists table names.
    fn get_tables(&self, cursor: &mut Cursor, include_system_tables: bool) -> Result<Vec<String>>;

    /// Describes the fields of `table`.
    fn get_fields(&self, cursor: &mut Cursor, table: &str) -> Result<Vec<FieldInfo>>;

    /// Returns the key generated by the most recent insert.
    fn get_last_insert_id(&self, cursor: &mut Cursor) -> Result<Value>;

    /// Counts the rows in `table`.
    fn get_table_record_count(&self, cursor: &mut Cursor, table: &str) -> Result<u64> {
        cursor.execute(&format!("SELECT COUNT(*) AS ncount FROM {table}"), &[])?;
        let count = cursor.get_field_val("ncount")?;
        count
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| Error::Data(format!("unexpected record count value: {count:?}")))
    }

    /// Returns true if `table` exists.
    fn is_existing_table(&self, cursor: &mut Cursor, table: &str) -> Result<bool> {
        Ok(self
            .get_tables(cursor, true)?
            .iter()
            .any(|t| t.eq_ignore_ascii_case(table)))
    }

    /// Describes the raw columns of `table`, for non-update field detection.
    fn base_table_columns(&self, cursor: &mut Cursor, table: &str) -> Result<Vec<ColumnDesc>> {
        cursor.execute(&format!("SELECT * FROM {table} WHERE 1=0"), &[])?;
        Ok(cursor.description().to_vec())
    }

    /// Decides whether a query column is the same updatable column as a
    /// same-named base-table column.
    ///
    /// The default compares declared types; engines that cannot report them
    /// for query columns should override this.
    fn columns_match(&self, query_column: &ColumnDesc, base_column: &ColumnDesc) -> bool {
        match (&query_column.decl_type, &base_column.decl_type) {
            (Some(q), Some(b)) => q.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        }
    }

    /// Called when an `UPDATE` reports no affected rows.
    fn no_results_on_save(&self) -> Result<()> {
        tracing::debug!(backend = self.name(), "update reported no affected rows");
        Ok(())
    }

    /// Called when a `DELETE` matched no rows.
    fn no_results_on_delete(&self) -> Result<()> {
        tracing::warn!(backend = self.name(), "delete matched no rows");
        Ok(())
    }

    /// Builds the `CREATE TABLE` statement for a portable definition.
    fn create_table_sql(&self, def: &TableDef) -> Result<String> {
        validate_table_def(def)?;
        let columns: Vec<String> = def
            .fields
            .iter()
            .map(|field| {
                let mut col = format!("{} {}", field.name, generic_type_name(field.data_type));
                if field.is_pk {
                    col.push_str(" PRIMARY KEY");
                }
                if !field.allow_nulls {
                    col.push_str(" NOT NULL");
                }
                if let Some(default) = &field.default {
                    col.push_str(" DEFAULT ");
                    col.push_str(&self.format_for_query(default));
                }
                col
            })
            .collect();
        let temp = if def.is_temp { "TEMPORARY " } else { "" };
        Ok(format!("CREATE {temp}TABLE {} ({})", def.name, columns.join(", ")))
    }

    /// Builds the `CREATE INDEX` statements for a portable definition.
    fn create_index_sql(&self, def: &TableDef) -> Vec<String> {
        def.indexes
            .iter()
            .filter(|idx| !idx.name.eq_ignore_ascii_case("primary"))
            .map(|idx| {
                format!(
                    "CREATE INDEX {} ON {}({})",
                    idx.name,
                    def.name,
                    idx.fields.join(", ")
                )
            })
            .collect()
    }

    /// Creates a table and its indexes.
    fn create_table_and_indexes(
        &self,
        cursor: &mut Cursor,
        def: &TableDef,
        create_table: bool,
        create_indexes: bool,
    ) -> Result<()> {
        if create_table {
            let sql = self.create_table_sql(def)?;
            cursor.execute(&sql, &[])?;
        }
        if create_indexes {
            for sql in self.create_index_sql(def) {
                cursor.execute(&sql, &[])?;
            }
        }
        Ok(())
    }
}

/// Appends `exp` to a clause with `sep`, or starts the clause.
pub fn append_clause(current: &str, exp: &str, sep: &str) -> String {
    let current = current.trim();
    let exp = exp.trim();
    if current.is_empty() {
        exp.to_string()
    } else if exp.is_empty() {
        current.to_string()
    } else {
        format!("{current}{sep}{exp}")
    }
}

/// Rejects table definitions that cannot produce valid DDL.
pub(crate) fn validate_table_def(def: &TableDef) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::Data("table definition has no name".to_string()));
    }
    if def.fields.is_empty() {
        return Err(Error::Data(format!("table '{}' has no fields", def.name)));
    }
    Ok(())
}

const fn generic_type_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Numeric => "INTEGER",
        DataType::Float => "FLOAT",
        DataType::Decimal => "DECIMAL",
        DataType::String => "VARCHAR(255)",
        DataType::Date => "DATE",
        DataType::Time => "TIME",
        DataType::DateTime | DataType::Stamp => "TIMESTAMP",
        DataType::Binary => "BLOB",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldDef, IndexDef};
    use chrono::NaiveDate;
    use test_case::test_case;

    /// Backend relying on every default hook.
    struct GenericBackend;

    impl Backend for GenericBackend {
        fn name(&self) -> &'static str {
            "generic"
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
            Ok(QueryResult::affected(Some(0)))
        }

        fn get_tables(&self, _cursor: &mut Cursor, _system: bool) -> Result<Vec<String>> {
            Ok(vec!["t".to_string()])
        }

        fn get_fields(&self, _cursor: &mut Cursor, _table: &str) -> Result<Vec<FieldInfo>> {
            Ok(Vec::new())
        }

        fn get_last_insert_id(&self, _cursor: &mut Cursor) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test_case(Value::Null, "NULL" ; "null")]
    #[test_case(Value::Integer(42), "42" ; "integer")]
    #[test_case(Value::Bool(true), "1" ; "bool true")]
    #[test_case(Value::Bool(false), "0" ; "bool false")]
    #[test_case(Value::from("O'Brien"), "'O''Brien'" ; "quote doubling")]
    #[test_case(Value::from(r"a\b"), r"'a\\b'" ; "backslash doubling")]
    #[test_case(Value::Decimal("12.50".into()), "12.50" ; "decimal")]
    #[test_case(Value::Blob(vec![1, 255]), "X'01ff'" ; "blob")]
    fn test_format_for_query(value: Value, expected: &str) {
        assert_eq!(GenericBackend.format_for_query(&value), expected);
    }

    #[test]
    fn test_format_date_time() {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(GenericBackend.format_for_query(&Value::Date(d)), "'2024-02-29'");
        let dt = d.and_hms_opt(13, 5, 0).unwrap();
        assert_eq!(
            GenericBackend.format_for_query(&Value::DateTime(dt)),
            "'2024-02-29 13:05:00'"
        );
    }

    #[test]
    fn test_clause_appending() {
        let b = GenericBackend;
        assert_eq!(b.add_field("", "id"), "id");
        assert_eq!(b.add_field("id", "name"), "id, name");
        assert_eq!(b.add_where("a = 1", "b = 2", "or"), "a = 1 OR b = 2");
        assert_eq!(b.add_where("", "b = 2", "and"), "b = 2");
        assert_eq!(b.add_order_by("name", " id DESC "), "name, id DESC");
    }

    #[test]
    fn test_form_sql_bottom_limit() {
        let sql = GenericBackend.form_sql("*", "FROM t", "WHERE a = 1", "", "ORDER BY a", "LIMIT 5");
        assert_eq!(sql, "SELECT *\nFROM t\nWHERE a = 1\nORDER BY a\nLIMIT 5");
    }

    #[test]
    fn test_form_sql_top_limit() {
        struct TopBackend;
        impl Backend for TopBackend {
            fn name(&self) -> &'static str {
                "top"
            }
            fn execute(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
                Ok(QueryResult::default())
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

        let sql = TopBackend.form_sql("id", "FROM t", "", "", "", "TOP 10");
        assert_eq!(sql, "SELECT TOP 10 id\nFROM t");
    }

    #[test]
    fn test_default_prefixes() {
        assert_eq!(GenericBackend.update_table_prefix("t"), "");
        assert_eq!(GenericBackend.where_table_prefix("t"), "t.");
    }

    #[test]
    fn test_columns_match() {
        let b = GenericBackend;
        let int = ColumnDesc::new("a", Some("INTEGER".to_string()));
        let int_lower = ColumnDesc::new("a", Some("integer".to_string()));
        let text = ColumnDesc::new("a", Some("TEXT".to_string()));
        let none = ColumnDesc::new("a", None);
        assert!(b.columns_match(&int, &int_lower));
        assert!(!b.columns_match(&int, &text));
        assert!(!b.columns_match(&none, &int));
    }

    #[test]
    fn test_generic_ddl() {
        let def = TableDef::new("people")
            .field(FieldDef::new("id", DataType::Numeric).primary_key(true))
            .field(FieldDef::new("name", DataType::String).not_null().with_default("x"))
            .index(IndexDef::new("primary", ["id"]))
            .index(IndexDef::new("idx_name", ["name"]));

        assert_eq!(
            GenericBackend.create_table_sql(&def).unwrap(),
            "CREATE TABLE people (id INTEGER PRIMARY KEY NOT NULL, name VARCHAR(255) NOT NULL DEFAULT 'x')"
        );
        assert_eq!(
            GenericBackend.create_index_sql(&def),
            vec!["CREATE INDEX idx_name ON people(name)".to_string()]
        );
    }

    #[test]
    fn test_ddl_requires_name_and_fields() {
        assert!(GenericBackend.create_table_sql(&TableDef::new("")).is_err());
        assert!(GenericBackend.create_table_sql(&TableDef::new("t")).is_err());
    }
}
