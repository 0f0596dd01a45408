//! The record-set cursor.
//!
//! A [`Cursor`] runs SQL through its [`Backend`], keeps the returned rows as
//! [`Record`]s together with a row pointer, and writes changes back with the
//! smallest possible set of statements.
//!
//! The implementation is split by concern:
//!
//! - [`builder`]: clause state and `SELECT` assembly
//! - [`sort`]: client-side sorting and seeking
//! - [`persist`]: mementos, `new`/`save`/`cancel`/`delete`
//! - [`xml`]: XML export of the record set
//!
//! Structural queries and DML are always routed through a lazily created
//! auxiliary cursor that shares the backend, so they never disturb the rows
//! or the row pointer of the primary cursor.

mod builder;
mod persist;
mod sort;
mod xml;

pub use sort::SortOrder;

use crate::backend::Backend;
use crate::config::CursorConfig;
use crate::models::{ColumnDesc, FieldInfo, Record, TableDef, Value};
use crate::observability::{NoopObserver, SQL_LOG_TARGET, SqlObserver};
use crate::{Error, Result};
use builder::SqlBuilder;
use indexmap::IndexMap;
use std::mem::discriminant;
use std::sync::Arc;
use tracing::instrument;

/// Stateful handle over a query's result set plus SQL-builder state.
pub struct Cursor {
    backend: Arc<dyn Backend>,
    config: CursorConfig,
    observer: Arc<dyn SqlObserver>,

    records: Vec<Record>,
    row: usize,
    description: Vec<ColumnDesc>,

    user_sql: Option<String>,
    last_sql: String,
    last_params: Vec<Value>,
    rows_affected: Option<u64>,

    table: String,
    key_field: String,
    auto_populate_pk: bool,

    sort_column: String,
    sort_order: SortOrder,
    sort_case_sensitive: bool,
    unsorted_keys: Vec<Vec<Value>>,

    user_non_update_fields: Vec<String>,
    derived_non_update_fields: Vec<String>,
    blank: Option<IndexMap<String, Value>>,
    next_temp_pk: i64,

    builder: SqlBuilder,
    aux: Option<Box<Self>>,
}

impl Cursor {
    /// Creates an empty cursor bound to `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: CursorConfig) -> Self {
        Self {
            backend,
            auto_populate_pk: config.auto_populate_pk,
            builder: SqlBuilder::new(config.default_limit),
            config,
            observer: Arc::new(NoopObserver),
            records: Vec::new(),
            row: 0,
            description: Vec::new(),
            user_sql: None,
            last_sql: String::new(),
            last_params: Vec::new(),
            rows_affected: None,
            table: String::new(),
            key_field: String::new(),
            sort_column: String::new(),
            sort_order: SortOrder::Unsorted,
            sort_case_sensitive: true,
            unsorted_keys: Vec::new(),
            user_non_update_fields: Vec::new(),
            derived_non_update_fields: Vec::new(),
            blank: None,
            next_temp_pk: -1,
            aux: None,
        }
    }

    /// Attaches a statement observer, shared with the auxiliary cursor.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SqlObserver>) -> Self {
        if let Some(aux) = self.aux.as_mut() {
            aux.observer = Arc::clone(&observer);
        }
        self.observer = observer;
        self
    }

    /// Returns the backend adapter.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Replaces the backend adapter for this cursor and its auxiliary cursor.
    pub fn set_backend(&mut self, backend: Arc<dyn Backend>) {
        if let Some(aux) = self.aux.as_mut() {
            aux.backend = Arc::clone(&backend);
        }
        self.backend = backend;
        self.blank = None;
    }

    /// Returns the runtime configuration.
    #[must_use]
    pub const fn config(&self) -> &CursorConfig {
        &self.config
    }

    /// Backing table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Sets the backing table used for `FROM` defaults and generated DML.
    pub fn set_table(&mut self, table: impl Into<String>) {
        let table = table.into();
        if table != self.table {
            self.blank = None;
        }
        self.table = table;
    }

    /// Key field descriptor, possibly comma separated for composite keys.
    #[must_use]
    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Sets the key field descriptor.
    pub fn set_key_field(&mut self, key_field: impl Into<String>) {
        self.key_field = key_field.into();
    }

    /// Whether the backend assigns keys on insert.
    #[must_use]
    pub const fn auto_populate_pk(&self) -> bool {
        self.auto_populate_pk
    }

    /// Sets whether the backend assigns keys on insert.
    pub const fn set_auto_populate_pk(&mut self, auto_populate_pk: bool) {
        self.auto_populate_pk = auto_populate_pk;
    }

    /// Returns the auxiliary cursor, creating it on first use.
    ///
    /// Table, key field and key population are synced on every access.
    pub(crate) fn aux_cursor(&mut self) -> &mut Self {
        let aux = self.aux.get_or_insert_with(|| {
            let mut aux = Self::new(Arc::clone(&self.backend), self.config.clone());
            aux.observer = Arc::clone(&self.observer);
            Box::new(aux)
        });
        aux.table.clone_from(&self.table);
        aux.key_field.clone_from(&self.key_field);
        aux.auto_populate_pk = self.auto_populate_pk;
        aux
    }

    // ------------------------------------------------------------------
    // Query execution
    // ------------------------------------------------------------------

    /// Runs `sql` on the backend.
    ///
    /// When the statement returns a result set, the records and column
    /// description are replaced wholesale; otherwise they are kept and only
    /// the affected-row count is updated. The row pointer is clamped into
    /// range afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Execution`] if the driver rejects the statement.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        let sql = self.backend.process_fields(sql);
        if self.config.log_sql {
            tracing::debug!(
                target: SQL_LOG_TARGET,
                backend = self.backend.name(),
                params = params.len(),
                "{sql}"
            );
        }
        self.observer.on_statement(&sql);
        self.last_params = params.to_vec();

        let result = self.backend.execute(&sql, params);
        self.last_sql = sql;
        let result = result?;

        self.rows_affected = result.rows_affected;
        if result.has_result_set() {
            self.description = result
                .columns
                .into_iter()
                .map(|col| ColumnDesc::new(col.name.to_lowercase(), col.decl_type))
                .collect();
            let names: Vec<String> = self.description.iter().map(|c| c.name.clone()).collect();
            self.records = result
                .rows
                .into_iter()
                .map(|tuple| Record::new(names.iter().cloned().zip(tuple).collect()))
                .collect();
        }
        self.clamp_row();
        Ok(())
    }

    /// Re-runs the current SQL and resets change tracking.
    ///
    /// Uses the SQL assigned with [`Cursor::set_sql`], or the builder SQL if
    /// none was assigned. Fresh mementos are attached to every row, the
    /// non-update fields are recomputed and the active sort is re-applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the query or the sort re-application fails.
    #[instrument(skip_all, fields(table = %self.table))]
    pub fn requery(&mut self, params: &[Value]) -> Result<()> {
        let sql = self.current_sql();
        self.execute(&sql, params)?;
        self.add_memento(None)?;
        self.refresh_non_update_fields()?;
        self.unsorted_keys.clear();

        if !self.sort_column.is_empty() && self.sort_order != SortOrder::Unsorted {
            match self.sort_rows() {
                Ok(()) | Err(Error::NoRecords(_)) => {},
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(rows = self.records.len(), "requery complete");
        Ok(())
    }

    /// Recomputes the fields that cannot be written back to the table.
    fn refresh_non_update_fields(&mut self) -> Result<()> {
        self.derived_non_update_fields.clear();
        if self.table.is_empty() || self.description.is_empty() {
            return Ok(());
        }
        let backend = Arc::clone(&self.backend);
        let table = self.table.clone();
        let base = backend.base_table_columns(self.aux_cursor(), &table)?;

        self.derived_non_update_fields = self
            .description
            .iter()
            .filter(|col| {
                base.iter()
                    .find(|b| b.name.eq_ignore_ascii_case(&col.name))
                    .is_none_or(|b| !backend.columns_match(col, b))
            })
            .map(|col| col.name.clone())
            .collect();
        if !self.derived_non_update_fields.is_empty() {
            tracing::debug!(fields = ?self.derived_non_update_fields, "derived non-update fields");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------

    /// Returns `field` of the current row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or [`Error::Data`] for
    /// an unknown field.
    pub fn get_field_val(&self, field: &str) -> Result<&Value> {
        self.get_field_val_at(self.row, field)
    }

    /// Returns `field` of `row`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] if the row does not exist or
    /// [`Error::Data`] for an unknown field.
    pub fn get_field_val_at(&self, row: usize, field: &str) -> Result<&Value> {
        let rec = self.records.get(row).ok_or_else(Error::empty_data_set)?;
        rec.get(field)
            .or_else(|| rec.get(&field.to_lowercase()))
            .ok_or_else(|| Error::no_such_field(field))
    }

    /// Assigns `field` of the current row.
    ///
    /// A memento is captured before the first edit of a row that has none.
    /// Booleans written to integer fields are stored as `0`/`1`. Type
    /// mismatches on persisted rows are logged but not rejected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or [`Error::Data`] for
    /// an unknown field.
    pub fn set_field_val(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let row = self.row;
        let rec = self.records.get_mut(row).ok_or_else(Error::empty_data_set)?;
        let name = if rec.contains(field) {
            field.to_string()
        } else {
            field.to_lowercase()
        };
        let current = rec.get(&name).ok_or_else(|| Error::no_such_field(field))?;

        let value = match (current, value.into()) {
            (Value::Integer(_), Value::Bool(b)) => Value::Integer(i64::from(b)),
            (_, value) => value,
        };
        if !rec.is_new() && !types_compatible(current, &value) {
            tracing::warn!(
                field = %name,
                expected = current.type_name(),
                actual = value.type_name(),
                "data type mismatch"
            );
        }

        rec.ensure_memento();
        rec.set(&name, value)?;
        Ok(())
    }

    /// Returns the key values of the current row.
    ///
    /// Unsaved rows report their temporary key when keys are populated by
    /// the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or [`Error::Data`] if
    /// the key field is missing.
    pub fn get_pk(&self) -> Result<Vec<Value>> {
        let rec = self.records.get(self.row).ok_or_else(Error::empty_data_set)?;
        if self.auto_populate_pk && rec.is_new() {
            if let Some(temp) = rec.temp_pk() {
                return Ok(vec![Value::Integer(temp)]);
            }
        }
        self.check_pk()?;
        Ok(record_key(rec, &self.key_fields()))
    }

    /// Returns `field -> (original, current)` for every changed field of
    /// `row`, or of the current row when `row` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or [`Error::Data`] for
    /// an invalid row.
    pub fn get_record_status(&self, row: Option<usize>) -> Result<IndexMap<String, (Value, Value)>> {
        if self.records.is_empty() {
            return Err(Error::empty_data_set());
        }
        let row = row.unwrap_or(self.row);
        let rec = self.records.get(row).ok_or_else(|| invalid_row(row))?;
        let Some(memento) = rec.memento() else {
            return Ok(IndexMap::new());
        };
        Ok(rec
            .diff()
            .into_iter()
            .map(|(name, current)| {
                let orig = memento.orig_val(&name).cloned().unwrap_or_default();
                (name, (orig, current))
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Moves to the first row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set.
    pub fn first(&mut self) -> Result<()> {
        self.require_records()?;
        self.row = 0;
        Ok(())
    }

    /// Moves to the previous row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or
    /// [`Error::BeginningOfFile`] on the first row.
    pub fn prior(&mut self) -> Result<()> {
        self.require_records()?;
        if self.row == 0 {
            return Err(Error::BeginningOfFile);
        }
        self.row -= 1;
        Ok(())
    }

    /// Moves to the next row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or [`Error::EndOfFile`]
    /// on the last row.
    pub fn next(&mut self) -> Result<()> {
        self.require_records()?;
        if self.row + 1 >= self.records.len() {
            return Err(Error::EndOfFile);
        }
        self.row += 1;
        Ok(())
    }

    /// Moves to the last row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set.
    pub fn last(&mut self) -> Result<()> {
        self.require_records()?;
        self.row = self.records.len() - 1;
        Ok(())
    }

    /// Moves to `row`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if `row` is outside the record set.
    pub fn move_to_row_num(&mut self, row: usize) -> Result<()> {
        if row >= self.records.len() {
            return Err(invalid_row(row));
        }
        self.row = row;
        Ok(())
    }

    /// Moves to the row whose key equals `pk`, or to row 0 if none does.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if no valid key field is set.
    pub fn move_to_pk(&mut self, pk: &[Value]) -> Result<()> {
        self.check_pk()?;
        let keys = self.key_fields();
        self.row = self
            .records
            .iter()
            .position(|rec| record_key(rec, &keys) == pk)
            .unwrap_or(0);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Number of rows in the record set.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Current row, or `None` for an empty set.
    #[must_use]
    pub fn row_number(&self) -> Option<usize> {
        (!self.records.is_empty()).then_some(self.row)
    }

    /// The records in display order.
    #[must_use]
    pub fn data_set(&self) -> &[Record] {
        &self.records
    }

    /// The current record.
    #[must_use]
    pub fn current_record(&self) -> Option<&Record> {
        self.records.get(self.row)
    }

    /// Column description of the last result set.
    #[must_use]
    pub fn description(&self) -> &[ColumnDesc] {
        &self.description
    }

    /// The last statement sent to the backend.
    #[must_use]
    pub fn last_sql(&self) -> &str {
        &self.last_sql
    }

    /// Parameters of the last statement.
    #[must_use]
    pub fn last_params(&self) -> &[Value] {
        &self.last_params
    }

    /// Rows affected by the last statement, when reported.
    #[must_use]
    pub const fn rows_affected(&self) -> Option<u64> {
        self.rows_affected
    }

    /// True if the current row has not been saved yet.
    #[must_use]
    pub fn is_adding(&self) -> bool {
        self.current_record().is_some_and(Record::is_new)
    }

    /// Active sort column, empty if none.
    #[must_use]
    pub fn sort_column(&self) -> &str {
        &self.sort_column
    }

    /// Active sort order.
    #[must_use]
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Renders the record set as XML.
    #[must_use]
    pub fn to_xml(&self) -> String {
        xml::cursor_to_xml(self)
    }

    // ------------------------------------------------------------------
    // Backend delegation
    // ------------------------------------------------------------------

    /// Formats `val` as a SQL literal for this backend.
    #[must_use]
    pub fn escape_value(&self, val: &Value) -> String {
        self.backend.format_for_query(val)
    }

    /// Formats a date/time value as a quoted literal for this backend.
    #[must_use]
    pub fn format_date_time(&self, val: &Value) -> String {
        self.backend.format_date_time(val)
    }

    /// Starts a transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the statement.
    pub fn begin_transaction(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        backend.begin_transaction(self.aux_cursor())
    }

    /// Commits the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the statement.
    pub fn commit_transaction(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        backend.commit_transaction(self.aux_cursor())
    }

    /// Rolls back the current transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the statement.
    pub fn rollback_transaction(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        backend.rollback_transaction(self.aux_cursor())
    }

    /// Forces pending changes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to flush.
    pub fn flush(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        backend.flush(self.aux_cursor())
    }

    /// Lists the tables of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    pub fn get_tables(&mut self, include_system_tables: bool) -> Result<Vec<String>> {
        let backend = Arc::clone(&self.backend);
        backend.get_tables(self.aux_cursor(), include_system_tables)
    }

    /// Describes the fields of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    pub fn get_fields(&mut self, table: &str) -> Result<Vec<FieldInfo>> {
        let backend = Arc::clone(&self.backend);
        backend.get_fields(self.aux_cursor(), table)
    }

    /// Counts the rows of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    pub fn get_table_record_count(&mut self, table: &str) -> Result<u64> {
        let backend = Arc::clone(&self.backend);
        backend.get_table_record_count(self.aux_cursor(), table)
    }

    /// Returns true if `table` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    pub fn is_existing_table(&mut self, table: &str) -> Result<bool> {
        let backend = Arc::clone(&self.backend);
        backend.is_existing_table(self.aux_cursor(), table)
    }

    /// Creates a table and/or its indexes from a portable definition.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is invalid or the DDL fails.
    pub fn create_table_and_indexes(
        &mut self,
        def: &TableDef,
        create_table: bool,
        create_indexes: bool,
    ) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        backend.create_table_and_indexes(self.aux_cursor(), def, create_table, create_indexes)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn require_records(&self) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::empty_data_set());
        }
        Ok(())
    }

    fn clamp_row(&mut self) {
        self.row = self.row.min(self.records.len().saturating_sub(1));
    }

    /// Key field names, lower-cased.
    pub(crate) fn key_fields(&self) -> Vec<String> {
        self.key_field
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

/// Key values of `rec`, in key field order.
pub(crate) fn record_key(rec: &Record, keys: &[String]) -> Vec<Value> {
    keys.iter()
        .map(|k| rec.get(k).cloned().unwrap_or_default())
        .collect()
}

pub(crate) fn invalid_row(row: usize) -> Error {
    Error::Data(format!("invalid row specified: {row}"))
}

fn types_compatible(current: &Value, new: &Value) -> bool {
    current.is_null()
        || new.is_null()
        || discriminant(current) == discriminant(new)
        || (current.is_temporal() && new.is_text())
}
