//! Change tracking and the `new`/`save`/`cancel`/`delete` lifecycle.
//!
//! Writes go through the auxiliary cursor and are minimal: a row whose
//! diff against its memento is empty never produces a statement.

use super::{Cursor, invalid_row};
use crate::models::{Record, Value};
use crate::{Error, Result};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::instrument;

impl Cursor {
    /// Snapshots the current values of `row`, or of every row for `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if `row` is outside a non-empty set.
    pub fn add_memento(&mut self, row: Option<usize>) -> Result<()> {
        if self.records.is_empty() {
            return Ok(());
        }
        match row {
            None => self.records.iter_mut().for_each(Record::set_memento),
            Some(row) => self
                .records
                .get_mut(row)
                .ok_or_else(|| invalid_row(row))?
                .set_memento(),
        }
        Ok(())
    }

    /// Re-captures the memento of the current row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set.
    pub fn set_memento(&mut self) -> Result<()> {
        let row = self.row;
        self.records
            .get_mut(row)
            .ok_or_else(Error::empty_data_set)?
            .set_memento();
        Ok(())
    }

    /// Assigns default values to the current row and re-captures its memento.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or [`Error::Data`] for
    /// an unknown field.
    pub fn set_defaults<I, K, V>(&mut self, defaults: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let row = self.row;
        let rec = self.records.get_mut(row).ok_or_else(Error::empty_data_set)?;
        for (field, value) in defaults {
            rec.set(&field.as_ref().to_lowercase(), value.into())?;
        }
        rec.set_memento();
        Ok(())
    }

    /// True if the current row, or any row with `all_rows`, has changes.
    #[must_use]
    pub fn is_changed(&self, all_rows: bool) -> bool {
        if all_rows {
            self.records.iter().any(Record::is_changed)
        } else {
            self.current_record().is_some_and(Record::is_changed)
        }
    }

    /// True if `row` is new or differs from its memento.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] for an invalid row.
    pub fn is_row_changed(&self, row: usize) -> Result<bool> {
        self.records
            .get(row)
            .map(Record::is_changed)
            .ok_or_else(|| invalid_row(row))
    }

    /// Appends a blank record flagged new and moves to it.
    ///
    /// The blank template comes from a zero-row variant of the current SQL
    /// and is derived once per table. When keys are populated by the
    /// backend, the record gets the next temporary key (`-1`, `-2`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the record structure cannot be determined.
    pub fn new_record(&mut self) -> Result<()> {
        let template = self.blank_template()?;
        let keys = self.key_fields();

        let temp_pk = match keys.as_slice() {
            [key] if self.auto_populate_pk && template.contains_key(key) => {
                let pk = self.next_temp_pk;
                self.next_temp_pk -= 1;
                Some((key.clone(), pk))
            },
            _ => None,
        };

        let mut rec = Record::new(template);
        if let Some((key, pk)) = &temp_pk {
            rec.set(key, Value::Integer(*pk))?;
        }
        rec.mark_new(temp_pk.map(|(_, pk)| pk));
        rec.set_memento();

        self.records.push(rec);
        self.row = self.records.len() - 1;
        Ok(())
    }

    fn blank_template(&mut self) -> Result<IndexMap<String, Value>> {
        if let Some(blank) = &self.blank {
            let same_shape = self.description.is_empty()
                || (blank.len() == self.description.len()
                    && self.description.iter().all(|col| blank.contains_key(&col.name)));
            if same_shape {
                return Ok(blank.clone());
            }
        }
        let sql = self.structure_only_sql();
        let aux = self.aux_cursor();
        aux.execute(&sql, &[])?;
        let description = aux.description().to_vec();

        let blank: IndexMap<String, Value> = description
            .iter()
            .map(|col| (col.name.clone(), col.blank_value()))
            .collect();
        if blank.is_empty() {
            return Err(Error::Data("unable to determine the record structure".to_string()));
        }
        if self.description.is_empty() {
            self.description = description;
            self.refresh_non_update_fields()?;
        }
        self.blank = Some(blank.clone());
        Ok(blank)
    }

    /// Writes the changes of the current row, or of every row.
    ///
    /// New rows become `INSERT`s, persisted rows `UPDATE`s keyed on their
    /// original key values. Non-update fields are never written. Saved
    /// rows get a fresh memento.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] on an empty set or an invalid key field, and
    /// [`Error::Execution`] if a statement fails.
    #[instrument(skip_all, fields(table = %self.table, all_rows))]
    pub fn save(&mut self, all_rows: bool) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::Data("no data to save".to_string()));
        }
        self.check_pk()?;
        self.require_table()?;

        let keys = self.key_fields();
        let skip = self.non_update_fields();
        let rows: Vec<usize> = if all_rows {
            (0..self.records.len()).collect()
        } else {
            vec![self.row]
        };

        let mut written = 0usize;
        for row in rows {
            if self.save_row(row, &keys, &skip)? {
                written += 1;
            }
        }
        tracing::debug!(written, "save complete");
        Ok(())
    }

    fn save_row(&mut self, row: usize, keys: &[String], skip: &[String]) -> Result<bool> {
        let rec = &self.records[row];
        if !rec.is_changed() {
            return Ok(false);
        }
        let diff: IndexMap<String, Value> = rec
            .diff()
            .into_iter()
            .filter(|(field, _)| !skip.contains(field))
            .collect();
        if diff.is_empty() {
            return Ok(false);
        }

        if rec.is_new() {
            self.insert_row(row, &diff, keys)?;
        } else {
            self.update_row(row, &diff)?;
        }
        Ok(true)
    }

    fn insert_row(&mut self, row: usize, diff: &IndexMap<String, Value>, keys: &[String]) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let auto_pk = self.auto_populate_pk;
        let (names, values): (Vec<&str>, Vec<String>) = diff
            .iter()
            .filter(|(field, _)| !(auto_pk && keys.contains(*field)))
            .map(|(field, value)| (field.as_str(), backend.format_for_query(value)))
            .unzip();

        let sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                names.join(", "),
                values.join(", ")
            )
        };
        self.aux_cursor().execute(&sql, &[])?;

        if let ([key], true) = (keys, auto_pk) {
            let id = backend.get_last_insert_id(self.aux_cursor())?;
            if !id.is_null() {
                self.records[row].set(key, id)?;
            }
        }

        let rec = &mut self.records[row];
        rec.clear_new();
        rec.set_memento();
        Ok(())
    }

    fn update_row(&mut self, row: usize, diff: &IndexMap<String, Value>) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let prefix = backend.update_table_prefix(&self.table);
        let assignments: Vec<String> = diff
            .iter()
            .map(|(field, value)| format!("{prefix}{field} = {}", backend.format_for_query(value)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.table,
            assignments.join(", "),
            self.make_pk_where(row)
        );

        let aux = self.aux_cursor();
        aux.execute(&sql, &[])?;
        if matches!(aux.rows_affected(), None | Some(0)) {
            backend.no_results_on_save()?;
        }
        self.records[row].set_memento();
        Ok(())
    }

    /// Discards the changes of the current row, or of every row.
    ///
    /// New rows are removed; persisted rows get their original values back.
    /// Mementos are left untouched, so cancelling twice is harmless.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] on an empty set.
    pub fn cancel(&mut self, all_rows: bool) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::Data("no data to cancel".to_string()));
        }
        let rows: Vec<usize> = if all_rows {
            (0..self.records.len()).rev().collect()
        } else {
            vec![self.row]
        };

        for row in rows {
            let rec = &mut self.records[row];
            if !rec.is_changed() {
                continue;
            }
            if rec.is_new() {
                self.remove_row(row)?;
            } else {
                rec.revert();
            }
        }
        Ok(())
    }

    /// Deletes `row`, or the current row for `None`.
    ///
    /// Unsaved rows are only dropped from memory. Persisted rows are deleted
    /// by key; when the backend reports no affected rows, the matching-row
    /// count taken beforehand stands in. A delete that matched nothing is
    /// handed to the backend's hook and the row stays in memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set or an invalid row,
    /// [`Error::Data`] for an invalid key field, and [`Error::Execution`]
    /// if a statement fails.
    #[instrument(skip_all, fields(table = %self.table))]
    pub fn delete(&mut self, row: Option<usize>) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::NoRecords("no record to delete".to_string()));
        }
        let row = row.unwrap_or(self.row);
        if row >= self.records.len() {
            return Err(Error::NoRecords(format!("invalid row specified: {row}")));
        }
        if self.records[row].is_new() {
            return self.remove_row(row);
        }
        self.check_pk()?;
        self.require_table()?;

        let backend = Arc::clone(&self.backend);
        let table = self.table.clone();
        let pk_where = self.make_pk_where(row);

        let aux = self.aux_cursor();
        aux.execute(&format!("SELECT COUNT(*) AS cnt FROM {table} WHERE {pk_where}"), &[])?;
        let matching = aux
            .get_field_val("cnt")
            .ok()
            .and_then(Value::as_i64)
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);
        aux.execute(&format!("DELETE FROM {table} WHERE {pk_where}"), &[])?;

        if aux.rows_affected().unwrap_or(matching) == 0 {
            return backend.no_results_on_delete();
        }
        self.remove_row(row)
    }

    /// Drops `row` from memory without touching the backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] for an invalid row.
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        if row >= self.records.len() {
            return Err(invalid_row(row));
        }
        self.records.remove(row);
        self.clamp_row();
        Ok(())
    }

    /// Checks that a key field is set and present in the record shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] naming the problem.
    pub fn check_pk(&self) -> Result<()> {
        let keys = self.key_fields();
        if keys.is_empty() {
            return Err(Error::Data("checkPK failed; no primary key specified".to_string()));
        }
        let shape: Vec<&str> = match self.records.first() {
            Some(rec) => rec.field_names().collect(),
            None => self.description.iter().map(|c| c.name.as_str()).collect(),
        };
        if shape.is_empty() {
            return Ok(());
        }
        match keys.iter().find(|k| !shape.contains(&k.as_str())) {
            Some(missing) => Err(Error::Data(format!(
                "primary key field does not exist in the data set: {missing}"
            ))),
            None => Ok(()),
        }
    }

    fn require_table(&self) -> Result<()> {
        if self.table.trim().is_empty() {
            return Err(Error::Data("no table specified".to_string()));
        }
        Ok(())
    }

    /// Key equality condition for `row`, using original key values.
    fn make_pk_where(&self, row: usize) -> String {
        let prefix = self.backend.where_table_prefix(&self.table);
        let rec = &self.records[row];
        self.key_fields()
            .iter()
            .map(|key| {
                let value = rec
                    .memento()
                    .and_then(|m| m.orig_val(key))
                    .or_else(|| rec.get(key))
                    .cloned()
                    .unwrap_or_default();
                if value.is_null() {
                    format!("{prefix}{key} IS NULL")
                } else {
                    format!("{prefix}{key}={}", self.backend.format_for_query(&value))
                }
            })
            .collect::<Vec<_>>()
            .join(" AND ")
    }

    /// Declares fields that must never be written back.
    pub fn set_non_update_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.user_non_update_fields = fields
            .into_iter()
            .map(|f| f.as_ref().trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .collect();
    }

    /// Declared plus derived non-update fields.
    #[must_use]
    pub fn non_update_fields(&self) -> Vec<String> {
        let mut fields = self.user_non_update_fields.clone();
        for field in &self.derived_non_update_fields {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
        fields
    }
}
