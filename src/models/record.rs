//! Records and column descriptions.

use super::{Memento, Value};
use crate::{Error, Result};
use indexmap::IndexMap;

/// Description of one result column as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDesc {
    /// Column name, lower-cased.
    pub name: String,
    /// Declared type of the underlying column, if the engine exposes one.
    pub decl_type: Option<String>,
}

impl ColumnDesc {
    /// Creates a column description.
    #[must_use]
    pub fn new(name: impl Into<String>, decl_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            decl_type,
        }
    }

    /// Returns a placeholder value for a new record in this column.
    ///
    /// The declared type picks the variant; undeclared columns get empty text.
    #[must_use]
    pub fn blank_value(&self) -> Value {
        let Some(decl) = self.decl_type.as_deref() else {
            return Value::Text(String::new());
        };
        let decl = decl.to_lowercase();
        if decl.contains("int") {
            Value::Integer(0)
        } else if decl.contains("bool") {
            Value::Bool(false)
        } else if decl.contains("real") || decl.contains("floa") || decl.contains("doub") {
            Value::Float(0.0)
        } else if decl.starts_with("dec") || decl.starts_with("num") {
            Value::Decimal("0".to_string())
        } else if decl.contains("date") || decl.contains("time") {
            Value::Null
        } else if decl.contains("blob") {
            Value::Blob(Vec::new())
        } else {
            Value::Text(String::new())
        }
    }
}

/// One row of a record set.
///
/// Holds the field values in column order plus the sidecar state the cursor
/// uses for change tracking: the memento, the new-record flag and the
/// temporary key of an unsaved record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: IndexMap<String, Value>,
    memento: Option<Memento>,
    is_new: bool,
    temp_pk: Option<i64>,
}

impl Record {
    /// Creates a record from field values.
    #[must_use]
    pub const fn new(fields: IndexMap<String, Value>) -> Self {
        Self {
            fields,
            memento: None,
            is_new: false,
            temp_pk: None,
        }
    }

    /// Creates a record from name/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Returns the value of `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns true if `field` is part of this record's shape.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Replaces the value of an existing field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if the field is not part of the record.
    pub fn set(&mut self, field: &str, value: Value) -> Result<Value> {
        self.fields
            .get_mut(field)
            .map(|slot| std::mem::replace(slot, value))
            .ok_or_else(|| Error::no_such_field(field))
    }

    /// Returns the field values in column order.
    #[must_use]
    pub const fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    /// Iterates over field names in column order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the record's memento, if one has been attached.
    #[must_use]
    pub const fn memento(&self) -> Option<&Memento> {
        self.memento.as_ref()
    }

    /// Returns true for records added by the cursor and not yet saved.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        self.is_new
    }

    /// Temporary key assigned to an unsaved record.
    #[must_use]
    pub const fn temp_pk(&self) -> Option<i64> {
        self.temp_pk
    }

    /// Snapshots the current values, creating the memento on first use.
    pub fn set_memento(&mut self) {
        match self.memento.as_mut() {
            Some(memento) => memento.set_memento(&self.fields),
            None => self.memento = Some(Memento::capture(&self.fields)),
        }
    }

    /// Returns true if the record is new or differs from its memento.
    ///
    /// Records without a memento are never considered changed.
    #[must_use]
    pub fn is_changed(&self) -> bool {
        self.memento
            .as_ref()
            .is_some_and(|memento| self.is_new || memento.is_changed(&self.fields))
    }

    /// Returns the changed fields and their current values.
    #[must_use]
    pub fn diff(&self) -> IndexMap<String, Value> {
        self.memento
            .as_ref()
            .map(|memento| memento.make_diff(&self.fields, self.is_new))
            .unwrap_or_default()
    }

    /// Restores every changed field to its memento value.
    pub(crate) fn revert(&mut self) {
        let Some(memento) = self.memento.as_ref() else {
            return;
        };
        for (name, value) in &mut self.fields {
            if let Some(orig) = memento.orig_val(name) {
                if orig != value {
                    value.clone_from(orig);
                }
            }
        }
    }

    /// Snapshots the current values unless a memento already exists.
    pub(crate) fn ensure_memento(&mut self) {
        if self.memento.is_none() {
            self.memento = Some(Memento::capture(&self.fields));
        }
    }

    pub(crate) const fn mark_new(&mut self, temp_pk: Option<i64>) {
        self.is_new = true;
        self.temp_pk = temp_pk;
    }

    pub(crate) const fn clear_new(&mut self) {
        self.is_new = false;
        self.temp_pk = None;
    }
}
