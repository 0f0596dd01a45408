//! Client-side sorting and seeking.
//!
//! Sorting reorders the in-memory records without touching the backend.
//! The driver order is captured by key the first time a set is sorted, so
//! an "unsorted" request always restores it exactly.

use super::{Cursor, record_key};
use crate::models::Value;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

static NULL_VALUE: Value = Value::Null;

/// Sort direction of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Driver order.
    #[default]
    Unsorted,
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl SortOrder {
    /// Parses `ASC`, `DESC` or an empty string, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] for anything else.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "" => Ok(Self::Unsorted),
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            other => Err(Error::Data(format!("invalid sort direction: '{other}'"))),
        }
    }

    /// SQL keyword, empty for [`SortOrder::Unsorted`].
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unsorted => "",
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Next state when the same column is sorted again.
    #[must_use]
    pub const fn cycle(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Unsorted,
            Self::Unsorted => Self::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Cursor {
    /// Sorts the records by `column`.
    ///
    /// Without a `direction`, sorting the active column again cycles
    /// `ASC -> DESC -> "" -> ASC`, and a new column starts at `ASC`. An
    /// empty direction restores driver order. The row pointer follows the
    /// current record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecords`] on an empty set, or [`Error::Data`] for
    /// an unknown column, an invalid direction or a missing key field.
    pub fn sort(&mut self, column: &str, direction: Option<&str>, case_sensitive: bool) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::NoRecords("cannot sort an empty data set".to_string()));
        }
        let column = column.trim().to_lowercase();
        if !self.records[0].contains(&column) {
            return Err(Error::Data(format!("invalid column specified for sort: {column}")));
        }
        let requested = direction.map(SortOrder::parse).transpose()?;
        let order = if column == self.sort_column {
            requested.unwrap_or_else(|| self.sort_order.cycle())
        } else {
            requested.unwrap_or(SortOrder::Asc)
        };
        self.check_pk()?;

        self.sort_column = column;
        self.sort_order = order;
        self.sort_case_sensitive = case_sensitive;
        self.sort_rows()
    }

    /// Applies the active sort column and order to the records.
    pub(super) fn sort_rows(&mut self) -> Result<()> {
        if self.records.is_empty() {
            return Err(Error::NoRecords("cannot sort an empty data set".to_string()));
        }
        self.check_pk()?;
        let keys = self.key_fields();

        if self.unsorted_keys.is_empty() {
            self.unsorted_keys = self.records.iter().map(|r| record_key(r, &keys)).collect();
        }
        let current = self
            .records
            .get(self.row)
            .map(|r| record_key(r, &keys))
            .unwrap_or_default();

        let mut records = std::mem::take(&mut self.records);
        match self.sort_order {
            SortOrder::Unsorted => {
                let unsorted = &self.unsorted_keys;
                records.sort_by_cached_key(|r| {
                    let key = record_key(r, &keys);
                    unsorted.iter().position(|k| *k == key).unwrap_or(usize::MAX)
                });
            },
            SortOrder::Asc | SortOrder::Desc => {
                let column = self.sort_column.as_str();
                let case_sensitive = self.sort_case_sensitive;
                records.sort_by(|a, b| {
                    let a = a.get(column).unwrap_or(&NULL_VALUE);
                    let b = b.get(column).unwrap_or(&NULL_VALUE);
                    a.sort_cmp(b, case_sensitive)
                });
                if self.sort_order == SortOrder::Desc {
                    records.reverse();
                }
            },
        }

        self.row = records
            .iter()
            .position(|r| record_key(r, &keys) == current)
            .unwrap_or(0);
        self.records = records;
        Ok(())
    }

    /// Finds the row holding `value` in `field`.
    ///
    /// `field` defaults to the active sort column. Numeric fields coerce
    /// `value` to their type first. With `near`, a miss returns the row with
    /// the greatest value below `value`. Display order is not changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Data`] if no field can be resolved or the field does
    /// not exist.
    pub fn seek(
        &self,
        value: &Value,
        field: Option<&str>,
        case_sensitive: bool,
        near: bool,
    ) -> Result<Option<usize>> {
        if self.records.is_empty() {
            return Ok(None);
        }
        let field = field
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty())
            .or_else(|| (!self.sort_column.is_empty()).then(|| self.sort_column.clone()))
            .ok_or_else(|| Error::Data("no field specified for seek".to_string()))?;
        let template = self.records[0]
            .get(&field)
            .ok_or_else(|| Error::Data(format!("non-existent field: {field}")))?;
        let target = value.coerce_like(template);

        let mut sorted: Vec<(&Value, usize)> = self
            .records
            .iter()
            .enumerate()
            .map(|(idx, rec)| (rec.get(&field).unwrap_or(&NULL_VALUE), idx))
            .collect();
        sorted.sort_by(|a, b| a.0.sort_cmp(b.0, case_sensitive));

        let mut below = None;
        for (val, idx) in sorted {
            if val.seek_eq(&target, case_sensitive) {
                return Ok(Some(idx));
            }
            if val.sort_cmp(&target, case_sensitive) == Ordering::Greater {
                break;
            }
            below = Some(idx);
        }
        Ok(if near { below } else { None })
    }
}
