//! Per-record snapshots of original field values.

use super::Value;
use indexmap::IndexMap;

/// Snapshot of a record's field values, used to compute diffs and revert edits.
///
/// A memento stays unchanged until [`Memento::set_memento`] is called again.
/// Each record owns its own memento; they are never shared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Memento {
    snapshot: IndexMap<String, Value>,
}

impl Memento {
    /// Creates an empty memento.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a memento holding a snapshot of `fields`.
    #[must_use]
    pub fn capture(fields: &IndexMap<String, Value>) -> Self {
        Self {
            snapshot: fields.clone(),
        }
    }

    /// Replaces the snapshot with the current values of `fields`.
    pub fn set_memento(&mut self, fields: &IndexMap<String, Value>) {
        self.snapshot.clone_from(fields);
    }

    /// Returns every field whose current value differs from the snapshot.
    ///
    /// For new records every field is reported, since none of them exist in
    /// the backend yet.
    #[must_use]
    pub fn make_diff(&self, fields: &IndexMap<String, Value>, is_new: bool) -> IndexMap<String, Value> {
        fields
            .iter()
            .filter(|(name, value)| is_new || self.snapshot.get(*name) != Some(*value))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Returns the snapshot value of `field`.
    #[must_use]
    pub fn orig_val(&self, field: &str) -> Option<&Value> {
        self.snapshot.get(field)
    }

    /// Returns true if any field differs from the snapshot.
    #[must_use]
    pub fn is_changed(&self, fields: &IndexMap<String, Value>) -> bool {
        fields
            .iter()
            .any(|(name, value)| self.snapshot.get(name) != Some(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fields(pairs: &[(&str, Value)]) -> IndexMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_unchanged_after_capture() {
        let rec = fields(&[("id", Value::Integer(1)), ("name", Value::from("A"))]);
        let memento = Memento::capture(&rec);
        assert!(!memento.is_changed(&rec));
        assert!(memento.make_diff(&rec, false).is_empty());
    }

    #[test]
    fn test_diff_reports_changed_fields_only() {
        let mut rec = fields(&[("id", Value::Integer(1)), ("name", Value::from("A"))]);
        let memento = Memento::capture(&rec);
        rec.insert("name".to_string(), Value::from("Z"));

        let diff = memento.make_diff(&rec, false);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.get("name"), Some(&Value::from("Z")));
        assert_eq!(memento.orig_val("name"), Some(&Value::from("A")));
        assert!(memento.is_changed(&rec));
    }

    #[test]
    fn test_new_record_diff_is_whole_record() {
        let rec = fields(&[("id", Value::Integer(-1)), ("name", Value::from(""))]);
        let memento = Memento::capture(&rec);
        let diff = memento.make_diff(&rec, true);
        assert_eq!(diff.len(), 2);
    }

    #[test]
    fn test_no_coercion_in_comparison() {
        let mut rec = fields(&[("qty", Value::Integer(1))]);
        let memento = Memento::capture(&rec);
        rec.insert("qty".to_string(), Value::Float(1.0));
        assert!(memento.is_changed(&rec));
    }

    #[test]
    fn test_set_memento_recaptures() {
        let mut rec = fields(&[("name", Value::from("A"))]);
        let mut memento = Memento::new();
        assert!(memento.is_changed(&rec));
        memento.set_memento(&rec);
        assert!(!memento.is_changed(&rec));
        rec.insert("name".to_string(), Value::from("B"));
        memento.set_memento(&rec);
        assert_eq!(memento.orig_val("name"), Some(&Value::from("B")));
    }

    proptest! {
        #[test]
        fn prop_diff_nonempty_iff_changed(a in any::<i64>(), b in any::<i64>(), s in "[a-z]{0,8}") {
            let original = fields(&[("a", Value::Integer(a)), ("s", Value::from(s.as_str()))]);
            let memento = Memento::capture(&original);
            let edited = fields(&[("a", Value::Integer(b)), ("s", Value::from(s.as_str()))]);
            prop_assert_eq!(memento.make_diff(&edited, false).is_empty(), a == b);
            prop_assert_eq!(memento.is_changed(&edited), a != b);
        }
    }
}
