//! Typed field values.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Canonical text format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical text format for times.
pub const TIME_FORMAT: &str = "%H:%M:%S%.f";
/// Canonical text format for date-times.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A single field value in a record.
///
/// Backends normalize whatever their driver returns into one of these
/// variants, so date and time values always arrive as the chrono types
/// regardless of engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Signed integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Exact decimal kept in its textual form.
    Decimal(String),
    /// Text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without zone.
    DateTime(NaiveDateTime),
    /// Raw bytes.
    Blob(Vec<u8>),
}

impl Value {
    /// Returns the short type name used in XML export and log messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "int",
            Self::Float(_) => "float",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "str",
            Self::Bool(_) => "bool",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::DateTime(_) => "datetime",
            Self::Blob(_) => "bytes",
        }
    }

    /// Returns true for `NULL`.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns true for text values.
    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }

    /// Returns true for the date and time variants.
    #[must_use]
    pub const fn is_temporal(&self) -> bool {
        matches!(self, Self::Date(_) | Self::Time(_) | Self::DateTime(_))
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an integer value.
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the value as a float for integer, float and parseable decimal values.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Decimal(d) => d.trim().parse().ok(),
            _ => None,
        }
    }

    /// Coerces `self` to the runtime type of `template` for numeric templates.
    ///
    /// Values that cannot be converted become zero of the template's type.
    /// Non-numeric templates leave the value untouched.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn coerce_like(&self, template: &Self) -> Self {
        match template {
            Self::Integer(_) => Self::Integer(match self {
                Self::Integer(i) => *i,
                Self::Float(f) if f.is_finite() => *f as i64,
                Self::Bool(b) => i64::from(*b),
                Self::Text(s) | Self::Decimal(s) => s.trim().parse().unwrap_or(0),
                _ => 0,
            }),
            Self::Float(_) => Self::Float(match self {
                Self::Text(s) => s.trim().parse().unwrap_or(0.0),
                Self::Bool(b) => f64::from(u8::from(*b)),
                other => other.as_f64().unwrap_or(0.0),
            }),
            _ => self.clone(),
        }
    }

    /// Orders two values for client-side sorting and seeking.
    ///
    /// `NULL` sorts first. Integers, floats and decimals compare numerically
    /// with each other. Text comparison is case-folded when `case_sensitive`
    /// is false. Values of unrelated types fall back to a fixed type rank.
    #[must_use]
    pub fn sort_cmp(&self, other: &Self, case_sensitive: bool) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Text(a), Self::Text(b)) => {
                if case_sensitive {
                    a.cmp(b)
                } else {
                    a.to_lowercase().cmp(&b.to_lowercase())
                }
            },
            (Self::Integer(a), Self::Integer(b)) => a.cmp(b),
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.cmp(b),
            (Self::Date(a), Self::DateTime(b)) => a.and_time(NaiveTime::MIN).cmp(b),
            (Self::DateTime(a), Self::Date(b)) => a.cmp(&b.and_time(NaiveTime::MIN)),
            (Self::Blob(a), Self::Blob(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                _ => self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
                    (Self::Decimal(a), Self::Decimal(b)) => a.cmp(b),
                    _ => Ordering::Equal,
                }),
            },
        }
    }

    /// Tests equality for seeking, folding case on text when requested.
    #[must_use]
    pub fn seek_eq(&self, other: &Self, case_sensitive: bool) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) if !case_sensitive => {
                a.to_lowercase() == b.to_lowercase()
            },
            _ => self == other,
        }
    }

    /// Rank used to order values of unrelated types.
    ///
    /// Decimals whose text is not a number rank after every number.
    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Decimal(d) if d.trim().parse::<f64>().is_err() => 3,
            Self::Integer(_) | Self::Float(_) | Self::Decimal(_) => 2,
            Self::Text(_) => 4,
            Self::Date(_) | Self::DateTime(_) => 5,
            Self::Time(_) => 6,
            Self::Blob(_) => 7,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Decimal(s) | Self::Text(s) => f.write_str(s),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Self::Time(t) => write!(f, "{}", t.format(TIME_FORMAT)),
            Self::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Self::Blob(bytes) => f.write_str(&hex::encode(bytes)),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Self::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::DateTime(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
