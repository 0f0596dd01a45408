//! Schema introspection results and portable table definitions.

use super::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Portable field type code returned by schema introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// `I`: integer.
    Integer,
    /// `N`: non-integer number.
    Numeric,
    /// `C`: character data.
    Char,
    /// `M`: long text (memo).
    Memo,
    /// `B`: boolean.
    Boolean,
    /// `D`: date.
    Date,
    /// `T`: date and time.
    DateTime,
    /// `L`: binary large object.
    Blob,
}

impl FieldType {
    /// Returns the single-letter type code.
    #[must_use]
    pub const fn code(self) -> char {
        match self {
            Self::Integer => 'I',
            Self::Numeric => 'N',
            Self::Char => 'C',
            Self::Memo => 'M',
            Self::Boolean => 'B',
            Self::Date => 'D',
            Self::DateTime => 'T',
            Self::Blob => 'L',
        }
    }

    /// Parses a single-letter type code.
    #[must_use]
    pub const fn from_code(code: char) -> Option<Self> {
        match code.to_ascii_uppercase() {
            'I' => Some(Self::Integer),
            'N' => Some(Self::Numeric),
            'C' => Some(Self::Char),
            'M' => Some(Self::Memo),
            'B' => Some(Self::Boolean),
            'D' => Some(Self::Date),
            'T' => Some(Self::DateTime),
            'L' => Some(Self::Blob),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One field of a backend table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name.
    pub name: String,
    /// Portable type code.
    pub field_type: FieldType,
    /// Whether the field is part of the primary key.
    pub is_pk: bool,
}

/// Portable data type used in table definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    /// Integer number.
    Numeric,
    /// Floating point number.
    Float,
    /// Exact decimal.
    Decimal,
    /// Text.
    String,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    DateTime,
    /// Row timestamp defaulting to the current time.
    Stamp,
    /// Binary data.
    Binary,
}

/// Field of a portable table definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Portable data type.
    pub data_type: DataType,
    /// Part of the primary key.
    #[serde(default)]
    pub is_pk: bool,
    /// Backend assigns values on insert.
    #[serde(default)]
    pub is_auto_increment: bool,
    /// Nulls permitted.
    #[serde(default = "default_allow_nulls")]
    pub allow_nulls: bool,
    /// Default value.
    #[serde(default)]
    pub default: Option<Value>,
}

const fn default_allow_nulls() -> bool {
    true
}

impl FieldDef {
    /// Creates a nullable field with no default.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_pk: false,
            is_auto_increment: false,
            allow_nulls: true,
            default: None,
        }
    }

    /// Marks the field as the primary key.
    #[must_use]
    pub const fn primary_key(mut self, auto_increment: bool) -> Self {
        self.is_pk = true;
        self.is_auto_increment = auto_increment;
        self.allow_nulls = false;
        self
    }

    /// Disallows nulls.
    #[must_use]
    pub const fn not_null(mut self) -> Self {
        self.allow_nulls = false;
        self
    }

    /// Sets a default value.
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Index of a portable table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDef {
    /// Index name. An index named `primary` is the primary key and is not created separately.
    pub name: String,
    /// Indexed field names, in order.
    pub fields: Vec<String>,
}

impl IndexDef {
    /// Creates an index definition.
    #[must_use]
    pub fn new<I, S>(name: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Portable table definition consumed by DDL generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Create as a temporary table.
    #[serde(default)]
    pub is_temp: bool,
    /// Fields in declaration order.
    pub fields: Vec<FieldDef>,
    /// Secondary indexes.
    #[serde(default)]
    pub indexes: Vec<IndexDef>,
}

impl TableDef {
    /// Creates an empty table definition.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_temp: false,
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    /// Adds a field.
    #[must_use]
    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }
}
