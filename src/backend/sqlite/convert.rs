//! Conversion between `SQLite` storage values and [`Value`].

use crate::models::{DATE_FORMAT, FieldType, Value};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

const DATETIME_INPUT_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const TIME_INPUT_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Converts a raw column value using the column's declared type.
///
/// `SQLite` stores dates as text and booleans as integers, so the declared
/// type decides whether they are lifted into [`Value::Date`],
/// [`Value::DateTime`], [`Value::Time`] or [`Value::Bool`]. Text that does
/// not parse stays text.
pub fn value_from_sql(raw: ValueRef<'_>, decl_type: Option<&str>) -> Value {
    let decl = decl_type.map(str::to_lowercase).unwrap_or_default();
    match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) if decl.contains("bool") => Value::Bool(i != 0),
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) if is_decimal_decl(&decl) => Value::Decimal(f.to_string()),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => text_value(&String::from_utf8_lossy(bytes), &decl),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}

fn text_value(text: &str, decl: &str) -> Value {
    let parsed = if decl.contains("datetime") || decl.contains("timestamp") {
        parse_datetime(text).map(Value::DateTime)
    } else if decl.contains("date") {
        NaiveDate::parse_from_str(text, DATE_FORMAT)
            .ok()
            .map(Value::Date)
    } else if decl.contains("time") {
        TIME_INPUT_FORMATS
            .iter()
            .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
            .map(Value::Time)
    } else if is_decimal_decl(decl) {
        text.trim()
            .parse::<f64>()
            .is_ok()
            .then(|| Value::Decimal(text.to_string()))
    } else {
        None
    };
    parsed.unwrap_or_else(|| Value::Text(text.to_string()))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_INPUT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn is_decimal_decl(decl: &str) -> bool {
    decl.starts_with("dec") || decl.starts_with("num")
}

/// Maps a declared column type to its portable type code.
pub fn field_type_from_decl(decl: &str) -> FieldType {
    let typ = decl.to_lowercase();
    if typ.contains("bool") {
        FieldType::Boolean
    } else if typ.contains("int") {
        FieldType::Integer
    } else if is_decimal_decl(&typ)
        || typ.starts_with("real")
        || typ.contains("floa")
        || typ.contains("doub")
    {
        FieldType::Numeric
    } else if typ == "blob" {
        FieldType::Blob
    } else if typ.starts_with("clob") || typ.starts_with("longtext") {
        FieldType::Memo
    } else if typ.contains("datetime") || typ.contains("timestamp") {
        FieldType::DateTime
    } else if typ.contains("date") {
        FieldType::Date
    } else {
        FieldType::Char
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(SqlValue::Null),
            Self::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::Float(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Self::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Self::Decimal(s) | Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Self::Date(_) | Self::Time(_) | Self::DateTime(_) => {
                ToSqlOutput::Owned(SqlValue::Text(self.to_string()))
            },
            Self::Blob(bytes) => ToSqlOutput::Borrowed(ValueRef::Blob(bytes)),
        })
    }
}
