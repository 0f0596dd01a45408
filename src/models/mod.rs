//! Data models for recordset.
//!
//! Field values, records with their change-tracking sidecars, and the schema
//! descriptors exchanged with backends.

mod memento;
mod record;
mod schema;
mod value;

pub use memento::Memento;
pub use record::{ColumnDesc, Record};
pub use schema::{DataType, FieldDef, FieldInfo, FieldType, IndexDef, TableDef};
pub use value::{DATE_FORMAT, DATETIME_FORMAT, TIME_FORMAT, Value};
