//! Storage sessions the seeder writes through.
//!
//! Rows are plain attribute/value lists keyed by entity; each backend maps
//! them onto its own structures. Two backends are provided:
//! - [`MemoryStorage`]: constraint-checking in-process tables, used by tests
//! - [`DuckDbStorage`]: a DuckDB database, in memory or on disk

mod duckdb;
mod memory;

pub use self::duckdb::DuckDbStorage;
pub use memory::MemoryStorage;

use crate::schema::{EntityDef, EntityKind, SchemaRegistry};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Timestamp text format shared by the backends
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single attribute value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(ts: NaiveDateTime) -> Self {
        Value::Timestamp(ts)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered set of attribute values for one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Row::set`]
    pub fn with(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a value, replacing any earlier value for the same column
    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.columns.iter().position(|c| c == column) {
            Some(idx) => self.values[idx] = value,
            None => {
                self.columns.push(column.to_string());
                self.values.push(value);
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|idx| &self.values[idx])
    }

    pub fn get_int(&self, column: &str) -> Option<i64> {
        self.get(column).and_then(Value::as_int)
    }

    pub fn get_text(&self, column: &str) -> Option<&str> {
        self.get(column).and_then(Value::as_text)
    }

    pub fn get_bool(&self, column: &str) -> Option<bool> {
        self.get(column).and_then(Value::as_bool)
    }

    pub fn get_timestamp(&self, column: &str) -> Option<NaiveDateTime> {
        self.get(column).and_then(Value::as_timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Primary key of a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum Key {
    Id(i64),
    /// Composite key of a junction row
    Pair(i64, i64),
}

impl Key {
    /// The integer id of a single-column key
    pub fn id(&self) -> Option<i64> {
        match self {
            Key::Id(id) => Some(*id),
            Key::Pair(..) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Id(id) => write!(f, "{}", id),
            Key::Pair(a, b) => write!(f, "({}, {})", a, b),
        }
    }
}

/// Failures reported by a storage backend
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("duckdb: {0}")]
    Duckdb(#[from] ::duckdb::Error),

    #[error("no structure exists for {0}")]
    MissingStructure(EntityKind),

    #[error("{entity}.{attribute}: duplicate value '{value}'")]
    UniqueViolation {
        entity: EntityKind,
        attribute: String,
        value: String,
    },

    #[error("{entity}.{attribute}: {value} does not reference an existing {target}")]
    ForeignKeyViolation {
        entity: EntityKind,
        attribute: String,
        target: EntityKind,
        value: i64,
    },

    #[error("{entity}.{attribute} may not be NULL")]
    NotNullViolation { entity: EntityKind, attribute: String },

    #[error("{entity} has no attribute {attribute}")]
    UnknownAttribute { entity: EntityKind, attribute: String },

    #[error("{entity} has no row with key {key}")]
    UnknownKey { entity: EntityKind, key: Key },

    #[error("no transaction is active")]
    NoTransaction,

    #[error("a transaction is already active")]
    TransactionActive,

    #[error("{0}")]
    Other(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A storage session with single-writer access.
///
/// Writes outside `begin`/`commit` are committed immediately.
pub trait Storage {
    /// Create one structure per entity, in the given order. Idempotent.
    fn create_structures(
        &mut self,
        registry: &SchemaRegistry,
        order: &[EntityKind],
    ) -> StorageResult<()>;

    /// Number of entity structures that exist
    fn structure_count(&self) -> StorageResult<usize>;

    fn begin(&mut self) -> StorageResult<()>;

    fn commit(&mut self) -> StorageResult<()>;

    fn rollback(&mut self) -> StorageResult<()>;

    fn in_transaction(&self) -> bool;

    /// Insert a row, returning its key. Serial keys and `now` defaults are
    /// filled in by the backend when absent.
    fn insert(&mut self, entity: &EntityDef, row: &Row) -> StorageResult<Key>;

    fn insert_batch(&mut self, entity: &EntityDef, rows: &[Row]) -> StorageResult<Vec<Key>> {
        rows.iter().map(|row| self.insert(entity, row)).collect()
    }

    /// Set one attribute of an existing row
    fn update(
        &mut self,
        entity: &EntityDef,
        key: Key,
        attribute: &str,
        value: &Value,
    ) -> StorageResult<()>;

    /// Every row of an entity, ordered by key, with all attributes present
    fn scan(&self, entity: &EntityDef) -> StorageResult<Vec<Row>>;

    fn count(&self, entity: &EntityDef) -> StorageResult<usize> {
        Ok(self.scan(entity)?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_set_replaces() {
        let mut row = Row::new().with("name", "USA").with("country_id", 1i64);
        row.set("name", "Canada");
        assert_eq!(row.len(), 2);
        assert_eq!(row.get_text("name"), Some("Canada"));
        assert_eq!(row.get_int("country_id"), Some(1));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_option_into_value() {
        let row = Row::new()
            .with("return_date", None::<NaiveDateTime>)
            .with("picture", Some("x"));
        assert!(row.get("return_date").unwrap().is_null());
        assert_eq!(row.get_text("picture"), Some("x"));
    }

    #[test]
    fn test_value_display() {
        let ts = NaiveDate::from_ymd_opt(2005, 5, 24)
            .unwrap()
            .and_hms_opt(22, 53, 30)
            .unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2005-05-24 22:53:30");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Float(2.99).to_string(), "2.99");
    }

    #[test]
    fn test_key_order_and_display() {
        assert!(Key::Id(2) < Key::Id(10));
        assert_eq!(Key::Pair(1, 3).to_string(), "(1, 3)");
        assert_eq!(Key::Id(4).id(), Some(4));
        assert_eq!(Key::Pair(1, 2).id(), None);
        assert_eq!(serde_json::to_string(&Key::Pair(1, 2)).unwrap(), "[1,2]");
    }
}
