//! DuckDB-backed storage.
//!
//! Serial keys come from per-entity sequences and are read back with
//! `INSERT ... RETURNING`. Dates and timestamps travel as text and are cast
//! on the SQL side, and scans cast every column to VARCHAR so rows can be
//! rebuilt from the attribute types alone.

use super::{Key, Row, Storage, StorageError, StorageResult, Value, TIMESTAMP_FORMAT};
use crate::schema::{render_statements, AttrType, EntityDef, EntityKind, SchemaRegistry, SqlDialect};
use ::duckdb::types::Value as DuckValue;
use ::duckdb::{params_from_iter, Connection};
use chrono::{NaiveDate, NaiveDateTime};
use std::path::Path;
use tracing::debug;

const DIALECT: SqlDialect = SqlDialect::DuckDb;

/// Storage session over a DuckDB connection
pub struct DuckDbStorage {
    conn: Connection,
    in_transaction: bool,
}

impl DuckDbStorage {
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn open(path: &Path) -> StorageResult<Self> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    /// Open `:memory:` or a database file path
    pub fn open_target(target: &str) -> StorageResult<Self> {
        if target == ":memory:" {
            Self::open_in_memory()
        } else {
            Self::open(Path::new(target))
        }
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            in_transaction: false,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// SQL placeholder for an attribute, casting text-encoded temporal values
fn placeholder(attr_type: AttrType) -> &'static str {
    match attr_type {
        AttrType::Date => "CAST(? AS DATE)",
        AttrType::Timestamp => "CAST(? AS TIMESTAMP)",
        _ => "?",
    }
}

fn to_duck(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Int(n) => DuckValue::BigInt(*n),
        Value::Float(x) => DuckValue::Double(*x),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Date(_) | Value::Timestamp(_) => DuckValue::Text(value.to_string()),
    }
}

/// Rebuild a value from its VARCHAR rendering
fn parse_value(entity: EntityKind, attr: &str, attr_type: AttrType, text: Option<String>) -> StorageResult<Value> {
    let Some(text) = text else {
        return Ok(Value::Null);
    };
    let bad = |what: &str| {
        StorageError::Other(format!(
            "{}.{}: cannot read '{}' as {}",
            entity, attr, text, what
        ))
    };

    let value = match attr_type {
        AttrType::Serial | AttrType::Integer | AttrType::BigInt => {
            Value::Int(text.parse().map_err(|_| bad("integer"))?)
        }
        AttrType::Decimal(_, _) => Value::Float(text.parse().map_err(|_| bad("decimal"))?),
        AttrType::Boolean => Value::Bool(text.eq_ignore_ascii_case("true")),
        AttrType::Date => Value::Date(
            NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|_| bad("date"))?,
        ),
        AttrType::Timestamp => Value::Timestamp(
            NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .map_err(|_| bad("timestamp"))?,
        ),
        AttrType::VarChar(_) | AttrType::Text | AttrType::Blob => Value::Text(text),
    };
    Ok(value)
}

fn key_filter(entity: &EntityDef, key: Key) -> StorageResult<(String, Vec<DuckValue>)> {
    let pk = entity.primary_key_names();
    match (key, pk.as_slice()) {
        (Key::Id(id), [col]) => Ok((
            format!("{} = ?", DIALECT.quote(col)),
            vec![DuckValue::BigInt(id)],
        )),
        (Key::Pair(a, b), [first, second]) => Ok((
            format!("{} = ? AND {} = ?", DIALECT.quote(first), DIALECT.quote(second)),
            vec![DuckValue::BigInt(a), DuckValue::BigInt(b)],
        )),
        _ => Err(StorageError::UnknownKey {
            entity: entity.kind,
            key,
        }),
    }
}

impl Storage for DuckDbStorage {
    fn create_structures(
        &mut self,
        registry: &SchemaRegistry,
        order: &[EntityKind],
    ) -> StorageResult<()> {
        let statements = render_statements(registry, DIALECT, order)
            .map_err(|e| StorageError::Other(e.to_string()))?;
        for stmt in statements {
            debug!(sql = %stmt, "creating structure");
            self.conn.execute_batch(&stmt)?;
        }
        Ok(())
    }

    fn structure_count(&self) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = 'main'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.in_transaction {
            return Err(StorageError::TransactionActive);
        }
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        self.in_transaction = true;
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Err(StorageError::NoTransaction);
        }
        self.in_transaction = false;
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        if !self.in_transaction {
            return Err(StorageError::NoTransaction);
        }
        self.in_transaction = false;
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    fn insert(&mut self, entity: &EntityDef, row: &Row) -> StorageResult<Key> {
        let mut columns = Vec::new();
        let mut placeholders = Vec::new();
        let mut params = Vec::new();

        for (column, value) in row.iter() {
            let attr = entity
                .get_attribute(column)
                .ok_or_else(|| StorageError::UnknownAttribute {
                    entity: entity.kind,
                    attribute: column.to_string(),
                })?;
            // Leave absent serial keys and defaults to the database
            if value.is_null() && (attr.is_serial() || attr.default_now) {
                continue;
            }
            columns.push(DIALECT.quote(column));
            placeholders.push(placeholder(attr.attr_type));
            params.push(to_duck(value));
        }

        let pk: Vec<String> = entity
            .primary_key_names()
            .iter()
            .map(|c| DIALECT.quote(c))
            .collect();

        let sql = if columns.is_empty() {
            format!(
                "INSERT INTO {} DEFAULT VALUES RETURNING {}",
                DIALECT.quote(entity.name()),
                pk.join(", ")
            )
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
                DIALECT.quote(entity.name()),
                columns.join(", "),
                placeholders.join(", "),
                pk.join(", ")
            )
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let key = if pk.len() == 2 {
            stmt.query_row(params_from_iter(params.iter()), |r| {
                Ok(Key::Pair(r.get(0)?, r.get(1)?))
            })?
        } else {
            stmt.query_row(params_from_iter(params.iter()), |r| Ok(Key::Id(r.get(0)?)))?
        };
        Ok(key)
    }

    fn update(
        &mut self,
        entity: &EntityDef,
        key: Key,
        attribute: &str,
        value: &Value,
    ) -> StorageResult<()> {
        let attr = entity
            .get_attribute(attribute)
            .ok_or_else(|| StorageError::UnknownAttribute {
                entity: entity.kind,
                attribute: attribute.to_string(),
            })?;
        if value.is_null() && attr.not_null {
            return Err(StorageError::NotNullViolation {
                entity: entity.kind,
                attribute: attribute.to_string(),
            });
        }

        let (filter, key_params) = key_filter(entity, key)?;
        let sql = format!(
            "UPDATE {} SET {} = {} WHERE {}",
            DIALECT.quote(entity.name()),
            DIALECT.quote(attribute),
            placeholder(attr.attr_type),
            filter
        );

        let mut params = vec![to_duck(value)];
        params.extend(key_params);
        let changed = self.conn.execute(&sql, params_from_iter(params.iter()))?;
        if changed == 0 {
            return Err(StorageError::UnknownKey {
                entity: entity.kind,
                key,
            });
        }
        Ok(())
    }

    fn scan(&self, entity: &EntityDef) -> StorageResult<Vec<Row>> {
        let select: Vec<String> = entity
            .attributes
            .iter()
            .map(|a| format!("CAST({} AS VARCHAR)", DIALECT.quote(&a.name)))
            .collect();
        let order: Vec<String> = entity
            .primary_key_names()
            .iter()
            .map(|c| DIALECT.quote(c))
            .collect();
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {}",
            select.join(", "),
            DIALECT.quote(entity.name()),
            order.join(", ")
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let mut out = Vec::new();

        while let Some(raw) = rows.next()? {
            let mut row = Row::new();
            for (idx, attr) in entity.attributes.iter().enumerate() {
                let text: Option<String> = raw.get(idx)?;
                row.set(
                    &attr.name,
                    parse_value(entity.kind, &attr.name, attr.attr_type, text)?,
                );
            }
            out.push(row);
        }

        Ok(out)
    }

    fn count(&self, entity: &EntityDef) -> StorageResult<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", DIALECT.quote(entity.name()));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
