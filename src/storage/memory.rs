//! In-process storage that enforces the schema's constraints.
//!
//! Every insert and update is checked for primary key and unique set
//! collisions, NOT NULL attributes and foreign key existence, so a seeding
//! bug surfaces as a [`StorageError`] instead of silently corrupt data.
//! Transactions snapshot all tables on `begin` and restore them on `rollback`.

use super::{Key, Row, Storage, StorageError, StorageResult, Value};
use crate::schema::{EntityDef, EntityKind, SchemaRegistry, UniqueSet};
use ahash::AHashMap;
use chrono::Utc;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Table {
    rows: BTreeMap<Key, Row>,
    next_id: i64,
    /// Token index per unique set
    indexes: Vec<(UniqueSet, AHashMap<String, Key>)>,
}

impl Table {
    fn new(def: &EntityDef) -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
            indexes: def
                .unique_sets()
                .into_iter()
                .map(|set| (set, AHashMap::new()))
                .collect(),
        }
    }
}

/// Constraint-checking in-memory tables
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: AHashMap<EntityKind, Table>,
    snapshot: Option<AHashMap<EntityKind, Table>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, kind: EntityKind) -> StorageResult<&Table> {
        self.tables
            .get(&kind)
            .ok_or(StorageError::MissingStructure(kind))
    }

    fn contains_id(&self, kind: EntityKind, id: i64) -> StorageResult<bool> {
        Ok(self.table(kind)?.rows.contains_key(&Key::Id(id)))
    }

    /// Check NOT NULL and foreign keys for one attribute value
    fn check_value(&self, entity: &EntityDef, attribute: &str, value: &Value) -> StorageResult<()> {
        let attr = entity
            .get_attribute(attribute)
            .ok_or_else(|| StorageError::UnknownAttribute {
                entity: entity.kind,
                attribute: attribute.to_string(),
            })?;

        if value.is_null() {
            if attr.not_null {
                return Err(StorageError::NotNullViolation {
                    entity: entity.kind,
                    attribute: attribute.to_string(),
                });
            }
            return Ok(());
        }

        if let Some(fk) = &attr.foreign_key {
            let id = value.as_int().ok_or_else(|| {
                StorageError::Other(format!(
                    "{}.{}: reference must be an integer, got '{}'",
                    entity.kind, attribute, value
                ))
            })?;
            if !self.contains_id(fk.target, id)? {
                return Err(StorageError::ForeignKeyViolation {
                    entity: entity.kind,
                    attribute: attribute.to_string(),
                    target: fk.target,
                    value: id,
                });
            }
        }

        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn create_structures(
        &mut self,
        registry: &SchemaRegistry,
        order: &[EntityKind],
    ) -> StorageResult<()> {
        for &kind in order {
            let def = registry
                .get(kind)
                .ok_or(StorageError::MissingStructure(kind))?;
            self.tables.entry(kind).or_insert_with(|| Table::new(def));
        }
        Ok(())
    }

    fn structure_count(&self) -> StorageResult<usize> {
        Ok(self.tables.len())
    }

    fn begin(&mut self) -> StorageResult<()> {
        if self.snapshot.is_some() {
            return Err(StorageError::TransactionActive);
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.snapshot
            .take()
            .map(|_| ())
            .ok_or(StorageError::NoTransaction)
    }

    fn rollback(&mut self) -> StorageResult<()> {
        let snapshot = self.snapshot.take().ok_or(StorageError::NoTransaction)?;
        self.tables = snapshot;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    fn insert(&mut self, entity: &EntityDef, row: &Row) -> StorageResult<Key> {
        let next_id = self.table(entity.kind)?.next_id;

        for (column, _) in row.iter() {
            if !entity.has_attribute(column) {
                return Err(StorageError::UnknownAttribute {
                    entity: entity.kind,
                    attribute: column.to_string(),
                });
            }
        }

        // Materialize every attribute, filling serial keys and defaults
        let now = Utc::now().naive_utc();
        let mut full = Row::new();
        let mut assigned_id = None;
        for attr in &entity.attributes {
            let mut value = row.get(&attr.name).cloned().unwrap_or(Value::Null);
            if value.is_null() {
                if attr.is_serial() {
                    value = Value::Int(next_id);
                } else if attr.default_now {
                    value = Value::Timestamp(now);
                }
            }
            if attr.is_serial() {
                assigned_id = value.as_int();
            }
            self.check_value(entity, &attr.name, &value)?;
            full.set(&attr.name, value);
        }

        let key = entity.key_of(&full).ok_or_else(|| {
            StorageError::Other(format!("{}: row has no usable primary key", entity.kind))
        })?;

        let table = self.table(entity.kind)?;
        if table.rows.contains_key(&key) {
            return Err(StorageError::UniqueViolation {
                entity: entity.kind,
                attribute: entity.primary_key_names().join("+"),
                value: key.to_string(),
            });
        }

        let mut tokens = Vec::with_capacity(table.indexes.len());
        for (set, index) in &table.indexes {
            let token = set.token(&full);
            if let Some(ref t) = token {
                if index.contains_key(t) {
                    return Err(StorageError::UniqueViolation {
                        entity: entity.kind,
                        attribute: set.name.clone(),
                        value: t.replace('\u{1f}', ", "),
                    });
                }
            }
            tokens.push(token);
        }

        let table = self
            .tables
            .get_mut(&entity.kind)
            .ok_or(StorageError::MissingStructure(entity.kind))?;
        for ((_, index), token) in table.indexes.iter_mut().zip(tokens) {
            if let Some(t) = token {
                index.insert(t, key);
            }
        }
        if let Some(id) = assigned_id {
            table.next_id = table.next_id.max(id + 1);
        }
        table.rows.insert(key, full);

        Ok(key)
    }

    fn update(
        &mut self,
        entity: &EntityDef,
        key: Key,
        attribute: &str,
        value: &Value,
    ) -> StorageResult<()> {
        self.check_value(entity, attribute, value)?;

        if entity.primary_key_names().contains(&attribute) {
            return Err(StorageError::Other(format!(
                "{}.{}: primary key attributes cannot be updated",
                entity.kind, attribute
            )));
        }

        let table = self.table(entity.kind)?;
        let current = table
            .rows
            .get(&key)
            .ok_or(StorageError::UnknownKey {
                entity: entity.kind,
                key,
            })?;
        let mut updated = current.clone();
        updated.set(attribute, value.clone());

        // Re-check only the unique sets this attribute belongs to
        let mut changes = Vec::new();
        for (idx, (set, index)) in table.indexes.iter().enumerate() {
            if !set.attributes.iter().any(|a| a == attribute) {
                continue;
            }
            let new_token = set.token(&updated);
            if let Some(ref t) = new_token {
                if index.get(t).is_some_and(|&owner| owner != key) {
                    return Err(StorageError::UniqueViolation {
                        entity: entity.kind,
                        attribute: set.name.clone(),
                        value: t.replace('\u{1f}', ", "),
                    });
                }
            }
            changes.push((idx, set.token(current), new_token));
        }

        let table = self
            .tables
            .get_mut(&entity.kind)
            .ok_or(StorageError::MissingStructure(entity.kind))?;
        for (idx, old, new) in changes {
            let index = &mut table.indexes[idx].1;
            if let Some(old) = old {
                index.remove(&old);
            }
            if let Some(new) = new {
                index.insert(new, key);
            }
        }
        table.rows.insert(key, updated);

        Ok(())
    }

    fn scan(&self, entity: &EntityDef) -> StorageResult<Vec<Row>> {
        Ok(self.table(entity.kind)?.rows.values().cloned().collect())
    }

    fn count(&self, entity: &EntityDef) -> StorageResult<usize> {
        Ok(self.table(entity.kind)?.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::rental_schema;

    fn setup() -> (SchemaRegistry, MemoryStorage) {
        let registry = rental_schema();
        let mut storage = MemoryStorage::new();
        let order = registry.dependency_order().unwrap();
        storage.create_structures(&registry, &order).unwrap();
        (registry, storage)
    }

    fn country(storage: &mut MemoryStorage, registry: &SchemaRegistry, name: &str) -> Key {
        let def = registry.get(EntityKind::Country).unwrap();
        storage.insert(def, &Row::new().with("name", name)).unwrap()
    }

    #[test]
    fn test_create_structures_idempotent() {
        let (registry, mut storage) = setup();
        let order = registry.dependency_order().unwrap();
        storage.create_structures(&registry, &order).unwrap();
        assert_eq!(storage.structure_count().unwrap(), 15);
    }

    #[test]
    fn test_serial_keys_and_defaults() {
        let (registry, mut storage) = setup();
        assert_eq!(country(&mut storage, &registry, "USA"), Key::Id(1));
        assert_eq!(country(&mut storage, &registry, "Canada"), Key::Id(2));

        let rows = storage
            .scan(registry.get(EntityKind::Country).unwrap())
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].get_timestamp("last_update").is_some());
    }

    #[test]
    fn test_unique_violation() {
        let (registry, mut storage) = setup();
        country(&mut storage, &registry, "USA");
        let def = registry.get(EntityKind::Country).unwrap();
        let err = storage
            .insert(def, &Row::new().with("name", "USA"))
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { ref attribute, .. } if attribute == "name"));
    }

    #[test]
    fn test_foreign_key_and_not_null() {
        let (registry, mut storage) = setup();
        let city = registry.get(EntityKind::City).unwrap();

        let err = storage
            .insert(city, &Row::new().with("name", "Austin").with("country_id", 9i64))
            .unwrap_err();
        assert!(matches!(err, StorageError::ForeignKeyViolation { value: 9, .. }));

        let err = storage
            .insert(city, &Row::new().with("name", "Austin"))
            .unwrap_err();
        assert!(matches!(err, StorageError::NotNullViolation { .. }));
    }

    #[test]
    fn test_composite_key_collision() {
        let (registry, mut storage) = setup();
        let language = registry.get(EntityKind::Language).unwrap();
        let category = registry.get(EntityKind::Category).unwrap();
        let film = registry.get(EntityKind::Film).unwrap();
        let film_category = registry.get(EntityKind::FilmCategory).unwrap();

        storage.insert(language, &Row::new().with("name", "English")).unwrap();
        storage.insert(category, &Row::new().with("name", "Drama")).unwrap();
        storage
            .insert(
                film,
                &Row::new()
                    .with("title", "Lorem Ipsum")
                    .with("rental_duration", 3i64)
                    .with("rental_rate", 1.99)
                    .with("replacement_cost", 20.99)
                    .with("language_id", 1i64),
            )
            .unwrap();

        let pair = Row::new().with("film_id", 1i64).with("category_id", 1i64);
        assert_eq!(storage.insert(film_category, &pair).unwrap(), Key::Pair(1, 1));
        assert!(matches!(
            storage.insert(film_category, &pair),
            Err(StorageError::UniqueViolation { .. })
        ));
    }

    #[test]
    fn test_rollback_restores_tables() {
        let (registry, mut storage) = setup();
        country(&mut storage, &registry, "USA");

        storage.begin().unwrap();
        assert!(storage.in_transaction());
        country(&mut storage, &registry, "Canada");
        storage.rollback().unwrap();

        let def = registry.get(EntityKind::Country).unwrap();
        assert_eq!(storage.count(def).unwrap(), 1);
        // Serial counter is restored as well
        assert_eq!(country(&mut storage, &registry, "UK"), Key::Id(2));
        assert!(matches!(storage.commit(), Err(StorageError::NoTransaction)));
    }

    #[test]
    fn test_nested_begin_rejected() {
        let (_, mut storage) = setup();
        storage.begin().unwrap();
        assert!(matches!(storage.begin(), Err(StorageError::TransactionActive)));
        storage.commit().unwrap();
        assert!(!storage.in_transaction());
    }

    #[test]
    fn test_update_checks_constraints() {
        let (registry, mut storage) = setup();
        let usa = country(&mut storage, &registry, "USA");
        country(&mut storage, &registry, "Canada");
        let def = registry.get(EntityKind::Country).unwrap();

        let err = storage
            .update(def, usa, "name", &Value::from("Canada"))
            .unwrap_err();
        assert!(matches!(err, StorageError::UniqueViolation { .. }));

        storage.update(def, usa, "name", &Value::from("United States")).unwrap();
        // The old name is free again
        storage.insert(def, &Row::new().with("name", "USA")).unwrap();

        let err = storage
            .update(def, Key::Id(99), "name", &Value::from("X"))
            .unwrap_err();
        assert!(matches!(err, StorageError::UnknownKey { .. }));
    }

    #[test]
    fn test_missing_structure() {
        let registry = rental_schema();
        let mut storage = MemoryStorage::new();
        let def = registry.get(EntityKind::Country).unwrap();
        assert!(matches!(
            storage.insert(def, &Row::new().with("name", "USA")),
            Err(StorageError::MissingStructure(EntityKind::Country))
        ));
    }
}
