//! Schema registry for the rental data model.
//!
//! This module provides:
//! - Entity, attribute and foreign key definitions with chained builders
//! - Dependency graph construction with deferred-edge aware topological sorting
//! - DDL rendering for MySQL, PostgreSQL, SQLite and DuckDB
//! - The canonical video-rental schema

mod ddl;
mod graph;
mod rental;

pub use ddl::*;
pub use graph::*;
pub use rental::rental_schema;

use crate::error::{Result, SeedError};
use crate::storage::{Key, Row, Value};
use ahash::AHashMap;
use serde::Serialize;
use std::fmt;

/// Every entity the rental schema knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Country,
    City,
    Address,
    Language,
    Category,
    Actor,
    Film,
    FilmCategory,
    FilmActor,
    Store,
    Staff,
    Customer,
    Inventory,
    Rental,
    Payment,
}

impl EntityKind {
    pub const ALL: [EntityKind; 15] = [
        EntityKind::Country,
        EntityKind::City,
        EntityKind::Address,
        EntityKind::Language,
        EntityKind::Category,
        EntityKind::Actor,
        EntityKind::Film,
        EntityKind::FilmCategory,
        EntityKind::FilmActor,
        EntityKind::Store,
        EntityKind::Staff,
        EntityKind::Customer,
        EntityKind::Inventory,
        EntityKind::Rental,
        EntityKind::Payment,
    ];

    /// Storage table name
    pub fn table_name(&self) -> &'static str {
        match self {
            EntityKind::Country => "country",
            EntityKind::City => "city",
            EntityKind::Address => "address",
            EntityKind::Language => "language",
            EntityKind::Category => "category",
            EntityKind::Actor => "actor",
            EntityKind::Film => "film",
            EntityKind::FilmCategory => "film_category",
            EntityKind::FilmActor => "film_actor",
            EntityKind::Store => "store",
            EntityKind::Staff => "staff",
            EntityKind::Customer => "customer",
            EntityKind::Inventory => "inventory",
            EntityKind::Rental => "rental",
            EntityKind::Payment => "payment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.table_name() == normalized)
            .ok_or_else(|| format!("Unknown entity: {}", s))
    }
}

/// Attribute storage types (dialect-agnostic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrType {
    /// Auto-assigned integer key
    Serial,
    Integer,
    BigInt,
    VarChar(u16),
    Text,
    Boolean,
    /// Decimal with precision and scale
    Decimal(u8, u8),
    Date,
    Timestamp,
    Blob,
}

/// Foreign key reference action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    #[default]
    NoAction,
    Cascade,
    SetNull,
    Restrict,
}

impl FkAction {
    pub fn to_sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::Restrict => "RESTRICT",
        }
    }
}

/// Foreign key constraint on a single attribute
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub target: EntityKind,
    pub target_attr: String,
    pub on_delete: FkAction,
    /// Left NULL at insert time and patched once the target row exists
    pub deferred: bool,
}

/// Attribute definition
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub attr_type: AttrType,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// Defaults to the insertion time when omitted from a row
    pub default_now: bool,
    pub foreign_key: Option<ForeignKey>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, attr_type: AttrType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            not_null: false,
            primary_key: false,
            unique: false,
            default_now: false,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default_now(mut self) -> Self {
        self.default_now = true;
        self
    }

    pub fn references(
        mut self,
        target: EntityKind,
        target_attr: impl Into<String>,
        on_delete: FkAction,
    ) -> Self {
        self.foreign_key = Some(ForeignKey {
            target,
            target_attr: target_attr.into(),
            on_delete,
            deferred: false,
        });
        self
    }

    /// Mark the foreign key as deferred. Call after `references`.
    pub fn deferred(mut self) -> Self {
        if let Some(ref mut fk) = self.foreign_key {
            fk.deferred = true;
        }
        self
    }

    pub fn is_serial(&self) -> bool {
        self.attr_type == AttrType::Serial
    }
}

/// A set of attributes whose combined values must be unique
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueSet {
    /// Attribute names joined with '+', used in errors and tokens
    pub name: String,
    pub attributes: Vec<String>,
}

impl UniqueSet {
    fn new(attributes: Vec<String>) -> Self {
        Self {
            name: attributes.join("+"),
            attributes,
        }
    }

    /// Uniqueness token for a row, or None when any member is NULL
    pub fn token(&self, row: &Row) -> Option<String> {
        let mut parts = Vec::with_capacity(self.attributes.len());
        for attr in &self.attributes {
            match row.get(attr) {
                Some(Value::Null) | None => return None,
                Some(value) => parts.push(value.to_string()),
            }
        }
        Some(parts.join("\u{1f}"))
    }
}

/// Entity definition
#[derive(Debug, Clone)]
pub struct EntityDef {
    pub kind: EntityKind,
    pub attributes: Vec<Attribute>,
    /// Composite uniqueness sets beyond the primary key
    pub composite_uniques: Vec<Vec<String>>,
}

impl EntityDef {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            attributes: Vec::new(),
            composite_uniques: Vec::new(),
        }
    }

    pub fn attribute(mut self, attr: Attribute) -> Self {
        self.attributes.push(attr);
        self
    }

    pub fn unique_together(mut self, attributes: &[&str]) -> Self {
        self.composite_uniques
            .push(attributes.iter().map(|a| a.to_string()).collect());
        self
    }

    /// Add a `last_update` timestamp defaulting to the insertion time
    pub fn timestamps(self) -> Self {
        self.attribute(
            Attribute::new("last_update", AttrType::Timestamp)
                .not_null()
                .default_now(),
        )
    }

    pub fn name(&self) -> &'static str {
        self.kind.table_name()
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get_attribute(name).is_some()
    }

    /// Primary key attributes in declaration order
    pub fn primary_key(&self) -> Vec<&Attribute> {
        self.attributes.iter().filter(|a| a.primary_key).collect()
    }

    pub fn primary_key_names(&self) -> Vec<&str> {
        self.primary_key()
            .into_iter()
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn has_composite_key(&self) -> bool {
        self.primary_key().len() > 1
    }

    /// Junction entities have a composite key made only of foreign keys
    pub fn is_junction(&self) -> bool {
        let pk = self.primary_key();
        pk.len() > 1 && pk.iter().all(|a| a.foreign_key.is_some())
    }

    /// All foreign key relationships
    pub fn foreign_keys(&self) -> Vec<(&Attribute, &ForeignKey)> {
        self.attributes
            .iter()
            .filter_map(|a| a.foreign_key.as_ref().map(|fk| (a, fk)))
            .collect()
    }

    /// Every uniqueness set the seeder and storage must honor.
    ///
    /// Serial keys are excluded since storage assigns them.
    pub fn unique_sets(&self) -> Vec<UniqueSet> {
        let mut sets = Vec::new();

        let pk = self.primary_key();
        if !pk.is_empty() && !(pk.len() == 1 && pk[0].is_serial()) {
            sets.push(UniqueSet::new(pk.iter().map(|a| a.name.clone()).collect()));
        }

        for attr in self.attributes.iter().filter(|a| a.unique && !a.primary_key) {
            sets.push(UniqueSet::new(vec![attr.name.clone()]));
        }

        for composite in &self.composite_uniques {
            sets.push(UniqueSet::new(composite.clone()));
        }

        sets
    }

    /// Extract the key of a stored row
    pub fn key_of(&self, row: &Row) -> Option<Key> {
        let pk = self.primary_key();
        match pk.as_slice() {
            [single] => row.get_int(&single.name).map(Key::Id),
            [first, second] => Some(Key::Pair(
                row.get_int(&first.name)?,
                row.get_int(&second.name)?,
            )),
            _ => None,
        }
    }
}

/// A directed foreign-key edge from a child entity to its parent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub child: EntityKind,
    pub attribute: String,
    pub parent: EntityKind,
    pub deferred: bool,
    pub on_delete: FkAction,
}

/// Canonical definition of every entity
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: Vec<EntityDef>,
    index: AHashMap<EntityKind, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any earlier definition of the same kind
    pub fn entity(mut self, def: EntityDef) -> Self {
        self.add(def);
        self
    }

    pub fn add(&mut self, def: EntityDef) {
        if let Some(&idx) = self.index.get(&def.kind) {
            self.entities[idx] = def;
        } else {
            self.index.insert(def.kind, self.entities.len());
            self.entities.push(def);
        }
    }

    pub fn get(&self, kind: EntityKind) -> Option<&EntityDef> {
        self.index.get(&kind).map(|&idx| &self.entities[idx])
    }

    /// Like `get`, but a missing entity is a schema error
    pub fn def(&self, kind: EntityKind) -> Result<&EntityDef> {
        self.get(kind)
            .ok_or_else(|| SeedError::InvalidSchema(format!("entity {} is not registered", kind)))
    }

    /// Declaration index of an entity
    pub fn position(&self, kind: EntityKind) -> Option<usize> {
        self.index.get(&kind).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.iter()
    }

    pub fn kinds(&self) -> Vec<EntityKind> {
        self.entities.iter().map(|e| e.kind).collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every foreign-key edge, deferred ones included
    pub fn edges(&self) -> Vec<Edge> {
        self.entities
            .iter()
            .flat_map(|def| {
                def.foreign_keys().into_iter().map(move |(attr, fk)| Edge {
                    child: def.kind,
                    attribute: attr.name.clone(),
                    parent: fk.target,
                    deferred: fk.deferred,
                    on_delete: fk.on_delete,
                })
            })
            .collect()
    }

    pub fn deferred_edges(&self) -> Vec<Edge> {
        self.edges().into_iter().filter(|e| e.deferred).collect()
    }

    /// Check that every foreign key is resolvable.
    ///
    /// Targets must be registered and referenced through their single-column
    /// primary key; deferred references must be nullable.
    pub fn validate(&self) -> Result<()> {
        for def in &self.entities {
            for (attr, fk) in def.foreign_keys() {
                let target = self.get(fk.target).ok_or_else(|| {
                    SeedError::InvalidSchema(format!(
                        "{}.{} references unregistered entity {}",
                        def.kind, attr.name, fk.target
                    ))
                })?;
                let target_pk = target.primary_key_names();
                if target_pk != [fk.target_attr.as_str()] {
                    return Err(SeedError::InvalidSchema(format!(
                        "{}.{} must reference the primary key of {}",
                        def.kind, attr.name, fk.target
                    )));
                }
                if fk.deferred && attr.not_null {
                    return Err(SeedError::InvalidSchema(format!(
                        "{}.{} is deferred and must be nullable",
                        def.kind, attr.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Entities ordered so that every entity follows all entities it references.
    ///
    /// Deferred edges are left out of the ordering; any cycle among the
    /// remaining edges is a schema bug.
    pub fn dependency_order(&self) -> Result<Vec<EntityKind>> {
        self.validate()?;
        let graph = SchemaGraph::from_registry(self);
        let result = graph.topo_sort();

        if !result.cyclic.is_empty() {
            return Err(SeedError::CyclicSchema {
                entities: result.cyclic.iter().map(|k| k.to_string()).collect(),
            });
        }

        Ok(result.order)
    }
}
