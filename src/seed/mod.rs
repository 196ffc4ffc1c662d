//! Seeding engine.
//!
//! A [`Seeder`] is the context of one seeding run. It borrows the storage
//! session for the whole run and owns the reference pool, the structural RNG
//! and the synthetic value source.
//!
//! Every step follows the same shape:
//! 1. Generate all rows, drawing foreign keys from the pool and regenerating
//!    a row when it collides with a committed or staged unique value
//! 2. Insert the batch inside one storage transaction
//! 3. Only after commit, record keys, references and tokens in the pool
//!
//! A failure at any point rolls the transaction back and leaves the pool
//! untouched.

mod config;
mod rows;
mod run;

pub use config::{DateWindow, RowCounts, Sampling, SeedConfig};
pub use run::{run, DeferredReport, EntityReport, SeedReport};

use crate::error::{Result, SeedError};
use crate::pool::{Deferred, PoolBatch, ReferencePool};
use crate::schema::{Edge, EntityDef, EntityKind, SchemaRegistry, UniqueSet};
use crate::storage::{Key, Row, Storage, StorageResult, Value};
use ahash::AHashSet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use synth::SyntheticSource;
use tracing::{debug, info, warn};

/// Sampling weight of an inactive customer (active customers weigh 1.0)
pub const INACTIVE_CUSTOMER_WEIGHT: f64 = 0.2;

/// Seeding-run context
pub struct Seeder<'a, S: Storage, V: SyntheticSource> {
    registry: &'a SchemaRegistry,
    storage: &'a mut S,
    source: V,
    pool: ReferencePool,
    rng: StdRng,
    config: SeedConfig,
    retries: usize,
}

impl<'a, S: Storage, V: SyntheticSource> Seeder<'a, S, V> {
    pub fn new(
        registry: &'a SchemaRegistry,
        storage: &'a mut S,
        source: V,
        config: SeedConfig,
    ) -> Self {
        Self {
            registry,
            storage,
            source,
            pool: ReferencePool::new(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            retries: 0,
        }
    }

    pub fn pool(&self) -> &ReferencePool {
        &self.pool
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        self.registry
    }

    pub fn storage(&self) -> &S {
        &*self.storage
    }

    /// Uniqueness collisions regenerated so far
    pub fn retries(&self) -> usize {
        self.retries
    }

    /// Seed `count` rows of any entity kind.
    ///
    /// Named lookups (country, language, category) take names from the
    /// configured lists in order; everything else is synthetic.
    pub fn seed(&mut self, kind: EntityKind, count: usize) -> Result<Vec<Key>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        match kind {
            EntityKind::Country => {
                let names = self.config.countries.clone();
                self.seed_from_list(kind, names, count)
            }
            EntityKind::Language => {
                let names = self.config.languages.clone();
                self.seed_from_list(kind, names, count)
            }
            EntityKind::Category => {
                let names = self.config.categories.clone();
                self.seed_from_list(kind, names, count)
            }
            EntityKind::City => self.seed_rows(kind, count, |s, _| s.city_row()),
            EntityKind::Address => self.seed_rows(kind, count, |s, _| s.address_row()),
            EntityKind::Actor => self.seed_rows(kind, count, |s, _| s.actor_row()),
            EntityKind::Film => self.seed_rows(kind, count, |s, _| s.film_row()),
            EntityKind::FilmCategory => self.seed_rows(kind, count, |s, _| {
                let film = s.pick(EntityKind::Film)?;
                let category = s.pick(EntityKind::Category)?;
                Ok(junction_row("category_id", film, category))
            }),
            EntityKind::FilmActor => self.seed_rows(kind, count, |s, _| {
                let film = s.pick(EntityKind::Film)?;
                let actor = s.pick(EntityKind::Actor)?;
                Ok(junction_row("actor_id", film, actor))
            }),
            EntityKind::Store => self.seed_rows(kind, count, |s, _| s.store_row()),
            EntityKind::Staff => self.seed_rows(kind, count, |s, _| s.staff_row(None)),
            EntityKind::Customer => self.seed_rows(kind, count, |s, _| s.customer_row()),
            EntityKind::Inventory => self.seed_rows(kind, count, |s, _| s.inventory_row()),
            EntityKind::Rental => self.seed_rows(kind, count, |s, _| s.rental_row()),
            EntityKind::Payment => self.seed_rows(kind, count, |s, _| s.payment_row()),
        }
    }

    /// Seed one row per distinct name of a named lookup entity.
    ///
    /// Repeated names and names already stored are skipped.
    pub fn seed_named(&mut self, kind: EntityKind, names: &[String]) -> Result<Vec<Key>> {
        let def = self.registry.def(kind)?;
        if !def.has_attribute("name") {
            return Err(SeedError::InvalidSchema(format!(
                "{} has no name attribute",
                kind
            )));
        }
        let fresh = self.fresh_names(kind, names.iter().map(String::as_str));
        self.seed_from_list(kind, names.to_vec(), fresh)
    }

    pub fn seed_countries(&mut self, names: &[String]) -> Result<Vec<Key>> {
        self.seed_named(EntityKind::Country, names)
    }

    /// Seed cities per country name.
    ///
    /// Every country is looked up by exact name before any city is generated;
    /// countries without cities are fine.
    pub fn seed_cities(&mut self, cities: &BTreeMap<String, Vec<String>>) -> Result<Vec<Key>> {
        let mut planned: Vec<(String, i64)> = Vec::new();

        for (country, names) in cities.iter().filter(|(_, names)| !names.is_empty()) {
            let country_id = self
                .pool
                .find(EntityKind::Country, "name", country)
                .and_then(|k| k.id())
                .ok_or_else(|| SeedError::UnknownReference {
                    entity: EntityKind::City,
                    attribute: "country_id".to_string(),
                    target: EntityKind::Country,
                    value: country.clone(),
                })?;
            planned.extend(names.iter().map(|name| (name.clone(), country_id)));
        }

        let count = self.fresh_names(EntityKind::City, planned.iter().map(|(n, _)| n.as_str()));
        let mut cursor = 0;
        self.seed_rows(EntityKind::City, count, |s, staged| {
            while let Some((name, country_id)) = planned.get(cursor) {
                cursor += 1;
                if s.name_available(EntityKind::City, staged, name) {
                    return Ok(Row::new()
                        .with("name", name.as_str())
                        .with("country_id", *country_id));
                }
            }
            Err(SeedError::UniquenessExhausted {
                entity: EntityKind::City,
                attribute: "name".to_string(),
                requested: count,
                obtained: staged.len(),
            })
        })
    }

    /// Give every film one (more) category.
    ///
    /// Categories a film already has are never drawn again, so calling this
    /// repeatedly fails only once some film holds every category.
    pub fn assign_film_categories(&mut self) -> Result<Vec<Key>> {
        let films = self.ids(EntityKind::Film);
        let requested = films.len();
        let balanced = self.config.category_sampling == Sampling::Balanced;

        self.seed_rows(EntityKind::FilmCategory, requested, |s, staged| {
            let film = films[staged.len()];
            let taken = s.categories_of(film, staged);
            let category = if balanced {
                s.balanced_category(staged, &taken)?
            } else {
                s.free_category(&taken)?
            };
            let category = category.ok_or_else(|| SeedError::UniquenessExhausted {
                entity: EntityKind::FilmCategory,
                attribute: "film_id+category_id".to_string(),
                requested,
                obtained: staged.len(),
            })?;
            Ok(junction_row("category_id", film, category))
        })
    }

    /// Cast `per_film` distinct actors in every film
    pub fn assign_film_actors(&mut self, per_film: usize) -> Result<Vec<Key>> {
        let films = self.ids(EntityKind::Film);

        self.seed_rows(EntityKind::FilmActor, films.len() * per_film, |s, staged| {
            let film = films[staged.len() / per_film];
            let actor = s.pick(EntityKind::Actor)?;
            Ok(junction_row("actor_id", film, actor))
        })
    }

    /// Give every store `per_store` staff members
    pub fn seed_staff(&mut self, per_store: usize) -> Result<Vec<Key>> {
        let stores = self.ids(EntityKind::Store);
        if stores.is_empty() && per_store > 0 {
            return Err(SeedError::EmptyPool {
                entity: EntityKind::Store,
                needed_by: Some(EntityKind::Staff),
            });
        }

        self.seed_rows(EntityKind::Staff, stores.len() * per_store, |s, staged| {
            s.staff_row(Some(stores[staged.len() / per_store]))
        })
    }

    /// Patch every pending store manager with a staff member of that store.
    ///
    /// The staff member with the lowest key manages the store.
    pub fn resolve_store_managers(&mut self) -> Result<usize> {
        let attribute = "manager_staff_id";
        let mut plan = Vec::new();

        for key in self.pool.pending(EntityKind::Store, attribute) {
            let manager = key
                .id()
                .and_then(|store| {
                    self.pool
                        .referencing(EntityKind::Staff, "store_id", store)
                        .iter()
                        .filter_map(Key::id)
                        .min()
                })
                .ok_or_else(|| SeedError::DeferredUnresolved {
                    entity: EntityKind::Store,
                    attribute: attribute.to_string(),
                    key: key.to_string(),
                })?;
            plan.push((key, Deferred::Resolved(manager)));
        }

        self.patch_deferred(EntityKind::Store, attribute, plan)
    }

    /// Patch every pending `last_rental_id` with the customer's latest rental.
    ///
    /// Customers who never rented keep NULL. Ties on the rental date go to
    /// the higher rental key.
    pub fn resolve_last_rentals(&mut self) -> Result<usize> {
        let attribute = "last_rental_id";
        let mut plan = Vec::new();

        for key in self.pool.pending(EntityKind::Customer, attribute) {
            let latest = key.id().and_then(|customer| {
                self.pool
                    .referencing(EntityKind::Rental, "customer_id", customer)
                    .iter()
                    .filter_map(|&rental| {
                        let date = self
                            .pool
                            .tracked(EntityKind::Rental, rental, "rental_date")
                            .and_then(Value::as_timestamp);
                        rental.id().map(|id| (date, id))
                    })
                    .max()
            });
            let state = match latest {
                Some((_, rental)) => Deferred::Resolved(rental),
                None => Deferred::Vacant,
            };
            plan.push((key, state));
        }

        self.patch_deferred(EntityKind::Customer, attribute, plan)
    }

    /// Resolve the pending references of one deferred edge
    pub fn resolve_deferred(&mut self, edge: &Edge) -> Result<usize> {
        match (edge.child, edge.attribute.as_str()) {
            (EntityKind::Store, "manager_staff_id") => self.resolve_store_managers(),
            (EntityKind::Customer, "last_rental_id") => self.resolve_last_rentals(),
            _ => Err(SeedError::InvalidSchema(format!(
                "no resolver for deferred {}.{}",
                edge.child, edge.attribute
            ))),
        }
    }

    /// Write resolved deferred references in one transaction, then record
    /// every outcome in the pool. Returns the number of rows patched.
    fn patch_deferred(
        &mut self,
        kind: EntityKind,
        attribute: &str,
        plan: Vec<(Key, Deferred)>,
    ) -> Result<usize> {
        if plan.is_empty() {
            return Ok(0);
        }
        let registry = self.registry;
        let def = registry.def(kind)?;
        let patched = plan
            .iter()
            .filter(|(_, state)| matches!(state, Deferred::Resolved(_)))
            .count();

        if patched > 0 {
            self.transact(kind, patched, |storage| {
                for (key, state) in &plan {
                    if let Deferred::Resolved(_) = state {
                        storage.update(def, *key, attribute, &state.to_value())?;
                    }
                }
                Ok(())
            })?;
        }

        let vacant = plan.len() - patched;
        for (key, state) in plan {
            self.pool.resolve(kind, key, attribute, state);
        }

        info!(entity = %kind, attribute, rows = patched, vacant, "resolved deferred references");
        Ok(patched)
    }

    fn seed_from_list(
        &mut self,
        kind: EntityKind,
        names: Vec<String>,
        count: usize,
    ) -> Result<Vec<Key>> {
        let mut cursor = 0;
        self.seed_rows(kind, count, |s, staged| {
            while let Some(name) = names.get(cursor) {
                cursor += 1;
                if s.name_available(kind, staged, name) {
                    return Ok(Row::new().with("name", name.as_str()));
                }
            }
            Err(SeedError::UniquenessExhausted {
                entity: kind,
                attribute: "name".to_string(),
                requested: count,
                obtained: staged.len(),
            })
        })
    }

    /// Distinct names not yet stored for `kind`
    fn fresh_names<'n>(&self, kind: EntityKind, names: impl Iterator<Item = &'n str>) -> usize {
        names
            .filter(|name| !self.pool.is_taken(kind, "name", name))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Whether a listed name is neither committed nor staged in this batch
    fn name_available(&self, kind: EntityKind, staged: &[Row], name: &str) -> bool {
        !self.pool.is_taken(kind, "name", name)
            && !staged.iter().any(|r| r.get_text("name") == Some(name))
    }

    /// Generate, check, insert and record `count` rows of one entity.
    ///
    /// `build` receives the rows staged so far in this batch.
    fn seed_rows<F>(&mut self, kind: EntityKind, count: usize, mut build: F) -> Result<Vec<Key>>
    where
        F: FnMut(&mut Self, &[Row]) -> Result<Row>,
    {
        if count == 0 {
            return Ok(Vec::new());
        }

        let registry = self.registry;
        let def = registry.def(kind)?;
        let sets = def.unique_sets();
        let retries_before = self.retries;

        let mut rows: Vec<Row> = Vec::with_capacity(count);
        let mut staged: AHashSet<(usize, String)> = AHashSet::new();

        while rows.len() < count {
            let mut attempts = 0;
            loop {
                let row = build(self, &rows).map_err(|e| match e {
                    SeedError::EmptyPool {
                        entity,
                        needed_by: None,
                    } => SeedError::EmptyPool {
                        entity,
                        needed_by: Some(kind),
                    },
                    other => other,
                })?;

                match self.collision(kind, &sets, &row, &staged) {
                    None => {
                        for (idx, set) in sets.iter().enumerate() {
                            if let Some(token) = set.token(&row) {
                                staged.insert((idx, token));
                            }
                        }
                        rows.push(row);
                        break;
                    }
                    Some(set) => {
                        if attempts >= self.config.max_retries {
                            return Err(SeedError::UniquenessExhausted {
                                entity: kind,
                                attribute: set.to_string(),
                                requested: count,
                                obtained: rows.len(),
                            });
                        }
                        attempts += 1;
                        self.retries += 1;
                        debug!(entity = %kind, attribute = %set, attempt = attempts, "unique collision, regenerating row");
                    }
                }
            }
        }

        let keys = self.transact(kind, rows.len(), |storage| {
            storage.insert_batch(def, &rows)
        })?;

        let mut batch = PoolBatch::new(kind);
        for (row, &key) in rows.iter().zip(&keys) {
            stage_row(&mut batch, def, &sets, row, key);
        }
        self.pool.apply(batch);

        debug!(
            entity = %kind,
            rows = keys.len(),
            retries = self.retries - retries_before,
            "committed batch"
        );
        Ok(keys)
    }

    /// First unique set the row collides on, committed or staged
    fn collision<'s>(
        &self,
        kind: EntityKind,
        sets: &'s [UniqueSet],
        row: &Row,
        staged: &AHashSet<(usize, String)>,
    ) -> Option<&'s str> {
        sets.iter().enumerate().find_map(|(idx, set)| {
            let token = set.token(row)?;
            let taken = self.pool.is_taken(kind, &set.name, &token)
                || staged.contains(&(idx, token));
            taken.then_some(set.name.as_str())
        })
    }

    /// Run storage work inside a transaction, rolling back on failure
    fn transact<T>(
        &mut self,
        kind: EntityKind,
        rows: usize,
        work: impl FnOnce(&mut S) -> StorageResult<T>,
    ) -> Result<T> {
        let wrap = |source| SeedError::Storage {
            entity: kind,
            rows,
            source,
        };

        self.storage.begin().map_err(wrap)?;
        let result = work(&mut *self.storage).and_then(|value| {
            self.storage.commit()?;
            Ok(value)
        });

        result.map_err(|e| {
            self.abort(kind);
            wrap(e)
        })
    }

    /// Roll back an open transaction after a failed step
    fn abort(&mut self, kind: EntityKind) {
        if !self.storage.in_transaction() {
            return;
        }
        match self.storage.rollback() {
            Ok(()) => warn!(entity = %kind, "rolled back failed batch"),
            Err(e) => warn!(entity = %kind, error = %e, "rollback failed"),
        }
    }

    /// Ids of every committed row of a single-key entity
    fn ids(&self, kind: EntityKind) -> Vec<i64> {
        self.pool.keys(kind).iter().filter_map(Key::id).collect()
    }
}

impl<S: Storage, V: SyntheticSource> Drop for Seeder<'_, S, V> {
    fn drop(&mut self) {
        if self.storage.in_transaction() {
            warn!("seeder dropped with an open transaction, rolling back");
            if let Err(e) = self.storage.rollback() {
                warn!(error = %e, "rollback on drop failed");
            }
        }
    }
}

fn junction_row(other: &str, film: i64, id: i64) -> Row {
    Row::new().with("film_id", film).with(other, id)
}

/// Stage everything the pool learns from one committed row
fn stage_row(batch: &mut PoolBatch, def: &EntityDef, sets: &[UniqueSet], row: &Row, key: Key) {
    batch.inserted(key);

    for (attr, fk) in def.foreign_keys() {
        match row.get(&attr.name) {
            Some(Value::Int(parent)) => batch.reference(key, &attr.name, *parent),
            None | Some(Value::Null) if fk.deferred => batch.pending(key, &attr.name),
            _ => {}
        }
    }

    for set in sets {
        if let Some(token) = set.token(row) {
            batch.unique(&set.name, token, key);
        }
    }

    match def.kind {
        EntityKind::Customer => {
            let weight = if row.get_bool("active") == Some(false) {
                INACTIVE_CUSTOMER_WEIGHT
            } else {
                1.0
            };
            batch.weight(key, weight);
        }
        EntityKind::Rental => {
            if let Some(date) = row.get("rental_date") {
                batch.track(key, "rental_date", date.clone());
            }
        }
        _ => {}
    }
}
