//! Reference pool: committed keys per entity kind.
//!
//! Dependent entities draw their foreign key values from here. Besides the
//! keys themselves the pool keeps:
//! - sampling weights (customers are weighted by their `active` flag)
//! - a reverse-lookup index from parent key to referencing child keys
//! - the state of deferred references between insert and patch
//! - tracked attribute values later steps need (rental dates)
//! - uniqueness tokens of every committed unique set
//!
//! Writes for a batch are staged in a [`PoolBatch`] and applied only after
//! storage has committed, so a rolled-back batch leaves no trace here.

use crate::error::{Result, SeedError};
use crate::schema::EntityKind;
use crate::storage::{Key, Value};
use ahash::AHashMap;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::collections::BTreeMap;

/// State of a deferred foreign key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deferred {
    /// Inserted as NULL, waiting for its target
    Pending,
    Resolved(i64),
    /// Resolved to NULL: there is no valid target
    Vacant,
}

impl Deferred {
    pub fn is_pending(&self) -> bool {
        matches!(self, Deferred::Pending)
    }

    /// Value to store for this state
    pub fn to_value(self) -> Value {
        match self {
            Deferred::Resolved(id) => Value::Int(id),
            Deferred::Pending | Deferred::Vacant => Value::Null,
        }
    }
}

#[derive(Debug, Default, Clone)]
struct KindPool {
    keys: Vec<Key>,
    /// Position of each key in `keys`
    index: AHashMap<Key, usize>,
    /// Parallel to `keys`
    weights: Vec<f64>,
}

#[derive(Debug, Clone)]
enum Staged {
    Inserted(Key),
    Weight(Key, f64),
    Reference(Key, String, i64),
    Pending(Key, String),
    Track(Key, String, Value),
    Unique(String, String, Key),
}

/// Pool writes for one committed batch of a single entity kind
#[derive(Debug, Clone)]
pub struct PoolBatch {
    kind: EntityKind,
    ops: Vec<Staged>,
}

impl PoolBatch {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            ops: Vec::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn inserted(&mut self, key: Key) {
        self.ops.push(Staged::Inserted(key));
    }

    pub fn weight(&mut self, key: Key, weight: f64) {
        self.ops.push(Staged::Weight(key, weight));
    }

    pub fn reference(&mut self, key: Key, attribute: &str, parent: i64) {
        self.ops
            .push(Staged::Reference(key, attribute.to_string(), parent));
    }

    pub fn pending(&mut self, key: Key, attribute: &str) {
        self.ops.push(Staged::Pending(key, attribute.to_string()));
    }

    pub fn track(&mut self, key: Key, attribute: &str, value: Value) {
        self.ops
            .push(Staged::Track(key, attribute.to_string(), value));
    }

    pub fn unique(&mut self, set: &str, token: String, key: Key) {
        self.ops.push(Staged::Unique(set.to_string(), token, key));
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Committed keys and the indexes built from them
#[derive(Debug, Default, Clone)]
pub struct ReferencePool {
    pools: AHashMap<EntityKind, KindPool>,
    references: AHashMap<(EntityKind, Key, String), i64>,
    reverse: AHashMap<(EntityKind, String, i64), Vec<Key>>,
    deferred: AHashMap<(EntityKind, String), BTreeMap<Key, Deferred>>,
    tracked: AHashMap<(EntityKind, String), AHashMap<Key, Value>>,
    unique: AHashMap<(EntityKind, String), AHashMap<String, Key>>,
}

impl ReferencePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a committed key with the default weight
    pub fn record_inserted(&mut self, kind: EntityKind, key: Key) {
        let pool = self.pools.entry(kind).or_default();
        if !pool.index.contains_key(&key) {
            pool.index.insert(key, pool.keys.len());
            pool.keys.push(key);
            pool.weights.push(1.0);
        }
    }

    /// Keys in insertion order
    pub fn keys(&self, kind: EntityKind) -> &[Key] {
        self.pools
            .get(&kind)
            .map(|p| p.keys.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.keys(kind).len()
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.keys(kind).is_empty()
    }

    pub fn contains(&self, kind: EntityKind, key: Key) -> bool {
        self.pools
            .get(&kind)
            .is_some_and(|p| p.index.contains_key(&key))
    }

    fn non_empty(&self, kind: EntityKind) -> Result<&KindPool> {
        match self.pools.get(&kind) {
            Some(pool) if !pool.keys.is_empty() => Ok(pool),
            _ => Err(SeedError::EmptyPool {
                entity: kind,
                needed_by: None,
            }),
        }
    }

    /// Uniformly sample a committed key
    pub fn sample_key<R: Rng + ?Sized>(&self, kind: EntityKind, rng: &mut R) -> Result<Key> {
        let pool = self.non_empty(kind)?;
        Ok(pool.keys[rng.random_range(0..pool.keys.len())])
    }

    pub fn record_weight(&mut self, kind: EntityKind, key: Key, weight: f64) {
        if let Some(pool) = self.pools.get_mut(&kind) {
            if let Some(&idx) = pool.index.get(&key) {
                pool.weights[idx] = weight.max(0.0);
            }
        }
    }

    /// Sample proportionally to recorded weights.
    ///
    /// Falls back to uniform sampling when every weight is zero.
    pub fn sample_weighted<R: Rng + ?Sized>(&self, kind: EntityKind, rng: &mut R) -> Result<Key> {
        let pool = self.non_empty(kind)?;
        match WeightedIndex::new(&pool.weights) {
            Ok(dist) => Ok(pool.keys[dist.sample(rng)]),
            Err(_) => self.sample_key(kind, rng),
        }
    }

    /// Sample uniformly among the least-used keys.
    ///
    /// `usage` reports how often a key has been used so far; callers count
    /// both committed and in-flight uses.
    pub fn sample_balanced<R, F>(&self, kind: EntityKind, usage: F, rng: &mut R) -> Result<Key>
    where
        R: Rng + ?Sized,
        F: Fn(Key) -> usize,
    {
        self.sample_balanced_where(kind, |_| true, usage, rng)?
            .ok_or(SeedError::EmptyPool {
                entity: kind,
                needed_by: None,
            })
    }

    /// Uniformly sample among the keys `allowed` accepts.
    ///
    /// `None` when the pool has keys but none is allowed.
    pub fn sample_key_where<R, P>(&self, kind: EntityKind, allowed: P, rng: &mut R) -> Result<Option<Key>>
    where
        R: Rng + ?Sized,
        P: Fn(Key) -> bool,
    {
        let pool = self.non_empty(kind)?;
        let candidates: Vec<Key> = pool.keys.iter().copied().filter(|&k| allowed(k)).collect();
        Ok(pick(&candidates, rng))
    }

    /// Like `sample_balanced`, restricted to the keys `allowed` accepts
    pub fn sample_balanced_where<R, P, F>(
        &self,
        kind: EntityKind,
        allowed: P,
        usage: F,
        rng: &mut R,
    ) -> Result<Option<Key>>
    where
        R: Rng + ?Sized,
        P: Fn(Key) -> bool,
        F: Fn(Key) -> usize,
    {
        let pool = self.non_empty(kind)?;
        let counted: Vec<(Key, usize)> = pool
            .keys
            .iter()
            .copied()
            .filter(|&k| allowed(k))
            .map(|k| (k, usage(k)))
            .collect();
        let Some(min) = counted.iter().map(|&(_, c)| c).min() else {
            return Ok(None);
        };
        let candidates: Vec<Key> = counted
            .into_iter()
            .filter(|&(_, c)| c == min)
            .map(|(k, _)| k)
            .collect();
        Ok(pick(&candidates, rng))
    }

    pub fn record_reference(&mut self, kind: EntityKind, key: Key, attribute: &str, parent: i64) {
        let previous = self
            .references
            .insert((kind, key, attribute.to_string()), parent);
        if let Some(old) = previous {
            if let Some(children) = self.reverse.get_mut(&(kind, attribute.to_string(), old)) {
                children.retain(|&k| k != key);
            }
        }
        self.reverse
            .entry((kind, attribute.to_string(), parent))
            .or_default()
            .push(key);
    }

    /// Parent id a child row references through `attribute`
    pub fn reference(&self, kind: EntityKind, key: Key, attribute: &str) -> Option<i64> {
        self.references
            .get(&(kind, key, attribute.to_string()))
            .copied()
    }

    /// Child keys referencing `parent` through `attribute`, in insertion order
    pub fn referencing(&self, kind: EntityKind, attribute: &str, parent: i64) -> &[Key] {
        self.reverse
            .get(&(kind, attribute.to_string(), parent))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn record_pending(&mut self, kind: EntityKind, key: Key, attribute: &str) {
        self.deferred
            .entry((kind, attribute.to_string()))
            .or_default()
            .insert(key, Deferred::Pending);
    }

    /// Keys whose deferred `attribute` is still pending, in key order
    pub fn pending(&self, kind: EntityKind, attribute: &str) -> Vec<Key> {
        self.deferred
            .get(&(kind, attribute.to_string()))
            .map(|states| {
                states
                    .iter()
                    .filter(|(_, s)| s.is_pending())
                    .map(|(&k, _)| k)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn deferred_state(&self, kind: EntityKind, key: Key, attribute: &str) -> Option<Deferred> {
        self.deferred
            .get(&(kind, attribute.to_string()))
            .and_then(|states| states.get(&key))
            .copied()
    }

    /// Record the outcome of a deferred reference; a resolved id also enters
    /// the reverse-lookup index.
    pub fn resolve(&mut self, kind: EntityKind, key: Key, attribute: &str, state: Deferred) {
        self.deferred
            .entry((kind, attribute.to_string()))
            .or_default()
            .insert(key, state);
        if let Deferred::Resolved(parent) = state {
            self.record_reference(kind, key, attribute, parent);
        }
    }

    pub fn track(&mut self, kind: EntityKind, key: Key, attribute: &str, value: Value) {
        self.tracked
            .entry((kind, attribute.to_string()))
            .or_default()
            .insert(key, value);
    }

    pub fn tracked(&self, kind: EntityKind, key: Key, attribute: &str) -> Option<&Value> {
        self.tracked
            .get(&(kind, attribute.to_string()))
            .and_then(|values| values.get(&key))
    }

    /// Whether a committed row already holds this uniqueness token
    pub fn is_taken(&self, kind: EntityKind, set: &str, token: &str) -> bool {
        self.find(kind, set, token).is_some()
    }

    /// Key of the committed row holding a uniqueness token
    pub fn find(&self, kind: EntityKind, set: &str, token: &str) -> Option<Key> {
        self.unique
            .get(&(kind, set.to_string()))
            .and_then(|tokens| tokens.get(token))
            .copied()
    }

    /// Apply a committed batch
    pub fn apply(&mut self, batch: PoolBatch) {
        let kind = batch.kind;
        for op in batch.ops {
            match op {
                Staged::Inserted(key) => self.record_inserted(kind, key),
                Staged::Weight(key, weight) => self.record_weight(kind, key, weight),
                Staged::Reference(key, attr, parent) => {
                    self.record_reference(kind, key, &attr, parent)
                }
                Staged::Pending(key, attr) => self.record_pending(kind, key, &attr),
                Staged::Track(key, attr, value) => self.track(kind, key, &attr, value),
                Staged::Unique(set, token, key) => {
                    self.unique
                        .entry((kind, set))
                        .or_default()
                        .insert(token, key);
                }
            }
        }
    }
}

fn pick<R: Rng + ?Sized>(candidates: &[Key], rng: &mut R) -> Option<Key> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates[rng.random_range(0..candidates.len())])
}
