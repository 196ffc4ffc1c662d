//! Full seeding run in dependency order.

use super::{SeedConfig, Seeder};
use crate::error::{Result, SeedError};
use crate::schema::{EntityKind, SchemaRegistry};
use crate::storage::{Key, Storage};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use synth::SyntheticSource;
use tracing::info;

/// Rows committed for one entity
#[derive(Debug, Clone, Serialize)]
pub struct EntityReport {
    pub entity: EntityKind,
    pub rows: usize,
    pub retries: usize,
    pub elapsed_ms: u128,
}

/// Deferred references patched after their target was seeded
#[derive(Debug, Clone, Serialize)]
pub struct DeferredReport {
    pub entity: EntityKind,
    pub attribute: String,
    pub target: EntityKind,
    pub rows: usize,
}

/// Summary of a complete seeding run
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub seed: u64,
    pub entities: Vec<EntityReport>,
    pub deferred: Vec<DeferredReport>,
    pub total_rows: usize,
    pub retries: usize,
    pub duration_ms: u128,
}

impl SeedReport {
    /// Rows committed for an entity, zero if it was not seeded
    pub fn rows(&self, entity: EntityKind) -> usize {
        self.entities
            .iter()
            .filter(|e| e.entity == entity)
            .map(|e| e.rows)
            .sum()
    }
}

impl fmt::Display for SeedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Seed run (seed {}):", self.seed)?;
        for entity in &self.entities {
            writeln!(
                f,
                "  {:<14} {:>8} rows  {:>4} retries",
                entity.entity.to_string(),
                entity.rows,
                entity.retries
            )?;
        }
        for deferred in &self.deferred {
            writeln!(
                f,
                "  {}.{} -> {}: {} patched",
                deferred.entity, deferred.attribute, deferred.target, deferred.rows
            )?;
        }
        write!(
            f,
            "Total: {} rows, {} retries in {} ms",
            self.total_rows, self.retries, self.duration_ms
        )
    }
}

impl<S: Storage, V: SyntheticSource> Seeder<'_, S, V> {
    /// Seed every entity in dependency order with the configured counts.
    ///
    /// A deferred edge is resolved right after the later of its two ends is
    /// committed. The run stops at the first failing step; earlier steps stay
    /// committed. Storage that already holds rows is refused before anything
    /// is written.
    pub fn run(&mut self) -> Result<SeedReport> {
        let started = Instant::now();
        let order = self.registry.dependency_order()?;
        self.ensure_empty(&order)?;
        let deferred = self.registry.deferred_edges();
        let position = |kind: EntityKind| order.iter().position(|&k| k == kind);

        let mut report = SeedReport {
            seed: self.config.seed,
            ..Default::default()
        };

        for &kind in &order {
            let step_started = Instant::now();
            let retries_before = self.retries;

            let rows = self.seed_step(kind)?.len();
            let retries = self.retries - retries_before;
            info!(entity = %kind, rows, retries, "seeded");

            report.entities.push(EntityReport {
                entity: kind,
                rows,
                retries,
                elapsed_ms: step_started.elapsed().as_millis(),
            });
            report.total_rows += rows;

            let current = position(kind);
            for edge in &deferred {
                if position(edge.child).max(position(edge.parent)) != current {
                    continue;
                }
                let patched = self.resolve_deferred(edge)?;
                report.deferred.push(DeferredReport {
                    entity: edge.child,
                    attribute: edge.attribute.clone(),
                    target: edge.parent,
                    rows: patched,
                });
            }
        }

        report.retries = self.retries;
        report.duration_ms = started.elapsed().as_millis();
        info!(
            rows = report.total_rows,
            retries = report.retries,
            duration_ms = report.duration_ms as u64,
            "seed run complete"
        );
        Ok(report)
    }

    fn ensure_empty(&self, order: &[EntityKind]) -> Result<()> {
        for &kind in order {
            let def = self.registry.def(kind)?;
            let rows = self
                .storage
                .count(def)
                .map_err(|source| SeedError::Storage {
                    entity: kind,
                    rows: 0,
                    source,
                })?;
            if rows > 0 {
                return Err(SeedError::StorageNotEmpty { entity: kind, rows });
            }
        }
        Ok(())
    }

    fn seed_step(&mut self, kind: EntityKind) -> Result<Vec<Key>> {
        let counts = self.config.counts.clone();
        match kind {
            EntityKind::Country => {
                let names = self.config.countries.clone();
                self.seed_countries(&names)
            }
            EntityKind::City => {
                let cities = self.config.cities.clone();
                self.seed_cities(&cities)
            }
            EntityKind::Language => {
                let names = self.config.languages.clone();
                self.seed_named(kind, &names)
            }
            EntityKind::Category => {
                let names = self.config.categories.clone();
                self.seed_named(kind, &names)
            }
            EntityKind::FilmCategory => self.assign_film_categories(),
            EntityKind::FilmActor => self.assign_film_actors(counts.actors_per_film),
            EntityKind::Staff => self.seed_staff(counts.staff_per_store),
            EntityKind::Address => self.seed(kind, counts.addresses),
            EntityKind::Actor => self.seed(kind, counts.actors),
            EntityKind::Film => self.seed(kind, counts.films),
            EntityKind::Store => self.seed(kind, counts.stores),
            EntityKind::Customer => self.seed(kind, counts.customers),
            EntityKind::Inventory => self.seed(kind, counts.inventory),
            EntityKind::Rental => self.seed(kind, counts.rentals),
            EntityKind::Payment => self.seed(kind, counts.payments),
        }
    }
}

/// Seed a whole data set into already created structures
pub fn run<S: Storage, V: SyntheticSource>(
    registry: &SchemaRegistry,
    storage: &mut S,
    source: V,
    config: SeedConfig,
) -> Result<SeedReport> {
    let mut seeder = Seeder::new(registry, storage, source, config);
    seeder.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display_and_rows() {
        let report = SeedReport {
            seed: 42,
            entities: vec![
                EntityReport {
                    entity: EntityKind::Film,
                    rows: 10,
                    retries: 1,
                    elapsed_ms: 3,
                },
                EntityReport {
                    entity: EntityKind::FilmCategory,
                    rows: 10,
                    retries: 0,
                    elapsed_ms: 1,
                },
            ],
            deferred: vec![],
            total_rows: 20,
            retries: 1,
            duration_ms: 4,
        };

        assert_eq!(report.rows(EntityKind::Film), 10);
        assert_eq!(report.rows(EntityKind::Actor), 0);

        let text = report.to_string();
        assert!(text.contains("film_category"));
        assert!(text.ends_with("Total: 20 rows, 1 retries in 4 ms"));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["entities"][0]["entity"], "film");
    }
}
