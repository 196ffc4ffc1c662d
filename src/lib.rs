//! Video-rental relational schema with a referentially-consistent seeder.
//!
//! # Example
//!
//! ```rust
//! use rental_seed::schema::rental_schema;
//! use rental_seed::seed::{run, SeedConfig};
//! use rental_seed::storage::{MemoryStorage, Storage};
//! use rental_seed::verify::verify;
//! use synth::ListSource;
//!
//! let registry = rental_schema();
//! let order = registry.dependency_order().unwrap();
//!
//! let mut storage = MemoryStorage::new();
//! storage.create_structures(&registry, &order).unwrap();
//!
//! let report = run(&registry, &mut storage, ListSource::seeded(7), SeedConfig::default()).unwrap();
//! assert!(report.total_rows > 0);
//! assert!(verify(&registry, &storage).unwrap().is_clean());
//! ```

pub mod error;
pub mod faker;
pub mod pool;
pub mod schema;
pub mod seed;
pub mod storage;
pub mod verify;

pub use error::{Result, SeedError};
