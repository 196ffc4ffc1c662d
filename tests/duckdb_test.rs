//! Integration tests for the DuckDB storage backend.

use rental_seed::faker::FakerSource;
use rental_seed::schema::{rental_schema, EntityKind};
use rental_seed::seed::{run, SeedConfig};
use rental_seed::storage::{DuckDbStorage, Row, Storage, StorageError, Value};
use rental_seed::verify::verify;
use rental_seed::SeedError;
use synth::ListSource;
use tempfile::TempDir;

// =============================================================================
// Schema creation
// =============================================================================

#[test]
fn test_create_structures_is_idempotent() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let mut storage = DuckDbStorage::open_in_memory().unwrap();

    storage.create_structures(&registry, &order).unwrap();
    assert_eq!(storage.structure_count().unwrap(), 15);

    storage.create_structures(&registry, &order).unwrap();
    assert_eq!(storage.structure_count().unwrap(), 15);
}

#[test]
fn test_open_target_memory() {
    let storage = DuckDbStorage::open_target(":memory:").unwrap();
    assert_eq!(storage.structure_count().unwrap(), 0);
}

// =============================================================================
// Constraints
// =============================================================================

#[test]
fn test_duplicate_name_rejected() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    storage.create_structures(&registry, &order).unwrap();

    let country = registry.get(EntityKind::Country).unwrap();
    storage
        .insert(country, &Row::new().with("name", "USA"))
        .unwrap();
    let err = storage
        .insert(country, &Row::new().with("name", "USA"))
        .unwrap_err();
    assert!(matches!(err, StorageError::Duckdb(_)));
    assert_eq!(storage.count(country).unwrap(), 1);
}

#[test]
fn test_deferred_reference_can_be_patched() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    storage.create_structures(&registry, &order).unwrap();

    let def = |kind| registry.get(kind).unwrap();
    storage
        .insert(def(EntityKind::Country), &Row::new().with("name", "USA"))
        .unwrap();
    storage
        .insert(
            def(EntityKind::City),
            &Row::new().with("name", "Austin").with("country_id", 1i64),
        )
        .unwrap();
    storage
        .insert(
            def(EntityKind::Address),
            &Row::new()
                .with("address", "1 Main Street")
                .with("district", "Travis")
                .with("phone", "555-0100")
                .with("city_id", 1i64),
        )
        .unwrap();
    let store = storage
        .insert(
            def(EntityKind::Store),
            &Row::new()
                .with("manager_staff_id", Value::Null)
                .with("address_id", 1i64),
        )
        .unwrap();
    storage
        .insert(
            def(EntityKind::Staff),
            &Row::new()
                .with("first_name", "Ada")
                .with("last_name", "Byron")
                .with("address_id", 1i64)
                .with("store_id", 1i64)
                .with("active", true)
                .with("username", "ada")
                .with("password", "secret"),
        )
        .unwrap();

    storage
        .update(
            def(EntityKind::Store),
            store,
            "manager_staff_id",
            &Value::Int(1),
        )
        .unwrap();

    let stores = storage.scan(def(EntityKind::Store)).unwrap();
    assert_eq!(stores[0].get_int("manager_staff_id"), Some(1));
    assert!(stores[0].get_timestamp("last_update").is_some());
}

// =============================================================================
// Full runs
// =============================================================================

#[test]
fn test_full_seed_on_disk() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("rental.duckdb");
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();

    let total_rows = {
        let mut storage = DuckDbStorage::open(&db_path).unwrap();
        storage.create_structures(&registry, &order).unwrap();
        let report = run(
            &registry,
            &mut storage,
            ListSource::seeded(42),
            SeedConfig::default(),
        )
        .unwrap();

        let verification = verify(&registry, &storage).unwrap();
        assert!(verification.is_clean(), "{}", verification);
        report.total_rows
    };

    // Reopen and count what was committed
    let mut storage = DuckDbStorage::open(&db_path).unwrap();
    let stored: usize = registry
        .iter()
        .map(|def| storage.count(def).unwrap())
        .sum();
    assert_eq!(stored, total_rows);

    // Seeding the same file again is refused without touching it
    storage.create_structures(&registry, &order).unwrap();
    let err = run(
        &registry,
        &mut storage,
        ListSource::seeded(43),
        SeedConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, SeedError::StorageNotEmpty { .. }), "{}", err);
    let restored: usize = registry
        .iter()
        .map(|def| storage.count(def).unwrap())
        .sum();
    assert_eq!(restored, total_rows);
}

#[test]
fn test_faker_source_seeds_clean() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let mut storage = DuckDbStorage::open_in_memory().unwrap();
    storage.create_structures(&registry, &order).unwrap();

    let mut config = SeedConfig::default();
    config.counts.films = 25;
    let report = run(&registry, &mut storage, FakerSource::seeded(8), config).unwrap();
    assert_eq!(report.rows(EntityKind::Film), 25);

    let verification = verify(&registry, &storage).unwrap();
    assert!(verification.is_clean(), "{}", verification);
}
