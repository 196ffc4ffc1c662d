//! Create command - materialize every table in a DuckDB database.

use anyhow::{Context, Result};
use rental_seed::schema::rental_schema;
use rental_seed::storage::{DuckDbStorage, Storage};
use tracing::info;

pub fn run(db: String) -> Result<()> {
    let registry = rental_schema();
    let order = registry.dependency_order()?;

    let mut storage = DuckDbStorage::open_target(&db)
        .with_context(|| format!("failed to open database: {}", db))?;
    storage
        .create_structures(&registry, &order)
        .context("failed to create tables")?;

    let tables = storage.structure_count()?;
    info!(tables, db = %db, "schema ready");
    println!("{} tables in {}", tables, db);
    Ok(())
}
