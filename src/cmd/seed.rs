//! Seed command - create the schema and fill it with a complete data set.

use super::SourceKind;
use anyhow::{bail, Context, Result};
use rental_seed::faker::FakerSource;
use rental_seed::schema::rental_schema;
use rental_seed::seed::{SeedConfig, SeedReport, Seeder};
use rental_seed::storage::{DuckDbStorage, Storage};
use rental_seed::verify::{verify, VerifyReport};
use serde::Serialize;
use std::path::PathBuf;
use synth::{ListSource, SyntheticSource};
use tracing::{debug, info};

/// Seed command options
pub struct SeedOptions {
    pub db: String,
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
    pub source: SourceKind,
    pub verify: bool,
    pub json: bool,
}

#[derive(Serialize)]
struct SeedOutput<'a> {
    db: &'a str,
    report: &'a SeedReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    verification: Option<&'a VerifyReport>,
}

pub fn run(options: SeedOptions) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => SeedConfig::load(path)?,
        None => SeedConfig::default(),
    };
    if let Some(seed) = options.seed {
        config.seed = seed;
    }
    debug!(seed = config.seed, source = ?options.source, "loaded seed configuration");

    match options.source {
        SourceKind::Lists => {
            let source = ListSource::seeded(config.seed);
            seed_with(&options, config, source)
        }
        SourceKind::Faker => {
            let source = FakerSource::seeded(config.seed);
            seed_with(&options, config, source)
        }
    }
}

fn seed_with<V: SyntheticSource>(options: &SeedOptions, config: SeedConfig, source: V) -> Result<()> {
    let registry = rental_schema();
    let order = registry.dependency_order()?;

    let mut storage = DuckDbStorage::open_target(&options.db)
        .with_context(|| format!("failed to open database: {}", options.db))?;
    storage
        .create_structures(&registry, &order)
        .context("failed to create tables")?;

    let report = {
        let mut seeder = Seeder::new(&registry, &mut storage, source, config);
        seeder
            .run()
            .with_context(|| format!("seeding {} failed", options.db))?
    };

    let verification = if options.verify {
        let result = verify(&registry, &storage).context("failed to read back seeded rows")?;
        info!(issues = result.issues.len(), "verification complete");
        Some(result)
    } else {
        None
    };

    if options.json {
        let output = SeedOutput {
            db: &options.db,
            report: &report,
            verification: verification.as_ref(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", report);
        if let Some(result) = &verification {
            println!("\n{}", result);
        }
    }

    if let Some(result) = verification {
        if !result.is_clean() {
            bail!("verification found {} issue(s)", result.issues.len());
        }
    }
    Ok(())
}
