//! YAML configuration for a seeding run.
//!
//! Every field has a default, so a config file only needs the parts it
//! changes:
//!
//! ```yaml
//! seed: 7
//! counts:
//!   films: 100
//!   rentals: 500
//! category_sampling: balanced
//! ```

use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// How films are spread over categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampling {
    /// Pick a category uniformly at random (default)
    #[default]
    Uniform,
    /// Pick among the least-used categories
    Balanced,
}

impl std::str::FromStr for Sampling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "uniform" => Ok(Sampling::Uniform),
            "balanced" => Ok(Sampling::Balanced),
            _ => Err(format!(
                "Unknown sampling mode: {}. Valid options: uniform, balanced",
                s
            )),
        }
    }
}

impl std::fmt::Display for Sampling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sampling::Uniform => write!(f, "uniform"),
            Sampling::Balanced => write!(f, "balanced"),
        }
    }
}

/// Row counts per generated entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RowCounts {
    pub actors: usize,
    pub films: usize,
    pub addresses: usize,
    pub stores: usize,
    pub staff_per_store: usize,
    pub customers: usize,
    pub inventory: usize,
    pub rentals: usize,
    pub payments: usize,
    /// Distinct actors cast in every film
    pub actors_per_film: usize,
}

impl Default for RowCounts {
    fn default() -> Self {
        Self {
            actors: 10,
            films: 10,
            addresses: 30,
            stores: 2,
            staff_per_store: 2,
            customers: 20,
            inventory: 40,
            rentals: 60,
            payments: 50,
            actors_per_film: 2,
        }
    }
}

/// Window that customer, rental and payment dates fall into
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Default for DateWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2005, 5, 24).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2006, 2, 14).unwrap_or_default(),
        }
    }
}

/// Complete seeding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// RNG seed; the same seed reproduces the same data set
    pub seed: u64,
    /// Regeneration attempts per row after a uniqueness collision
    pub max_retries: usize,
    pub categories: Vec<String>,
    pub languages: Vec<String>,
    pub countries: Vec<String>,
    /// City names per country name
    pub cities: BTreeMap<String, Vec<String>>,
    pub counts: RowCounts,
    pub category_sampling: Sampling,
    pub dates: DateWindow,
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for SeedConfig {
    fn default() -> Self {
        let mut cities = BTreeMap::new();
        cities.insert(
            "USA".to_string(),
            names(&["New York", "Los Angeles", "Chicago", "Houston", "Phoenix", "Austin"]),
        );
        cities.insert(
            "Canada".to_string(),
            names(&["Toronto", "Montreal", "Vancouver", "Calgary", "Ottawa"]),
        );

        Self {
            seed: 42,
            max_retries: 20,
            categories: names(&[
                "Action",
                "Animation",
                "Children",
                "Classics",
                "Comedy",
                "Documentary",
                "Drama",
                "Family",
                "Foreign",
                "Games",
                "Horror",
                "Music",
                "New",
                "Sci-Fi",
                "Sports",
                "Travel",
            ]),
            languages: names(&["English", "Italian", "Japanese", "Mandarin", "French", "German"]),
            countries: names(&["USA", "Canada"]),
            cities,
            counts: RowCounts::default(),
            category_sampling: Sampling::Uniform,
            dates: DateWindow::default(),
        }
    }
}

impl SeedConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: SeedConfig = serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a consistent data set
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.dates.start > self.dates.end {
            bail!(
                "dates.start ({}) is after dates.end ({})",
                self.dates.start,
                self.dates.end
            );
        }
        for country in self.cities.keys() {
            if !self.countries.contains(country) {
                bail!("cities lists country '{}' which is not in countries", country);
            }
        }
        if self.counts.stores > 0 && self.counts.staff_per_store == 0 {
            bail!("every store needs staff: staff_per_store must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SeedConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.categories.len(), 16);
        assert_eq!(config.cities["Canada"].len(), 5);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
seed: 7
counts:
  films: 100
category_sampling: balanced
dates:
  start: 2010-01-01
  end: 2010-12-31
"#;
        let config: SeedConfig = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.counts.films, 100);
        assert_eq!(config.counts.actors, 10);
        assert_eq!(config.category_sampling, Sampling::Balanced);
        assert_eq!(config.dates.start, NaiveDate::from_ymd_opt(2010, 1, 1).unwrap());
        assert_eq!(config.languages.len(), 6);
    }

    #[test]
    fn test_validate_rejects_unknown_city_country() {
        let mut config = SeedConfig::default();
        config
            .cities
            .insert("Germany".to_string(), vec!["Berlin".to_string()]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("Germany"));
    }

    #[test]
    fn test_validate_rejects_reversed_window() {
        let mut config = SeedConfig::default();
        std::mem::swap(&mut config.dates.start, &mut config.dates.end);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sampling_from_str() {
        assert_eq!("Balanced".parse::<Sampling>().unwrap(), Sampling::Balanced);
        assert!("random".parse::<Sampling>().is_err());
        assert_eq!(Sampling::Uniform.to_string(), "uniform");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.yaml");
        fs::write(&path, "max_retries: 3\ncountries: [USA]\ncities: {}\n").unwrap();

        let config = SeedConfig::load(&path).unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.countries, vec!["USA".to_string()]);
        assert!(config.cities.is_empty());
    }
}
