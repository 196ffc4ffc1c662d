//! Synthetic value sources for seeding.
//!
//! The seeding engine only needs words, names, numbers and dates on request;
//! anything that can produce those stands behind [`SyntheticSource`].
//!
//! # Example
//!
//! ```rust
//! use synth::{ListSource, SyntheticSource};
//!
//! // Same seed, same values
//! let mut source = ListSource::seeded(42);
//! let first = source.random_first_name();
//! let year = source.random_int(1980, 2019);
//!
//! assert!(!first.is_empty());
//! assert!((1980..=2019).contains(&year));
//! ```

pub mod list;

pub use list::ListSource;

use chrono::NaiveDate;

/// Producer of synthetic attribute values.
///
/// Ranges are inclusive on both ends for integers and dates. Implementations
/// swap reversed bounds instead of panicking.
pub trait SyntheticSource {
    /// A single lowercase word
    fn random_word(&mut self) -> String;

    /// A capitalized sentence ending with a period
    fn random_sentence(&mut self) -> String;

    fn random_first_name(&mut self) -> String;

    fn random_last_name(&mut self) -> String;

    fn random_int(&mut self, min: i64, max: i64) -> i64;

    fn random_float(&mut self, min: f64, max: f64) -> f64;

    fn random_date(&mut self, min: NaiveDate, max: NaiveDate) -> NaiveDate;

    /// City name built from two words
    fn random_city(&mut self) -> String {
        format!(
            "{} {}",
            capitalize(&self.random_word()),
            capitalize(&self.random_word())
        )
    }

    fn random_street(&mut self) -> String {
        let number = self.random_int(1, 9999);
        format!("{} {} Street", number, capitalize(&self.random_word()))
    }

    fn random_district(&mut self) -> String {
        capitalize(&self.random_word())
    }

    fn random_postal_code(&mut self) -> String {
        format!("{:05}", self.random_int(501, 99950))
    }

    fn random_phone(&mut self) -> String {
        let area = self.random_int(200, 999);
        let prefix = self.random_int(200, 999);
        let line = self.random_int(1000, 9999);
        format!("+1-{}-{}-{}", area, prefix, line)
    }
}

/// Uppercase the first character of a word
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Round to two decimal places (prices, rates)
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("lorem"), "Lorem");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("Already"), "Already");
    }

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(1.234), 1.23);
        assert_eq!(round_cents(2.004), 2.0);
    }
}
