//! Synthetic source backed by the `fake` crate.
//!
//! Produces realistic English names, places and lorem text. All values come
//! from one seeded `StdRng`, so a seed reproduces the same data set.

use chrono::{Duration, NaiveDate};
use fake::faker::address::en::{BuildingNumber, CityName, StateName, StreetName, ZipCode};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName};
use fake::faker::phone_number::en::PhoneNumber;
use fake::Fake;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use synth::SyntheticSource;

/// Source drawing from the `fake` crate's English locale
pub struct FakerSource {
    rng: StdRng,
}

impl FakerSource {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl SyntheticSource for FakerSource {
    fn random_word(&mut self) -> String {
        Word().fake_with_rng(&mut self.rng)
    }

    fn random_sentence(&mut self) -> String {
        Sentence(4..10).fake_with_rng(&mut self.rng)
    }

    fn random_first_name(&mut self) -> String {
        FirstName().fake_with_rng(&mut self.rng)
    }

    fn random_last_name(&mut self) -> String {
        LastName().fake_with_rng(&mut self.rng)
    }

    fn random_int(&mut self, min: i64, max: i64) -> i64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(low..=high)
    }

    fn random_float(&mut self, min: f64, max: f64) -> f64 {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        if low == high {
            return low;
        }
        self.rng.random_range(low..high)
    }

    fn random_date(&mut self, min: NaiveDate, max: NaiveDate) -> NaiveDate {
        let (low, high) = if min <= max { (min, max) } else { (max, min) };
        let span = (high - low).num_days();
        low + Duration::days(self.rng.random_range(0..=span))
    }

    fn random_city(&mut self) -> String {
        CityName().fake_with_rng(&mut self.rng)
    }

    fn random_street(&mut self) -> String {
        let number: String = BuildingNumber().fake_with_rng(&mut self.rng);
        let street: String = StreetName().fake_with_rng(&mut self.rng);
        format!("{} {}", number, street)
    }

    fn random_district(&mut self) -> String {
        StateName().fake_with_rng(&mut self.rng)
    }

    fn random_postal_code(&mut self) -> String {
        ZipCode().fake_with_rng(&mut self.rng)
    }

    fn random_phone(&mut self) -> String {
        PhoneNumber().fake_with_rng(&mut self.rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let mut a = FakerSource::seeded(11);
        let mut b = FakerSource::seeded(11);
        assert_eq!(a.random_first_name(), b.random_first_name());
        assert_eq!(a.random_city(), b.random_city());
        assert_eq!(a.random_street(), b.random_street());
    }

    #[test]
    fn test_ranges() {
        let mut source = FakerSource::seeded(5);
        for _ in 0..100 {
            let year = source.random_int(1980, 2019);
            assert!((1980..=2019).contains(&year));
            let rate = source.random_float(1.10, 2.00);
            assert!((1.10..2.00).contains(&rate));
        }
    }

    #[test]
    fn test_text_values_not_empty() {
        let mut source = FakerSource::seeded(5);
        assert!(!source.random_word().is_empty());
        assert!(source.random_sentence().ends_with('.'));
        assert!(!source.random_phone().is_empty());
    }
}
