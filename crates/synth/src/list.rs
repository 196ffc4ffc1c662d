//! Word-list backed source.
//!
//! Deterministic for a given seed, with no external data dependencies.

use crate::{capitalize, SyntheticSource};
use chrono::{Duration, NaiveDate};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// First names for fake data
const FIRST_NAMES: &[&str] = &[
    "Alice", "Bob", "Carol", "David", "Emma", "Frank", "Grace", "Henry", "Iris", "Jack", "Kate",
    "Leo", "Maya", "Noah", "Olivia", "Peter", "Quinn", "Rose", "Sam", "Tara", "Uma", "Victor",
    "Wendy", "Xavier", "Yara", "Zack", "Anna", "Brian", "Clara", "Derek",
];

/// Last names for fake data
const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Martinez",
    "Anderson", "Taylor", "Thomas", "Moore", "Jackson", "Martin", "Lee", "Thompson", "White",
    "Harris", "Clark", "Lewis", "Robinson", "Walker", "Hall", "Young", "King", "Wright", "Hill",
];

/// Lorem ipsum words for text generation
const LOREM_WORDS: &[&str] = &[
    "lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
    "enim",
    "ad",
    "minim",
    "veniam",
    "quis",
    "nostrud",
    "exercitation",
    "ullamco",
    "laboris",
    "nisi",
    "aliquip",
    "ex",
    "ea",
    "commodo",
    "consequat",
    "duis",
    "aute",
    "irure",
    "in",
    "reprehenderit",
    "voluptate",
    "velit",
    "esse",
    "cillum",
    "fugiat",
    "nulla",
    "pariatur",
    "excepteur",
    "sint",
    "occaecat",
    "cupidatat",
    "non",
    "proident",
    "sunt",
    "culpa",
    "qui",
    "officia",
    "deserunt",
    "mollit",
    "anim",
    "id",
    "est",
    "laborum",
];

/// Street suffixes for addresses
const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Drive", "Way", "Court"];

/// Synthetic source drawing from fixed word lists
pub struct ListSource<R: Rng = ChaCha8Rng> {
    rng: R,
}

impl ListSource<ChaCha8Rng> {
    /// Create a deterministic source from a seed
    pub fn seeded(seed: u64) -> Self {
        Self::new(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> ListSource<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    fn pick(&mut self, items: &'static [&'static str]) -> &'static str {
        items[self.rng.random_range(0..items.len())]
    }

    /// Generate lorem ipsum text
    fn lorem(&mut self, word_count: usize) -> String {
        (0..word_count)
            .map(|_| self.pick(LOREM_WORDS))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl<R: Rng> SyntheticSource for ListSource<R> {
    fn random_word(&mut self) -> String {
        self.pick(LOREM_WORDS).to_string()
    }

    fn random_sentence(&mut self) -> String {
        let word_count = self.rng.random_range(4..=10);
        let mut text = capitalize(&self.lorem(word_count));
        text.push('.');
        text
    }

    fn random_first_name(&mut self) -> String {
        self.pick(FIRST_NAMES).to_string()
    }

    fn random_last_name(&mut self) -> String {
        self.pick(LAST_NAMES).to_string()
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

    fn random_street(&mut self) -> String {
        let number = self.rng.random_range(1..10000);
        let name = capitalize(self.pick(LOREM_WORDS));
        let suffix = self.pick(STREET_SUFFIXES);
        format!("{} {} {}", number, name, suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_generation() {
        let mut a = ListSource::seeded(42);
        let mut b = ListSource::seeded(42);

        // Same seed should produce same results
        assert_eq!(a.random_first_name(), b.random_first_name());
        assert_eq!(a.random_sentence(), b.random_sentence());
        assert_eq!(a.random_int(0, 1000), b.random_int(0, 1000));
    }

    #[test]
    fn test_int_range_inclusive_and_swapped() {
        let mut source = ListSource::seeded(7);
        for _ in 0..200 {
            let n = source.random_int(10, 1);
            assert!((1..=10).contains(&n));
        }
        assert_eq!(source.random_int(5, 5), 5);
    }

    #[test]
    fn test_float_range() {
        let mut source = ListSource::seeded(7);
        for _ in 0..200 {
            let f = source.random_float(1.10, 2.00);
            assert!((1.10..2.00).contains(&f));
        }
        assert_eq!(source.random_float(3.0, 3.0), 3.0);
    }

    #[test]
    fn test_date_range() {
        let mut source = ListSource::seeded(7);
        let min = NaiveDate::from_ymd_opt(2005, 5, 24).unwrap();
        let max = NaiveDate::from_ymd_opt(2005, 6, 24).unwrap();
        for _ in 0..200 {
            let d = source.random_date(min, max);
            assert!(d >= min && d <= max);
        }
        assert_eq!(source.random_date(min, min), min);
    }

    #[test]
    fn test_sentence_shape() {
        let mut source = ListSource::seeded(1);
        let sentence = source.random_sentence();
        assert!(sentence.ends_with('.'));
        assert!(sentence.chars().next().unwrap().is_uppercase());
    }

    #[test]
    fn test_default_helpers() {
        let mut source = ListSource::seeded(3);
        assert_eq!(source.random_postal_code().len(), 5);
        assert!(source.random_phone().starts_with("+1-"));
        assert!(source.random_city().contains(' '));
    }
}
