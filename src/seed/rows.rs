//! Row builders, one per generated entity.
//!
//! Foreign keys come from the reference pool through the structural RNG;
//! attribute values come from the synthetic source.

use super::Seeder;
use crate::error::{Result, SeedError};
use crate::schema::EntityKind;
use crate::storage::{Key, Row, Storage, Value};
use ahash::AHashSet;
use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::Rng;
use synth::{capitalize, round_cents, SyntheticSource};

/// Share of customers generated as active
const ACTIVE_CUSTOMER_RATIO: f64 = 0.9;

/// Share of rentals not returned yet
const OPEN_RENTAL_RATIO: f64 = 0.15;

impl<S: Storage, V: SyntheticSource> Seeder<'_, S, V> {
    /// Uniformly sample the id of a committed row
    pub(super) fn pick(&mut self, kind: EntityKind) -> Result<i64> {
        let key = self.pool.sample_key(kind, &mut self.rng)?;
        key_id(kind, key)
    }

    /// Parent id recorded for a committed child row
    fn parent(&self, kind: EntityKind, key: Key, attribute: &str, target: EntityKind) -> Result<i64> {
        self.pool
            .reference(kind, key, attribute)
            .ok_or_else(|| SeedError::UnknownReference {
                entity: kind,
                attribute: attribute.to_string(),
                target,
                value: key.to_string(),
            })
    }

    /// A timestamp inside the configured date window
    fn timestamp_in_window(&mut self) -> NaiveDateTime {
        let window = self.config.dates;
        let date = self.source.random_date(window.start, window.end);
        let seconds = self.source.random_int(0, 86_399) as u32;
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or_default();
        date.and_time(time)
    }

    pub(super) fn city_row(&mut self) -> Result<Row> {
        let country = self.pick(EntityKind::Country)?;
        Ok(Row::new()
            .with("name", self.source.random_city())
            .with("country_id", country))
    }

    pub(super) fn address_row(&mut self) -> Result<Row> {
        let city = self.pick(EntityKind::City)?;
        let suite = self.source.random_int(1, 99_999);
        Ok(Row::new()
            .with("address", self.source.random_street())
            .with("address2", format!("Suite {}", suite))
            .with("district", self.source.random_district())
            .with("postal_code", self.source.random_postal_code())
            .with("phone", self.source.random_phone())
            .with("city_id", city))
    }

    pub(super) fn actor_row(&mut self) -> Result<Row> {
        Ok(Row::new()
            .with("first_name", self.source.random_first_name())
            .with("last_name", self.source.random_last_name()))
    }

    pub(super) fn film_row(&mut self) -> Result<Row> {
        let language = self.pick(EntityKind::Language)?;
        let title = format!(
            "{} {}",
            capitalize(&self.source.random_word()),
            capitalize(&self.source.random_word())
        );
        let rental_rate = round_cents(self.source.random_float(1.10, 2.00));
        let replacement_cost = self.source.random_int(50, 100) as f64;

        Ok(Row::new()
            .with("title", title)
            .with("description", self.source.random_sentence())
            .with("release_year", self.source.random_int(1980, 2019))
            .with("rental_duration", self.source.random_int(1, 10))
            .with("rental_rate", rental_rate)
            .with("length", self.source.random_int(90, 210))
            .with("replacement_cost", replacement_cost)
            .with("rating", self.source.random_int(1, 10))
            .with("special_features", self.source.random_sentence())
            .with("fulltext", self.source.random_sentence())
            .with("language_id", language))
    }

    /// Categories a film holds, committed or staged in this batch
    pub(super) fn categories_of(&self, film: i64, staged: &[Row]) -> AHashSet<i64> {
        let committed = self
            .pool
            .referencing(EntityKind::FilmCategory, "film_id", film)
            .iter()
            .filter_map(|&key| self.pool.reference(EntityKind::FilmCategory, key, "category_id"));
        let in_batch = staged
            .iter()
            .filter(|r| r.get_int("film_id") == Some(film))
            .filter_map(|r| r.get_int("category_id"));
        committed.chain(in_batch).collect()
    }

    /// Any category outside `taken`
    pub(super) fn free_category(&mut self, taken: &AHashSet<i64>) -> Result<Option<i64>> {
        let allowed = |key: Key| key.id().is_some_and(|id| !taken.contains(&id));
        let key = self
            .pool
            .sample_key_where(EntityKind::Category, allowed, &mut self.rng)?;
        key.map(|k| key_id(EntityKind::Category, k)).transpose()
    }

    /// Category outside `taken` with the fewest films so far, counting this batch
    pub(super) fn balanced_category(
        &mut self,
        staged: &[Row],
        taken: &AHashSet<i64>,
    ) -> Result<Option<i64>> {
        let pool = &self.pool;
        let allowed = |key: Key| key.id().is_some_and(|id| !taken.contains(&id));
        let usage = |key: Key| {
            key.id()
                .map(|id| {
                    let committed = pool
                        .referencing(EntityKind::FilmCategory, "category_id", id)
                        .len();
                    let in_batch = staged
                        .iter()
                        .filter(|r| r.get_int("category_id") == Some(id))
                        .count();
                    committed + in_batch
                })
                .unwrap_or(0)
        };
        let key = pool.sample_balanced_where(EntityKind::Category, allowed, usage, &mut self.rng)?;
        key.map(|k| key_id(EntityKind::Category, k)).transpose()
    }

    /// Store with a pending manager; the manager is patched in once staff exist
    pub(super) fn store_row(&mut self) -> Result<Row> {
        let address = self.pick(EntityKind::Address)?;
        Ok(Row::new()
            .with("manager_staff_id", Value::Null)
            .with("address_id", address))
    }

    pub(super) fn staff_row(&mut self, store: Option<i64>) -> Result<Row> {
        let store = match store {
            Some(id) => id,
            None => self.pick(EntityKind::Store)?,
        };
        let address = self.pick(EntityKind::Address)?;
        let first = self.source.random_first_name();
        let last = self.source.random_last_name();
        let suffix = self.source.random_int(1, 999);
        let username = format!("{}.{}{}", first, last, suffix).to_lowercase();
        let password = format!("{:016x}", self.rng.random::<u64>());

        Ok(Row::new()
            .with("first_name", first)
            .with("last_name", last)
            .with("address_id", address)
            .with("store_id", store)
            .with("active", true)
            .with("username", username)
            .with("password", password)
            .with("picture", Value::Null))
    }

    pub(super) fn customer_row(&mut self) -> Result<Row> {
        let store = self.pick(EntityKind::Store)?;
        let address = self.pick(EntityKind::Address)?;
        let first = self.source.random_first_name();
        let last = self.source.random_last_name();
        let suffix = self.source.random_int(1, 9999);
        let email = format!("{}.{}{}@example.com", first, last, suffix).to_lowercase();
        let window = self.config.dates;
        let create_date = self.source.random_date(window.start, window.end);

        Ok(Row::new()
            .with("store_id", store)
            .with("first_name", first)
            .with("last_name", last)
            .with("email", email)
            .with("address_id", address)
            .with("active", self.rng.random_bool(ACTIVE_CUSTOMER_RATIO))
            .with("create_date", create_date)
            .with("last_rental_id", Value::Null))
    }

    pub(super) fn inventory_row(&mut self) -> Result<Row> {
        let film = self.pick(EntityKind::Film)?;
        let store = self.pick(EntityKind::Store)?;
        Ok(Row::new().with("film_id", film).with("store_id", store))
    }

    /// Rental served by a staff member of the store owning the copy
    pub(super) fn rental_row(&mut self) -> Result<Row> {
        let inventory = self.pool.sample_key(EntityKind::Inventory, &mut self.rng)?;
        let inventory_id = key_id(EntityKind::Inventory, inventory)?;
        let store = self.parent(EntityKind::Inventory, inventory, "store_id", EntityKind::Store)?;

        let staff = self.pool.referencing(EntityKind::Staff, "store_id", store);
        if staff.is_empty() {
            return Err(SeedError::EmptyPool {
                entity: EntityKind::Staff,
                needed_by: Some(EntityKind::Rental),
            });
        }
        let staff = staff[self.rng.random_range(0..staff.len())];
        let staff_id = key_id(EntityKind::Staff, staff)?;

        let customer = self.pool.sample_weighted(EntityKind::Customer, &mut self.rng)?;
        let customer_id = key_id(EntityKind::Customer, customer)?;

        let rental_date = self.timestamp_in_window();
        let return_date = if self.rng.random_bool(OPEN_RENTAL_RATIO) {
            None
        } else {
            Some(rental_date + Duration::days(self.source.random_int(1, 10)))
        };

        Ok(Row::new()
            .with("rental_date", rental_date)
            .with("inventory_id", inventory_id)
            .with("customer_id", customer_id)
            .with("return_date", return_date)
            .with("staff_id", staff_id))
    }

    /// Payment for a rental, by the rental's customer to the rental's staff
    pub(super) fn payment_row(&mut self) -> Result<Row> {
        let rental = self.pool.sample_key(EntityKind::Rental, &mut self.rng)?;
        let rental_id = key_id(EntityKind::Rental, rental)?;
        let customer = self.parent(EntityKind::Rental, rental, "customer_id", EntityKind::Customer)?;
        let staff = self.parent(EntityKind::Rental, rental, "staff_id", EntityKind::Staff)?;
        let rental_date = self
            .pool
            .tracked(EntityKind::Rental, rental, "rental_date")
            .and_then(Value::as_timestamp)
            .ok_or_else(|| SeedError::UnknownReference {
                entity: EntityKind::Payment,
                attribute: "payment_date".to_string(),
                target: EntityKind::Rental,
                value: rental.to_string(),
            })?;

        let amount = round_cents(self.source.random_float(0.99, 11.99));
        let payment_date = rental_date
            + Duration::days(self.source.random_int(0, 3))
            + Duration::seconds(self.source.random_int(0, 3_599));

        Ok(Row::new()
            .with("customer_id", customer)
            .with("staff_id", staff)
            .with("rental_id", rental_id)
            .with("amount", amount)
            .with("payment_date", payment_date))
    }
}

fn key_id(kind: EntityKind, key: Key) -> Result<i64> {
    key.id().ok_or_else(|| {
        SeedError::InvalidSchema(format!("{} has a composite key and cannot be referenced", kind))
    })
}
