//! Post-run integrity checks over committed data.
//!
//! Scans every entity and reports:
//! - Duplicate values in unique sets
//! - Foreign keys pointing at missing rows
//! - Films without a category
//! - Store managers working elsewhere, and unresolved deferred references
//! - Payments and rentals whose customer or staff disagree with their parents

use crate::schema::{EntityDef, EntityKind, SchemaRegistry};
use crate::storage::{Key, Row, Storage, StorageResult, Value};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of issues to collect before stopping
const MAX_ISSUES: usize = 1000;

/// Issue severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// An integrity issue found in stored data
#[derive(Debug, Clone, Serialize)]
pub struct VerifyIssue {
    pub code: &'static str,
    pub severity: Severity,
    pub entity: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Key>,
    pub message: String,
}

impl VerifyIssue {
    pub fn error(code: &'static str, entity: EntityKind, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            entity,
            key: None,
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, entity: EntityKind, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Warning,
            entity,
            key: None,
            message: message.into(),
        }
    }

    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }
}

impl fmt::Display for VerifyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.code, self.entity)?;
        if let Some(key) = self.key {
            write!(f, " {}", key)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Outcome of a verification pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct VerifyReport {
    pub rows: BTreeMap<EntityKind, usize>,
    pub issues: Vec<VerifyIssue>,
    /// Set when more than the issue cap was found
    pub truncated: bool,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Issues with a given code
    pub fn with_code(&self, code: &str) -> Vec<&VerifyIssue> {
        self.issues.iter().filter(|i| i.code == code).collect()
    }

    fn push(&mut self, issue: VerifyIssue) {
        if self.issues.len() >= MAX_ISSUES {
            self.truncated = true;
            return;
        }
        self.issues.push(issue);
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{}", issue)?;
        }
        if self.truncated {
            writeln!(f, "... more issues not shown")?;
        }
        let rows: usize = self.rows.values().sum();
        if self.is_clean() {
            write!(f, "OK: {} rows in {} entities", rows, self.rows.len())
        } else {
            write!(
                f,
                "{} issue(s), {} error(s) in {} rows",
                self.issues.len(),
                self.error_count(),
                rows
            )
        }
    }
}

/// Scanned rows of one entity, by key
struct Scanned<'r> {
    def: &'r EntityDef,
    rows: BTreeMap<Key, Row>,
}

impl Scanned<'_> {
    fn int(&self, id: i64, attribute: &str) -> Option<i64> {
        self.rows.get(&Key::Id(id)).and_then(|r| r.get_int(attribute))
    }
}

/// Check every invariant of the rental data set against stored rows
pub fn verify<S: Storage + ?Sized>(
    registry: &SchemaRegistry,
    storage: &S,
) -> StorageResult<VerifyReport> {
    let mut report = VerifyReport::default();
    let mut data: AHashMap<EntityKind, Scanned> = AHashMap::new();

    for def in registry.iter() {
        let mut rows = BTreeMap::new();
        for row in storage.scan(def)? {
            if let Some(key) = def.key_of(&row) {
                rows.insert(key, row);
            }
        }
        report.rows.insert(def.kind, rows.len());
        data.insert(def.kind, Scanned { def, rows });
    }

    for scanned in data.values() {
        check_unique(&mut report, scanned);
        check_references(&mut report, scanned, &data);
    }
    check_film_categories(&mut report, &data);
    check_store_managers(&mut report, &data);
    check_last_rentals(&mut report, &data);
    check_rentals(&mut report, &data);
    check_payments(&mut report, &data);

    Ok(report)
}

fn check_unique(report: &mut VerifyReport, scanned: &Scanned) {
    let kind = scanned.def.kind;
    for set in scanned.def.unique_sets() {
        let mut seen: AHashMap<String, Key> = AHashMap::new();
        for (&key, row) in &scanned.rows {
            let Some(token) = set.token(row) else {
                continue;
            };
            if let Some(first) = seen.insert(token.clone(), key) {
                report.push(
                    VerifyIssue::error(
                        "DUPLICATE_UNIQUE",
                        kind,
                        format!(
                            "{} '{}' already used by {}",
                            set.name,
                            token.replace('\u{1f}', ", "),
                            first
                        ),
                    )
                    .with_key(key),
                );
            }
        }
    }
}

fn check_references(
    report: &mut VerifyReport,
    scanned: &Scanned,
    data: &AHashMap<EntityKind, Scanned>,
) {
    let kind = scanned.def.kind;
    for (attr, fk) in scanned.def.foreign_keys() {
        let parents: AHashSet<Key> = data
            .get(&fk.target)
            .map(|p| p.rows.keys().copied().collect())
            .unwrap_or_default();

        for (&key, row) in &scanned.rows {
            let Some(parent) = row.get_int(&attr.name) else {
                continue;
            };
            if !parents.contains(&Key::Id(parent)) {
                report.push(
                    VerifyIssue::error(
                        "DANGLING_FK",
                        kind,
                        format!("{} = {} has no matching {}", attr.name, parent, fk.target),
                    )
                    .with_key(key),
                );
            }
        }
    }
}

fn check_film_categories(report: &mut VerifyReport, data: &AHashMap<EntityKind, Scanned>) {
    let (Some(films), Some(assigned)) = (
        data.get(&EntityKind::Film),
        data.get(&EntityKind::FilmCategory),
    ) else {
        return;
    };
    let categorized: AHashSet<i64> = assigned
        .rows
        .values()
        .filter_map(|r| r.get_int("film_id"))
        .collect();

    for &key in films.rows.keys() {
        if key.id().is_some_and(|id| !categorized.contains(&id)) {
            report.push(
                VerifyIssue::error("FILM_WITHOUT_CATEGORY", EntityKind::Film, "film has no category")
                    .with_key(key),
            );
        }
    }
}

fn check_store_managers(report: &mut VerifyReport, data: &AHashMap<EntityKind, Scanned>) {
    let (Some(stores), Some(staff)) = (data.get(&EntityKind::Store), data.get(&EntityKind::Staff))
    else {
        return;
    };

    for (&key, row) in &stores.rows {
        match row.get("manager_staff_id") {
            Some(Value::Int(manager)) => {
                let works_at = staff.int(*manager, "store_id");
                if works_at != key.id() {
                    report.push(
                        VerifyIssue::error(
                            "MANAGER_NOT_IN_STORE",
                            EntityKind::Store,
                            format!("manager {} does not work at this store", manager),
                        )
                        .with_key(key),
                    );
                }
            }
            _ => report.push(
                VerifyIssue::error(
                    "PENDING_REFERENCE",
                    EntityKind::Store,
                    "manager_staff_id was never resolved",
                )
                .with_key(key),
            ),
        }
    }
}

fn check_last_rentals(report: &mut VerifyReport, data: &AHashMap<EntityKind, Scanned>) {
    let (Some(customers), Some(rentals)) = (
        data.get(&EntityKind::Customer),
        data.get(&EntityKind::Rental),
    ) else {
        return;
    };

    let mut latest: AHashMap<i64, (Option<chrono::NaiveDateTime>, i64)> = AHashMap::new();
    for (key, row) in &rentals.rows {
        let (Some(id), Some(customer)) = (key.id(), row.get_int("customer_id")) else {
            continue;
        };
        let candidate = (row.get_timestamp("rental_date"), id);
        let entry = latest.entry(customer).or_insert(candidate);
        if candidate > *entry {
            *entry = candidate;
        }
    }

    for (&key, row) in &customers.rows {
        let expected = key.id().and_then(|id| latest.get(&id)).map(|&(_, r)| r);
        let actual = row.get_int("last_rental_id");
        match (expected, actual) {
            (Some(_), None) => report.push(
                VerifyIssue::error(
                    "PENDING_REFERENCE",
                    EntityKind::Customer,
                    "last_rental_id was never resolved",
                )
                .with_key(key),
            ),
            (expected, Some(actual)) if expected != Some(actual) => report.push(
                VerifyIssue::warning(
                    "LAST_RENTAL_MISMATCH",
                    EntityKind::Customer,
                    format!("last_rental_id {} is not the latest rental", actual),
                )
                .with_key(key),
            ),
            _ => {}
        }
    }
}

fn check_rentals(report: &mut VerifyReport, data: &AHashMap<EntityKind, Scanned>) {
    let (Some(rentals), Some(inventory), Some(staff)) = (
        data.get(&EntityKind::Rental),
        data.get(&EntityKind::Inventory),
        data.get(&EntityKind::Staff),
    ) else {
        return;
    };

    for (&key, row) in &rentals.rows {
        let (Some(copy), Some(clerk)) = (row.get_int("inventory_id"), row.get_int("staff_id"))
        else {
            continue;
        };
        let store = inventory.int(copy, "store_id");
        let works_at = staff.int(clerk, "store_id");
        if store.is_some() && works_at.is_some() && store != works_at {
            report.push(
                VerifyIssue::error(
                    "RENTAL_STAFF_ELSEWHERE",
                    EntityKind::Rental,
                    format!("staff {} does not work at the store holding inventory {}", clerk, copy),
                )
                .with_key(key),
            );
        }
    }
}

fn check_payments(report: &mut VerifyReport, data: &AHashMap<EntityKind, Scanned>) {
    let (Some(payments), Some(rentals)) = (
        data.get(&EntityKind::Payment),
        data.get(&EntityKind::Rental),
    ) else {
        return;
    };

    for (&key, row) in &payments.rows {
        let Some(rental) = row.get_int("rental_id") else {
            continue;
        };
        for attribute in ["customer_id", "staff_id"] {
            let paid = row.get_int(attribute);
            let rented = rentals.int(rental, attribute);
            if rented.is_some() && paid != rented {
                report.push(
                    VerifyIssue::error(
                        "PAYMENT_MISMATCH",
                        EntityKind::Payment,
                        format!("{} differs from rental {}", attribute, rental),
                    )
                    .with_key(key),
                );
            }
        }
    }
}
