//! Error types for schema handling and seeding.

use crate::schema::EntityKind;
use crate::storage::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SeedError>;

/// Everything that can stop a seeding step.
///
/// A failing step never leaves a partial batch behind: the storage
/// transaction is rolled back and the reference pool is left as it was.
#[derive(Debug, Error)]
pub enum SeedError {
    /// Non-deferred foreign keys form a cycle
    #[error("cyclic schema: no dependency order exists for {}", .entities.join(", "))]
    CyclicSchema { entities: Vec<String> },

    /// A parent entity has no committed rows to reference
    #[error("{entity} has no rows to sample{}", .needed_by.map(|k| format!(" (needed by {})", k)).unwrap_or_default())]
    EmptyPool {
        entity: EntityKind,
        needed_by: Option<EntityKind>,
    },

    /// Seed input names a row that was never seeded
    #[error("{entity}.{attribute}: no {target} matches '{value}'")]
    UnknownReference {
        entity: EntityKind,
        attribute: String,
        target: EntityKind,
        value: String,
    },

    /// Ran out of distinct values for a unique attribute set
    #[error("{entity}.{attribute}: requested {requested} unique values, obtained {obtained}")]
    UniquenessExhausted {
        entity: EntityKind,
        attribute: String,
        requested: usize,
        obtained: usize,
    },

    /// Storage rejected a batch; the batch was rolled back
    #[error("storing {rows} {entity} rows failed: {source}")]
    Storage {
        entity: EntityKind,
        rows: usize,
        #[source]
        source: StorageError,
    },

    /// A full run was pointed at storage that already holds rows
    #[error("{entity} already holds {rows} rows; a full run needs empty storage")]
    StorageNotEmpty { entity: EntityKind, rows: usize },

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// A deferred reference has no valid target
    #[error("{entity} {key}: no valid target for deferred {attribute}")]
    DeferredUnresolved {
        entity: EntityKind,
        attribute: String,
        key: String,
    },
}

impl SeedError {
    /// Whether the caller can recover by changing the request (fewer rows, larger lists)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SeedError::UniquenessExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_entity_and_attribute() {
        let err = SeedError::UniquenessExhausted {
            entity: EntityKind::Category,
            attribute: "name".to_string(),
            requested: 5,
            obtained: 3,
        };
        assert_eq!(
            err.to_string(),
            "category.name: requested 5 unique values, obtained 3"
        );
        assert!(err.is_recoverable());

        let err = SeedError::EmptyPool {
            entity: EntityKind::Film,
            needed_by: Some(EntityKind::Inventory),
        };
        assert_eq!(err.to_string(), "film has no rows to sample (needed by inventory)");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_not_empty_names_the_entity() {
        let err = SeedError::StorageNotEmpty {
            entity: EntityKind::Country,
            rows: 109,
        };
        assert_eq!(
            err.to_string(),
            "country already holds 109 rows; a full run needs empty storage"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_cyclic_lists_entities() {
        let err = SeedError::CyclicSchema {
            entities: vec!["store".to_string(), "staff".to_string()],
        };
        assert!(err.to_string().contains("store, staff"));
    }
}
