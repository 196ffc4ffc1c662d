//! Unit tests for the schema registry, dependency ordering and DDL rendering.

use rental_seed::schema::{
    rental_schema, render_ddl, render_statements, AttrType, Attribute, EntityDef, EntityKind,
    FkAction, SchemaGraph, SchemaRegistry, SqlDialect,
};
use rental_seed::SeedError;

fn id(name: &str) -> Attribute {
    Attribute::new(name, AttrType::Serial).primary_key()
}

// =============================================================================
// Dependency order
// =============================================================================

#[test]
fn test_every_parent_precedes_its_children() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    assert_eq!(order.len(), 15);

    let position = |kind: EntityKind| order.iter().position(|&k| k == kind).unwrap();
    for edge in registry.edges().iter().filter(|e| !e.deferred) {
        assert!(
            position(edge.parent) < position(edge.child),
            "{} must come before {}",
            edge.parent,
            edge.child
        );
    }
}

#[test]
fn test_deferred_edges_point_backwards() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let position = |kind: EntityKind| order.iter().position(|&k| k == kind).unwrap();

    // Store is seeded before Staff, and Customer before Rental
    for edge in registry.deferred_edges() {
        assert!(position(edge.child) < position(edge.parent));
    }
}

#[test]
fn test_cycle_is_rejected() {
    let registry = SchemaRegistry::new()
        .entity(
            EntityDef::new(EntityKind::Country)
                .attribute(id("country_id"))
                .attribute(
                    Attribute::new("city_id", AttrType::Integer)
                        .not_null()
                        .references(EntityKind::City, "city_id", FkAction::NoAction),
                ),
        )
        .entity(
            EntityDef::new(EntityKind::City)
                .attribute(id("city_id"))
                .attribute(
                    Attribute::new("country_id", AttrType::Integer)
                        .not_null()
                        .references(EntityKind::Country, "country_id", FkAction::NoAction),
                ),
        );

    match registry.dependency_order() {
        Err(SeedError::CyclicSchema { entities }) => {
            assert!(entities.contains(&"country".to_string()));
            assert!(entities.contains(&"city".to_string()));
        }
        other => panic!("expected CyclicSchema, got {:?}", other),
    }
}

#[test]
fn test_deferring_one_edge_breaks_the_cycle() {
    let registry = SchemaRegistry::new()
        .entity(
            EntityDef::new(EntityKind::Country)
                .attribute(id("country_id"))
                .attribute(
                    Attribute::new("city_id", AttrType::Integer)
                        .references(EntityKind::City, "city_id", FkAction::NoAction)
                        .deferred(),
                ),
        )
        .entity(
            EntityDef::new(EntityKind::City)
                .attribute(id("city_id"))
                .attribute(
                    Attribute::new("country_id", AttrType::Integer)
                        .not_null()
                        .references(EntityKind::Country, "country_id", FkAction::NoAction),
                ),
        );

    assert_eq!(
        registry.dependency_order().unwrap(),
        vec![EntityKind::Country, EntityKind::City]
    );
}

#[test]
fn test_unregistered_target_is_invalid() {
    let registry = SchemaRegistry::new().entity(
        EntityDef::new(EntityKind::City)
            .attribute(id("city_id"))
            .attribute(
                Attribute::new("country_id", AttrType::Integer)
                    .not_null()
                    .references(EntityKind::Country, "country_id", FkAction::NoAction),
            ),
    );

    let err = registry.dependency_order().unwrap_err();
    assert!(matches!(err, SeedError::InvalidSchema(_)));
    assert!(err.to_string().contains("country"));
}

#[test]
fn test_graph_cascade_and_roots() {
    let graph = SchemaGraph::from_registry(&rental_schema());
    assert_eq!(
        graph.cascade_children(EntityKind::Category),
        vec![EntityKind::FilmCategory]
    );
    let roots = graph.root_entities();
    assert!(roots.contains(&EntityKind::Country));
    assert!(roots.contains(&EntityKind::Actor));
    assert!(!roots.contains(&EntityKind::Store));
}

// =============================================================================
// Model shape
// =============================================================================

#[test]
fn test_junction_entities_have_composite_keys() {
    let registry = rental_schema();
    for kind in [EntityKind::FilmCategory, EntityKind::FilmActor] {
        let def = registry.get(kind).unwrap();
        assert!(def.is_junction());
        assert_eq!(def.primary_key().len(), 2);
        assert!(!def.has_attribute("last_update"));
    }
}

#[test]
fn test_non_junction_entities_carry_last_update() {
    let registry = rental_schema();
    for def in registry.iter().filter(|d| !d.is_junction()) {
        let attr = def
            .get_attribute("last_update")
            .unwrap_or_else(|| panic!("{} has no last_update", def.kind));
        assert!(attr.default_now);
        assert!(attr.not_null);
    }
}

#[test]
fn test_deferred_references_are_nullable() {
    let registry = rental_schema();
    let store = registry.get(EntityKind::Store).unwrap();
    let manager = store.get_attribute("manager_staff_id").unwrap();
    assert!(!manager.not_null);
    assert!(manager.foreign_key.as_ref().unwrap().deferred);

    let customer = registry.get(EntityKind::Customer).unwrap();
    assert!(!customer.get_attribute("last_rental_id").unwrap().not_null);
}

// =============================================================================
// DDL
// =============================================================================

#[test]
fn test_ddl_for_every_dialect_creates_every_table() {
    let registry = rental_schema();
    for dialect in [
        SqlDialect::MySql,
        SqlDialect::Postgres,
        SqlDialect::Sqlite,
        SqlDialect::DuckDb,
    ] {
        let ddl = render_ddl(&registry, dialect).unwrap();
        for kind in EntityKind::ALL {
            let quoted = dialect.quote(kind.table_name());
            assert!(
                ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {}", quoted)),
                "{} missing from {} DDL",
                kind,
                dialect
            );
        }
    }
}

#[test]
fn test_mysql_quotes_reserved_column() {
    let ddl = render_ddl(&rental_schema(), SqlDialect::MySql).unwrap();
    assert!(ddl.contains("`fulltext`"));
}

#[test]
fn test_postgres_adds_deferred_constraints_last() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let statements = render_statements(&registry, SqlDialect::Postgres, &order).unwrap();

    let last_create = statements
        .iter()
        .rposition(|s| s.starts_with("CREATE TABLE"))
        .unwrap();
    let alters: Vec<usize> = statements
        .iter()
        .enumerate()
        .filter(|(_, s)| s.contains("ADD CONSTRAINT"))
        .map(|(i, _)| i)
        .collect();

    assert_eq!(alters.len(), 2);
    assert!(alters.iter().all(|&i| i > last_create));
    assert!(statements.iter().all(|s| !s.starts_with("ALTER TABLE")));
}

#[test]
fn test_mysql_deferred_constraints_run_as_prepared_statements() {
    let registry = rental_schema();
    let order = registry.dependency_order().unwrap();
    let statements = render_statements(&registry, SqlDialect::MySql, &order).unwrap();

    let guards: Vec<usize> = statements
        .iter()
        .enumerate()
        .filter(|(_, s)| s.starts_with("SET @fk_sql"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(guards.len(), 2);

    for i in guards {
        assert!(statements[i].contains("ADD CONSTRAINT"));
        assert_eq!(statements[i + 1], "PREPARE fk_stmt FROM @fk_sql");
        assert_eq!(statements[i + 2], "EXECUTE fk_stmt");
        assert_eq!(statements[i + 3], "DEALLOCATE PREPARE fk_stmt");
    }
}
