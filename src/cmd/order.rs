//! Order command - print the insertion order of the schema.

use anyhow::Result;
use rental_seed::schema::{rental_schema, EntityKind};
use serde::Serialize;

#[derive(Serialize)]
struct OrderOutput {
    order: Vec<EntityKind>,
    deferred: Vec<DeferredOutput>,
}

#[derive(Serialize)]
struct DeferredOutput {
    entity: EntityKind,
    attribute: String,
    references: EntityKind,
}

pub fn run(json: bool) -> Result<()> {
    let registry = rental_schema();
    let order = registry.dependency_order()?;
    let deferred: Vec<DeferredOutput> = registry
        .deferred_edges()
        .into_iter()
        .map(|edge| DeferredOutput {
            entity: edge.child,
            attribute: edge.attribute,
            references: edge.parent,
        })
        .collect();

    if json {
        let output = OrderOutput { order, deferred };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let edges = registry.edges();
    println!("Dependency order ({} tables):", order.len());
    for (i, kind) in order.iter().enumerate() {
        let mut parents: Vec<String> = edges
            .iter()
            .filter(|e| e.child == *kind && !e.deferred)
            .map(|e| e.parent.to_string())
            .collect();
        parents.dedup();
        if parents.is_empty() {
            println!("  {:>2}. {}", i + 1, kind);
        } else {
            println!("  {:>2}. {} <- {}", i + 1, kind, parents.join(", "));
        }
    }

    if !deferred.is_empty() {
        println!("\nDeferred references (patched after both ends exist):");
        for edge in &deferred {
            println!("  {}.{} -> {}", edge.entity, edge.attribute, edge.references);
        }
    }
    Ok(())
}
