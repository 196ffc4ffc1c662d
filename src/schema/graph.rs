//! Entity dependency graph for FK-aware seeding.
//!
//! Provides:
//! - Dependency graph construction from registry FK edges
//! - Stable topological sorting (ties broken by declaration order)
//! - Cycle detection, with deferred edges excluded from the ordering

use super::{EntityKind, FkAction, SchemaRegistry};
use std::collections::{BTreeSet, VecDeque};

/// Dependency graph built from non-deferred foreign key relationships.
///
/// Node indices follow the registry's declaration order.
#[derive(Debug)]
pub struct SchemaGraph {
    /// Entity per node index
    pub kinds: Vec<EntityKind>,
    /// For each entity, the entities it references
    pub parents: Vec<Vec<usize>>,
    /// For each entity, the entities referencing it
    pub children: Vec<Vec<usize>>,
    /// For each entity, children whose rows go away with it
    cascades: Vec<Vec<usize>>,
}

/// Result of topological sort
#[derive(Debug)]
pub struct TopoSortResult {
    /// Entities in dependency order (parents before children)
    pub order: Vec<EntityKind>,
    /// Entities on or behind a cycle (could not be ordered)
    pub cyclic: Vec<EntityKind>,
}

impl SchemaGraph {
    /// Build a dependency graph from a registry
    pub fn from_registry(registry: &SchemaRegistry) -> Self {
        let kinds = registry.kinds();
        let n = kinds.len();
        let mut parents: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut cascades: Vec<Vec<usize>> = vec![Vec::new(); n];

        for edge in registry.edges() {
            let (Some(child), Some(parent)) =
                (registry.position(edge.child), registry.position(edge.parent))
            else {
                continue;
            };

            if edge.on_delete == FkAction::Cascade && !cascades[parent].contains(&child) {
                cascades[parent].push(child);
            }

            if edge.deferred {
                continue;
            }

            // Self references stay in the graph and surface as cycles
            if !parents[child].contains(&parent) {
                parents[child].push(parent);
            }
            if !children[parent].contains(&child) {
                children[parent].push(child);
            }
        }

        Self {
            kinds,
            parents,
            children,
            cascades,
        }
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    fn index_of(&self, kind: EntityKind) -> Option<usize> {
        self.kinds.iter().position(|&k| k == kind)
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Ready entities are released lowest declaration index first, so an
    /// already-ordered registry comes back unchanged.
    pub fn topo_sort(&self) -> TopoSortResult {
        let n = self.len();
        let mut in_degree: Vec<usize> = self.parents.iter().map(|p| p.len()).collect();

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| i)
            .collect();

        let mut order = Vec::with_capacity(n);

        while let Some(idx) = ready.pop_first() {
            order.push(self.kinds[idx]);

            for &child in &self.children[idx] {
                in_degree[child] -= 1;
                if in_degree[child] == 0 {
                    ready.insert(child);
                }
            }
        }

        let cyclic = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg > 0)
            .map(|(i, _)| self.kinds[i])
            .collect();

        TopoSortResult { order, cyclic }
    }

    /// Check if `ancestor` is referenced by `descendant`, directly or transitively
    pub fn is_ancestor(&self, ancestor: EntityKind, descendant: EntityKind) -> bool {
        ancestor != descendant && self.ancestors(descendant).contains(&ancestor)
    }

    /// Entities a given entity depends on, directly or transitively
    pub fn ancestors(&self, kind: EntityKind) -> Vec<EntityKind> {
        self.walk(kind, &self.parents)
    }

    /// Entities depending on a given entity, directly or transitively
    pub fn descendants(&self, kind: EntityKind) -> Vec<EntityKind> {
        self.walk(kind, &self.children)
    }

    /// Entities whose rows are removed when a row of `kind` is deleted
    pub fn cascade_children(&self, kind: EntityKind) -> Vec<EntityKind> {
        self.walk(kind, &self.cascades)
    }

    fn walk(&self, kind: EntityKind, adjacency: &[Vec<usize>]) -> Vec<EntityKind> {
        let Some(start) = self.index_of(kind) else {
            return Vec::new();
        };

        let mut found = Vec::new();
        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::new();

        for &next in &adjacency[start] {
            if !visited[next] {
                visited[next] = true;
                queue.push_back(next);
            }
        }

        while let Some(current) = queue.pop_front() {
            found.push(self.kinds[current]);
            for &next in &adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }

        found
    }

    /// Entities with no dependencies
    pub fn root_entities(&self) -> Vec<EntityKind> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parents)| parents.is_empty())
            .map(|(i, _)| self.kinds[i])
            .collect()
    }

    /// Entities nothing depends on
    pub fn leaf_entities(&self) -> Vec<EntityKind> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, children)| children.is_empty())
            .map(|(i, _)| self.kinds[i])
            .collect()
    }
}
