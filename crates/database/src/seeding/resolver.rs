//! Seeder dependency resolution

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DatabaseResult;
use crate::registry::SeederRegistry;

use super::graph::DependencyGraph;
use super::seeder::Seeder;

/// Computes valid execution orders over a snapshot of registered seeders
pub struct SeederResolver {
    seeders: Vec<Arc<dyn Seeder>>,
    by_name: HashMap<String, Arc<dyn Seeder>>,
    graph: DependencyGraph,
}

impl SeederResolver {
    /// Snapshot the registry; fails if two seeders share a name
    pub fn new(registry: &SeederRegistry) -> DatabaseResult<Self> {
        let seeders = registry.all();
        let graph = DependencyGraph::new(
            seeders.iter().map(|s| (s.name().to_string(), s.dependencies())),
        )
        .map_err(|e| {
            tracing::error!(error = %e, "Invalid seeder registration");
            e
        })?;

        let by_name = seeders
            .iter()
            .map(|s| (s.name().to_string(), Arc::clone(s)))
            .collect();

        Ok(Self {
            seeders,
            by_name,
            graph,
        })
    }

    /// Registered seeders, in registration order
    pub fn seeders(&self) -> &[Arc<dyn Seeder>] {
        &self.seeders
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Every seeder, prerequisites first
    pub fn resolve_all(&self) -> DatabaseResult<Vec<Arc<dyn Seeder>>> {
        let order = self.graph.topological_order().map_err(|e| {
            tracing::error!(error = %e, "Failed to resolve seeder order");
            e
        })?;
        tracing::debug!(order = ?order, "Resolved seeder order");
        Ok(self.lookup(order))
    }

    /// `name` and everything it transitively depends on, prerequisites first
    pub fn resolve_for(&self, name: &str) -> DatabaseResult<Vec<Arc<dyn Seeder>>> {
        let order = self.graph.closure_of(name).map_err(|e| {
            tracing::error!(seeder = name, error = %e, "Failed to resolve seeder dependencies");
            e
        })?;
        tracing::debug!(seeder = name, order = ?order, "Resolved seeder closure");
        Ok(self.lookup(order))
    }

    fn lookup(&self, order: Vec<String>) -> Vec<Arc<dyn Seeder>> {
        order
            .iter()
            .filter_map(|name| self.by_name.get(name).cloned())
            .collect()
    }
}
