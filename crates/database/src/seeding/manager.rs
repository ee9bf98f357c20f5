//! Seeder manager for running multiple seeders

use std::sync::Arc;

use serde::Serialize;

use crate::backends::DatabasePool;
use crate::config::SeedConfig;
use crate::error::{DatabaseError, DatabaseResult};
use crate::migrations::runner::abort;
use crate::registry::SeederRegistry;

use super::resolver::SeederResolver;
use super::seeder::Seeder;

/// A seeder that failed during a best-effort run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedFailure {
    pub name: String,
    pub error: String,
}

/// Result of running seeders
#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedRunResult {
    /// Seeders that ran and committed, in execution order
    pub executed: Vec<String>,
    /// Seeders that failed and were rolled back (best-effort mode only)
    pub failed: Vec<SeedFailure>,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

impl SeedRunResult {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One seeder in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeederListEntry {
    pub name: String,
    pub dependencies: Vec<String>,
}

/// Seeders in run order, or registration order when resolution fails
#[derive(Debug, Clone, Serialize)]
pub struct SeederListing {
    pub entries: Vec<SeederListEntry>,
    /// `false` when the entries fell back to registration order
    pub resolved: bool,
    pub warning: Option<String>,
}

/// Runs registered seeders in dependency order
pub struct SeederManager {
    pool: Arc<dyn DatabasePool>,
    resolver: SeederResolver,
    config: SeedConfig,
}

impl SeederManager {
    pub fn new(
        pool: Arc<dyn DatabasePool>,
        registry: &SeederRegistry,
        config: SeedConfig,
    ) -> DatabaseResult<Self> {
        Ok(Self {
            pool,
            resolver: SeederResolver::new(registry)?,
            config,
        })
    }

    pub fn resolver(&self) -> &SeederResolver {
        &self.resolver
    }

    pub fn config(&self) -> &SeedConfig {
        &self.config
    }

    /// Run every seeder, or only `name` and its prerequisites
    ///
    /// Nothing runs if the order cannot be resolved. Seeders that depend on
    /// `name` are never run by a targeted call.
    pub async fn run_seeders(&self, name: Option<&str>) -> DatabaseResult<SeedRunResult> {
        let start_time = std::time::Instant::now();

        let seeders = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => self.resolver.resolve_for(name)?,
            None => self.resolver.resolve_all()?,
        };

        if seeders.is_empty() {
            tracing::info!("No seeders registered");
        } else {
            tracing::info!(count = seeders.len(), fail_fast = self.config.fail_fast, "Running seeders");
        }

        let mut result = SeedRunResult::default();
        for seeder in &seeders {
            match self.run_seeder(seeder.as_ref()).await {
                Ok(()) => result.executed.push(seeder.name().to_string()),
                Err(err) if self.config.fail_fast => return Err(err),
                Err(err) => {
                    tracing::warn!(seeder = seeder.name(), "Continuing after failed seeder");
                    result.failed.push(SeedFailure {
                        name: seeder.name().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        result.execution_time_ms = start_time.elapsed().as_millis();
        if result.is_success() {
            tracing::info!(executed = result.executed.len(), "Seeding completed");
        } else {
            tracing::warn!(
                executed = result.executed.len(),
                failed = result.failed.len(),
                "Seeding completed with failures"
            );
        }
        Ok(result)
    }

    /// Seeders with their declared dependencies, in the order they would run
    pub fn list_seeders(&self) -> SeederListing {
        let entry = |seeder: &Arc<dyn Seeder>| SeederListEntry {
            name: seeder.name().to_string(),
            dependencies: seeder.dependencies(),
        };

        match self.resolver.resolve_all() {
            Ok(order) => SeederListing {
                entries: order.iter().map(entry).collect(),
                resolved: true,
                warning: None,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Seeder order unresolved, listing in registration order");
                SeederListing {
                    entries: self.resolver.seeders().iter().map(entry).collect(),
                    resolved: false,
                    warning: Some(e.to_string()),
                }
            }
        }
    }

    /// Run one seeder in its own transaction
    async fn run_seeder(&self, seeder: &dyn Seeder) -> DatabaseResult<()> {
        let name = seeder.name();
        tracing::info!(seeder = name, "Running seeder");

        let mut tx = self.pool.begin_transaction().await.map_err(|e| {
            tracing::error!(seeder = name, error = %e, "Failed to start seeder transaction");
            DatabaseError::execution(name, e)
        })?;

        if let Err(e) = seeder.run(tx.as_mut()).await {
            return Err(abort(tx, DatabaseError::execution(name, e)).await);
        }

        tx.commit().await.map_err(|e| {
            let err = DatabaseError::execution(name, e);
            tracing::error!(seeder = name, error = %err, "Seeder commit failed");
            err
        })?;

        tracing::info!(seeder = name, "Seeded");
        Ok(())
    }
}
