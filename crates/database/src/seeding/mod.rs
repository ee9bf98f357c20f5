//! Database Seeding
//!
//! Seeders declare the seeders they depend on; the manager runs them in an
//! order where every dependency runs first.

pub mod graph;
pub mod manager;
pub mod resolver;
pub mod seeder;

pub use graph::DependencyGraph;
pub use manager::{SeedFailure, SeedRunResult, SeederListEntry, SeederListing, SeederManager};
pub use resolver::SeederResolver;
pub use seeder::{Seeder, SqlSeeder};
