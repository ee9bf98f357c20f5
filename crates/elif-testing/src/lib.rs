//! # elif-testing - Test Support for elif.rs Migrations and Seeders
//!
//! - **Test database**: [`TestDatabase`] is an in-memory SQLite database
//!   behind the engine's transactional pool, with failure injection and
//!   statement journals
//! - **Recording units**: migrations and seeders that journal every call
//! - **Clocks**: deterministic ledger timestamps
//!
//! ```rust,no_run
//! use elif_testing::prelude::*;
//!
//! # async fn example() -> elif_testing::TestResult<()> {
//! let db = TestDatabase::new().await?;
//! let journal = CallJournal::new();
//! let migrations = MigrationRegistry::new();
//! migrations.register(RecordingMigration::new("2024_01_01_000000", &journal).into_arc());
//!
//! let migrator = Migrator::new(db.pool(), &migrations, MigrationConfig::default())?;
//! migrator.run_migrations().await?;
//! assert_eq!(db.count("elif_migrations").await?, 1);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod units;
pub mod utils;

// Re-export commonly used types
pub use database::{TestDatabase, TestTransaction};
pub use units::{CallJournal, RecordingMigration, RecordingSeeder};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        database::TestDatabase,
        units::{CallJournal, RecordingMigration, RecordingSeeder},
        utils,
    };

    pub use elif_database::{
        MigrationConfig, MigrationRegistry, Migrator, RollbackCount, SeedConfig, SeederManager,
        SeederRegistry,
    };
}

// Error handling
#[derive(thiserror::Error, Debug)]
pub enum TestError {
    #[error("Database error: {0}")]
    Database(#[from] elif_database::DatabaseError),

    #[error("Invalid failure pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type TestResult<T> = Result<T, TestError>;
