//! Migrations and seeders that record what the engine does with them
//!
//! Every call is appended to a shared [`CallJournal`] as `up:<version>`,
//! `down:<version>` or `seed:<name>`, so a test can assert exactly which
//! units ran and in what order.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use elif_database::backends::DatabaseTransaction;
use elif_database::error::{DatabaseError, DatabaseResult};
use elif_database::migrations::sql::execute_script;
use elif_database::migrations::Migration;
use elif_database::seeding::Seeder;

/// Ordered log of unit invocations, shared between units
#[derive(Debug, Clone, Default)]
pub struct CallJournal {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Calls starting with `prefix`, with the prefix removed
    pub fn calls_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix(prefix).map(str::to_string))
            .collect()
    }

    pub fn clear(&self) {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

fn injected(unit: &str, operation: &str) -> DatabaseError {
    DatabaseError::Query(format!("{} of {} failed on purpose", operation, unit))
}

/// Migration that journals its calls and optionally runs SQL or fails
#[derive(Debug, Clone)]
pub struct RecordingMigration {
    version: String,
    description: String,
    up_sql: String,
    down_sql: String,
    fail_up: bool,
    fail_down: bool,
    journal: CallJournal,
}

impl RecordingMigration {
    pub fn new(version: impl Into<String>, journal: &CallJournal) -> Self {
        let version = version.into();
        Self {
            description: format!("migration {}", version),
            version,
            up_sql: String::new(),
            down_sql: String::new(),
            fail_up: false,
            fail_down: false,
            journal: journal.clone(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// SQL run by `up` before it returns (or fails)
    pub fn up_sql(mut self, sql: impl Into<String>) -> Self {
        self.up_sql = sql.into();
        self
    }

    /// SQL run by `down` before it returns (or fails)
    pub fn down_sql(mut self, sql: impl Into<String>) -> Self {
        self.down_sql = sql.into();
        self
    }

    pub fn failing_up(mut self) -> Self {
        self.fail_up = true;
        self
    }

    pub fn failing_down(mut self) -> Self {
        self.fail_down = true;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Migration> {
        Arc::new(self)
    }
}

#[async_trait]
impl Migration for RecordingMigration {
    fn version(&self) -> &str {
        &self.version
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn up(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()> {
        self.journal.record(format!("up:{}", self.version));
        execute_script(tx, &self.up_sql).await?;
        if self.fail_up {
            return Err(injected(&self.version, "up"));
        }
        Ok(())
    }

    async fn down(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()> {
        self.journal.record(format!("down:{}", self.version));
        execute_script(tx, &self.down_sql).await?;
        if self.fail_down {
            return Err(injected(&self.version, "down"));
        }
        Ok(())
    }
}

/// Seeder that journals its runs and optionally runs SQL or fails
#[derive(Debug, Clone)]
pub struct RecordingSeeder {
    name: String,
    dependencies: Vec<String>,
    sql: String,
    fail: bool,
    journal: CallJournal,
}

impl RecordingSeeder {
    pub fn new(name: impl Into<String>, journal: &CallJournal) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            sql: String::new(),
            fail: false,
            journal: journal.clone(),
        }
    }

    pub fn depends_on<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = sql.into();
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Seeder> {
        Arc::new(self)
    }
}

#[async_trait]
impl Seeder for RecordingSeeder {
    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> Vec<String> {
        self.dependencies.clone()
    }

    async fn run(&self, tx: &mut dyn DatabaseTransaction) -> DatabaseResult<()> {
        self.journal.record(format!("seed:{}", self.name));
        execute_script(tx, &self.sql).await?;
        if self.fail {
            return Err(injected(&self.name, "seed"));
        }
        Ok(())
    }
}
