//! Unit registries
//!
//! Applications collect their migrations and seeders into registries while
//! the application boots, then hand the registries to [`Migrator`] and
//! [`SeederManager`]. Registries are ordinary values owned by the composition
//! root; nothing is registered through global state.
//!
//! [`Migrator`]: crate::migrations::Migrator
//! [`SeederManager`]: crate::seeding::SeederManager

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::migrations::Migration;
use crate::seeding::Seeder;

/// Registry of migration units
pub type MigrationRegistry = Registry<Arc<dyn Migration>>;

/// Registry of seed units
pub type SeederRegistry = Registry<Arc<dyn Seeder>>;

/// Append-only, ordered list of registered units
///
/// Registration is not idempotent: registering the same identity twice keeps
/// both entries, and the consumer reports the duplicate when it is built.
pub struct Registry<T> {
    units: RwLock<Vec<T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(Vec::new()),
        }
    }

    /// Append a unit, keeping registration order
    pub fn register(&self, unit: T) -> &Self {
        self.write().push(unit);
        self
    }

    /// Snapshot of every registered unit, in registration order
    pub fn all(&self) -> Vec<T> {
        self.read().clone()
    }

    /// Remove every registered unit
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Writers only push or clear, so a poisoned Vec is still consistent
    fn read(&self) -> RwLockReadGuard<'_, Vec<T>> {
        self.units.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<T>> {
        self.units.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for Registry<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            units: RwLock::new(iter.into_iter().collect()),
        }
    }
}

impl<T: Clone> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("len", &self.len()).finish()
    }
}
