//! Explicit registry of model tables.

use crate::column::{Model, Table};

/// The set of tables known to the schema manager.
///
/// Models are registered explicitly, so the set never depends on which
/// modules happened to be loaded first. Tables keep registration order;
/// creation follows it and dropping reverses it.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    tables: Vec<&'static Table>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the table of `M`. Registering the same table name again is a
    /// no-op.
    pub fn register<M: Model>(&mut self) -> &mut Self {
        self.register_table(M::table())
    }

    /// Registers a table description directly.
    pub fn register_table(&mut self, table: &'static Table) -> &mut Self {
        if self.contains(table.name) {
            tracing::debug!(table = table.name, "table already registered, skipping");
        } else {
            tracing::debug!(table = table.name, "registered model table");
            self.tables.push(table);
        }
        self
    }

    /// Returns `true` if a table with this name has been registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    /// Registered tables in registration order.
    pub fn tables(&self) -> impl DoubleEndedIterator<Item = &'static Table> + '_ {
        self.tables.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
