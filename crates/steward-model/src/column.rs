//! Table and column descriptors, and reflection over them.

use crate::value::Value;

/// Storage class of a persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit floating point.
    Real,
    /// UTF-8 text.
    Text,
    /// Raw bytes.
    Blob,
    /// Boolean, stored as 0/1.
    Boolean,
}

impl ColumnKind {
    /// Returns the SQL type name used in DDL for this kind.
    pub fn sql_type(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// Description of a single persisted column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name; also the attribute name used in JSON mappings.
    pub name: &'static str,
    /// Storage class.
    pub kind: ColumnKind,
    /// Whether the column is part of the identity (primary) key.
    pub primary_key: bool,
    /// Whether the column accepts `NULL`.
    pub nullable: bool,
}

impl Column {
    /// A non-null, non-key column.
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            primary_key: false,
            nullable: false,
        }
    }

    /// Marks the column as part of the identity key.
    pub const fn primary_key(self) -> Self {
        Self {
            primary_key: true,
            ..self
        }
    }

    /// Marks the column as nullable.
    pub const fn nullable(self) -> Self {
        Self {
            nullable: true,
            ..self
        }
    }

    /// Columns whose name starts with `_` are private: they are persisted but
    /// never reflected or serialized.
    pub fn is_private(&self) -> bool {
        self.name.starts_with('_')
    }
}

/// Description of a persisted table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Table {
    /// Table name.
    pub name: &'static str,
    /// All columns, in declaration order.
    pub columns: &'static [Column],
}

impl Table {
    pub const fn new(name: &'static str, columns: &'static [Column]) -> Self {
        Self { name, columns }
    }

    /// Public columns in declaration order.
    pub fn public_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.columns.iter().filter(|c| !c.is_private())
    }

    /// Public primary-key columns in declaration order.
    pub fn identity_columns(&self) -> impl Iterator<Item = &'static Column> {
        self.public_columns().filter(|c| c.primary_key)
    }
}

/// A type persisted as rows of a [`Table`].
pub trait Model {
    /// The table this model maps to.
    fn table() -> &'static Table;

    /// Current value of `column`, or `None` if the model has no such column.
    fn value(&self, column: &str) -> Option<Value>;
}

/// Names of every public column of `M`, in declaration order.
pub fn columns<M: Model>() -> Vec<&'static str> {
    M::table().public_columns().map(|c| c.name).collect()
}

/// Names of the identity (primary-key) columns of `M`, in declaration order.
pub fn identity_columns<M: Model>() -> Vec<&'static str> {
    M::table().identity_columns().map(|c| c.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account;

    static ACCOUNTS: Table = Table::new(
        "accounts",
        &[
            Column::new("tenant", ColumnKind::Text).primary_key(),
            Column::new("number", ColumnKind::Integer).primary_key(),
            Column::new("label", ColumnKind::Text).nullable(),
            Column::new("_row_version", ColumnKind::Integer).primary_key(),
        ],
    );

    impl Model for Account {
        fn table() -> &'static Table {
            &ACCOUNTS
        }

        fn value(&self, _column: &str) -> Option<Value> {
            None
        }
    }

    struct Empty;

    static EMPTY: Table = Table::new("empty", &[]);

    impl Model for Empty {
        fn table() -> &'static Table {
            &EMPTY
        }

        fn value(&self, _column: &str) -> Option<Value> {
            None
        }
    }

    #[test]
    fn columns_skip_private_names_and_keep_order() {
        assert_eq!(columns::<Account>(), vec!["tenant", "number", "label"]);
    }

    #[test]
    fn identity_columns_are_public_primary_keys() {
        assert_eq!(identity_columns::<Account>(), vec!["tenant", "number"]);
    }

    #[test]
    fn model_without_columns_reflects_nothing() {
        assert!(columns::<Empty>().is_empty());
        assert!(identity_columns::<Empty>().is_empty());
    }

    #[test]
    fn builder_flags() {
        let col = Column::new("email", ColumnKind::Text).nullable();
        assert!(col.nullable);
        assert!(!col.primary_key);
        assert_eq!(col.kind.sql_type(), "TEXT");
    }
}
