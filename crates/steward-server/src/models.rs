//! Models served by the application.

use serde::Deserialize;
use steward_model::{identity_eq, Column, ColumnKind, Jsonable, Model, ModelRegistry, Table, Value};

/// A registered user.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

static USERS: Table = Table::new(
    "users",
    &[
        Column::new("id", ColumnKind::Integer).primary_key(),
        Column::new("name", ColumnKind::Text),
        Column::new("email", ColumnKind::Text).nullable(),
    ],
);

impl Model for User {
    fn table() -> &'static Table {
        &USERS
    }

    fn value(&self, column: &str) -> Option<Value> {
        match column {
            "id" => Some(self.id.into()),
            "name" => Some(self.name.as_str().into()),
            "email" => Some(self.email.clone().into()),
            _ => None,
        }
    }
}

impl Jsonable for User {}
identity_eq!(User);

/// Every model whose table the application manages.
pub fn models() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register::<User>();
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_are_registered() {
        let registry = models();
        assert!(registry.contains("users"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn users_with_the_same_id_are_equal() {
        let a = User {
            id: 7,
            name: "Ada".to_string(),
            email: None,
        };
        let b = User {
            id: 7,
            name: "Ada Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
        };
        assert_eq!(a, b);
    }
}
