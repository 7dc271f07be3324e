//! Model descriptions and model mixins for Steward.
//!
//! Every persisted type describes its table up front through the [`Model`]
//! trait: a `'static` [`Table`] listing each [`Column`] with its storage kind
//! and whether it belongs to the identity (primary) key. Everything else in
//! this crate is derived from that description:
//!
//! - **Reflection**: [`columns`] and [`identity_columns`] list the public and
//!   primary-key column names of a model.
//! - **Identity equality**: [`identity_eq`] / [`identity_hash`] compare and
//!   hash instances by their primary-key values only. The [`identity_eq!`]
//!   macro wires them into `PartialEq`, `Eq` and `Hash`.
//! - **JSON mapping**: [`Jsonable`] turns an instance into a column-name keyed
//!   map and builds instances back from such maps. [`JsonModel`] serializes an
//!   instance as that map.
//! - **Registration**: [`ModelRegistry`] is the explicit set of tables the
//!   schema manager creates and drops.
//!
//! # Example
//!
//! ```rust,ignore
//! use serde::Deserialize;
//! use steward_model::{identity_eq, Column, ColumnKind, Jsonable, Model, Table, Value};
//!
//! #[derive(Debug, Clone, Deserialize)]
//! #[serde(deny_unknown_fields)]
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! static USERS: Table = Table::new(
//!     "users",
//!     &[
//!         Column::new("id", ColumnKind::Integer).primary_key(),
//!         Column::new("name", ColumnKind::Text),
//!     ],
//! );
//!
//! impl Model for User {
//!     fn table() -> &'static Table {
//!         &USERS
//!     }
//!
//!     fn value(&self, column: &str) -> Option<Value> {
//!         match column {
//!             "id" => Some(self.id.into()),
//!             "name" => Some(self.name.as_str().into()),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! impl Jsonable for User {}
//! identity_eq!(User);
//! ```

mod column;
mod error;
mod identity;
mod json;
mod registry;
mod value;

pub use column::{columns, identity_columns, Column, ColumnKind, Model, Table};
pub use error::JsonError;
pub use identity::{identity_eq, identity_hash};
pub use json::{JsonModel, Jsonable};
pub use registry::ModelRegistry;
pub use value::Value;
