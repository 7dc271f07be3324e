//! JSON mapping for models.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value as JsonValue};

use crate::column::Model;
use crate::error::JsonError;

/// Converts models to and from column-name keyed JSON mappings.
///
/// Opt in with an empty `impl Jsonable for MyModel {}`; every method may be
/// overridden. Construction goes through the model's `Deserialize` impl, so
/// models that must reject unknown keys should carry
/// `#[serde(deny_unknown_fields)]`.
pub trait Jsonable: Model + DeserializeOwned + Sized {
    /// All public columns.
    fn to_json(&self) -> Map<String, JsonValue> {
        self.to_json_excluding(&[])
    }

    /// All public columns except those named in `exclude`.
    fn to_json_excluding(&self, exclude: &[&str]) -> Map<String, JsonValue> {
        Self::table()
            .public_columns()
            .filter(|col| !exclude.contains(&col.name))
            .map(|col| {
                let value = self.value(col.name).unwrap_or(crate::Value::Null);
                (col.name.to_string(), JsonValue::from(value))
            })
            .collect()
    }

    /// Builds one instance from a mapping.
    fn from_json(data: Map<String, JsonValue>) -> Result<Self, JsonError> {
        serde_json::from_value(JsonValue::Object(data)).map_err(|source| {
            JsonError::Construction {
                model: Self::table().name,
                source,
            }
        })
    }

    /// Builds every instance of `data`, in order, through [`Jsonable::from_json`].
    /// Fails on the first element that cannot be constructed, returning
    /// nothing.
    fn from_json_list(data: Vec<Map<String, JsonValue>>) -> Result<Vec<Self>, JsonError> {
        data.into_iter()
            .enumerate()
            .map(|(index, item)| {
                Self::from_json(item).map_err(|source| JsonError::Element {
                    index,
                    model: Self::table().name,
                    source: Box::new(source),
                })
            })
            .collect()
    }
}

/// Serializes a model as its [`Jsonable::to_json`] mapping, so it can be
/// handed straight to anything that takes `Serialize`:
///
/// ```rust,ignore
/// Ok(Json(JsonModel(user)))
/// ```
#[derive(Debug, Clone)]
pub struct JsonModel<M>(pub M);

impl<M: Jsonable> Serialize for JsonModel<M> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.to_json().serialize(serializer)
    }
}

impl<M> From<M> for JsonModel<M> {
    fn from(model: M) -> Self {
        Self(model)
    }
}
