//! Error types for model (de)serialization.

/// Errors that can occur when building models from JSON mappings.
#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    /// The mapping could not be turned into an instance (unknown or missing
    /// keys, or a value of the wrong type).
    #[error("failed to construct {model} from json: {source}")]
    Construction {
        /// Table name of the model being constructed.
        model: &'static str,
        source: serde_json::Error,
    },

    /// One element of a list failed to construct. `source` is whatever the
    /// model's `from_json` returned for that element.
    #[error("failed to construct element {index} of {model} list: {source}")]
    Element {
        index: usize,
        model: &'static str,
        source: Box<JsonError>,
    },
}
