//! Errors - transform-local error types.

use thiserror::Error;

/// SanitizeError aborts the transform of a single task definition.
///
/// # Kinds
/// - MissingField: a required key is absent (or null)
/// - InvalidTag: the replacement tag is empty
/// - NotAString: a container `image` is present but is not a string
/// - NotAnObject / Malformed: the document cannot be mapped onto a task definition at all
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("invalid image tag {0:?}: tag must not be empty")]
    InvalidTag(String),

    #[error("field `{0}` must be a string")]
    NotAString(String),

    #[error("task definition document must be a JSON object")]
    NotAnObject,

    #[error("malformed task definition: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl SanitizeError {
    pub(crate) fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }
}
