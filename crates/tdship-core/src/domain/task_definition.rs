//! TaskDefinition - the registrable subset of an ECS task definition.
//!
//! A task definition obtained from `describe-task-definition` carries read-only
//! fields assigned by the platform (revision, ARN, status, timestamps, ...).
//! `register-task-definition` rejects those, so before re-registering we keep
//! only an allow-list of keys and retag every container image.
//!
//! # Flow
//! 1. `unwrap_envelope` / `strip_envelope`: `{"taskDefinition": {...}}` -> `{...}`
//! 2. `TaskDefinition::from_raw`: allow-list filter (null optional fields are dropped)
//! 3. `TaskDefinition::retag`: `<repository>:<old>` -> `<repository>:<new>` for every container

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::errors::SanitizeError;
use super::image::{ImageTag, retag_image};

/// Key of the envelope returned by `describe-task-definition`.
pub const ENVELOPE_KEY: &str = "taskDefinition";

/// One container of a task definition.
///
/// Kept as the raw JSON object so that every key keeps its position when the
/// document is written back. Only `image` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerDefinition(pub Map<String, Value>);

impl ContainerDefinition {
    /// The only container key that is rewritten.
    pub const IMAGE_KEY: &'static str = "image";

    /// The container image, if present and a string.
    pub fn image(&self) -> Option<&str> {
        self.0.get(Self::IMAGE_KEY).and_then(Value::as_str)
    }

    /// Rewrite `image` in place; the other keys are not touched.
    ///
    /// `index` is only used to name the field in errors.
    fn retag(&mut self, index: usize, tag: &ImageTag) -> Result<(), SanitizeError> {
        let field = || format!("containerDefinitions[{index}].{}", Self::IMAGE_KEY);
        match self.0.get_mut(Self::IMAGE_KEY) {
            Some(Value::String(image)) => {
                *image = retag_image(image, tag);
                Ok(())
            }
            None | Some(Value::Null) => Err(SanitizeError::missing(field())),
            Some(_) => Err(SanitizeError::NotAString(field())),
        }
    }
}

/// A task definition ready to be handed to `register-task-definition`.
///
/// Optional keys are `Option<Value>`: absent and `null` both map to `None`,
/// and `None` is never serialized. Their values are not type-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub family: String,

    pub container_definitions: Vec<ContainerDefinition>,

    /// Copied as-is; only an absent or `null` value becomes `[]`.
    #[serde(default = "empty_volumes", deserialize_with = "null_as_empty")]
    pub volumes: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_role_arn: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_role_arn: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement_constraints: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_compatibilities: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_platform: Option<Value>,
}

impl TaskDefinition {
    /// Keys that must be present (and non-null) in the raw document.
    pub const REQUIRED_FIELDS: &'static [&'static str] = &["family", "containerDefinitions"];

    /// Keys copied only when present and non-null.
    pub const OPTIONAL_FIELDS: &'static [&'static str] = &[
        "taskRoleArn",
        "executionRoleArn",
        "networkMode",
        "placementConstraints",
        "requiresCompatibilities",
        "cpu",
        "memory",
        "runtimePlatform",
    ];

    /// Every key a sanitized document may contain.
    pub const REGISTRATION_FIELDS: &'static [&'static str] = &[
        "family",
        "containerDefinitions",
        "volumes",
        "taskRoleArn",
        "executionRoleArn",
        "networkMode",
        "placementConstraints",
        "requiresCompatibilities",
        "cpu",
        "memory",
        "runtimePlatform",
    ];

    /// Build a registrable document from a raw one (without envelope).
    ///
    /// The raw document is only borrowed; allowed values are deep-copied.
    pub fn from_raw(raw: &Value) -> Result<Self, SanitizeError> {
        let fields = raw.as_object().ok_or(SanitizeError::NotAnObject)?;

        if let Some(missing) = Self::REQUIRED_FIELDS
            .iter()
            .find(|key| fields.get(**key).is_none_or(Value::is_null))
        {
            return Err(SanitizeError::missing(*missing));
        }

        let allowed: Map<String, Value> = Self::REGISTRATION_FIELDS
            .iter()
            .filter_map(|key| fields.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect();

        serde_json::from_value(Value::Object(allowed)).map_err(SanitizeError::Malformed)
    }

    /// Point every container image at `tag`.
    pub fn retag(&mut self, tag: &ImageTag) -> Result<(), SanitizeError> {
        self.container_definitions
            .iter_mut()
            .enumerate()
            .try_for_each(|(index, container)| container.retag(index, tag))
    }

    /// `from_raw` followed by `retag`.
    pub fn sanitize(raw: &Value, tag: &ImageTag) -> Result<Self, SanitizeError> {
        let mut definition = Self::from_raw(raw)?;
        definition.retag(tag)?;
        Ok(definition)
    }

    /// Container images in container order. Containers without a string
    /// `image` are skipped.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.container_definitions
            .iter()
            .filter_map(ContainerDefinition::image)
    }
}

/// Sanitize a raw task definition and retag all of its container images.
///
/// The tag is validated before the document is looked at.
pub fn sanitize_and_retag(raw: &Value, new_tag: &str) -> Result<TaskDefinition, SanitizeError> {
    let tag = ImageTag::new(new_tag)?;
    TaskDefinition::sanitize(raw, &tag)
}

/// The document under the `taskDefinition` envelope key.
pub fn unwrap_envelope(raw: &Value) -> Result<&Value, SanitizeError> {
    raw.as_object()
        .ok_or(SanitizeError::NotAnObject)?
        .get(ENVELOPE_KEY)
        .filter(|inner| !inner.is_null())
        .ok_or_else(|| SanitizeError::missing(ENVELOPE_KEY))
}

/// Like `unwrap_envelope`, but a document without envelope is returned as-is.
pub fn strip_envelope(raw: &Value) -> &Value {
    unwrap_envelope(raw).unwrap_or(raw)
}

fn empty_volumes() -> Value {
    Value::Array(Vec::new())
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Value, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.unwrap_or_else(empty_volumes))
}
