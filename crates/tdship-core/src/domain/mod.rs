//! Domain model (task definitions, image tags, deploy targets, ids).

pub mod errors;
pub mod ids;
pub mod image;
pub mod target;
pub mod task_definition;

pub use self::errors::SanitizeError;
pub use self::ids::{DeployRunId, TaskDefinitionArn};
pub use self::image::{ImageTag, retag_image};
pub use self::target::ServiceTarget;
pub use self::task_definition::{
    ContainerDefinition, TaskDefinition, sanitize_and_retag, strip_envelope, unwrap_envelope,
};
