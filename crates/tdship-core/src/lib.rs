//! tdship-core
//!
//! Building blocks for re-tagging and re-deploying ECS task definitions.
//!
//! # Modules
//! - **domain**: task definitions, image tags, deploy targets, ids
//! - **ports**: traits over the outside world (ContainerPlatform, Clock, RunIdGenerator)
//! - **impls**: AwsCliPlatform (production), InMemoryPlatform (development / tests)
//! - **app**: file retag and the deploy orchestrator
//! - **config**: deploy configuration file

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

pub use self::domain::{ImageTag, SanitizeError, TaskDefinition, sanitize_and_retag};
