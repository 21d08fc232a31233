//! ContainerPlatform port - the container orchestration service.
//!
//! The deploy orchestrator only needs three operations from the platform.
//! Everything behind them (scheduling, rollout, health checks) is opaque.
//!
//! # Implementations
//! - `AwsCliPlatform`: shells out to the `aws` CLI
//! - `InMemoryPlatform`: development / tests

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::domain::{TaskDefinition, TaskDefinitionArn};

/// The three platform calls, used to label failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOperation {
    DescribeTaskDefinition,
    RegisterTaskDefinition,
    UpdateService,
}

impl PlatformOperation {
    /// Name of the matching `aws ecs` subcommand.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DescribeTaskDefinition => "describe-task-definition",
            Self::RegisterTaskDefinition => "register-task-definition",
            Self::UpdateService => "update-service",
        }
    }
}

impl fmt::Display for PlatformOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed external call. No retry is attempted by callers.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{operation}: failed to run `{program}`: {source}")]
    Spawn {
        operation: PlatformOperation,
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The call ran and reported failure; `message` is the tool's error text.
    #[error("{operation} failed: {message}")]
    CallFailed {
        operation: PlatformOperation,
        message: String,
    },

    #[error("{operation}: failed to encode request: {source}")]
    Encode {
        operation: PlatformOperation,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} returned a response that is not valid JSON: {source}")]
    Decode {
        operation: PlatformOperation,
        #[source]
        source: serde_json::Error,
    },

    #[error("{operation} response has no `{field}`")]
    MissingResponseField {
        operation: PlatformOperation,
        field: &'static str,
    },
}

impl PlatformError {
    pub fn operation(&self) -> PlatformOperation {
        match self {
            Self::Spawn { operation, .. }
            | Self::CallFailed { operation, .. }
            | Self::Encode { operation, .. }
            | Self::Decode { operation, .. }
            | Self::MissingResponseField { operation, .. } => *operation,
        }
    }
}

/// ContainerPlatform is called strictly sequentially; implementations do not
/// need to support overlapping calls but must be `Send + Sync` so they can be
/// held across `.await`.
#[async_trait]
pub trait ContainerPlatform: Send + Sync {
    /// Current task definition of `family`, still inside its
    /// `{"taskDefinition": ...}` envelope.
    async fn describe_task_definition(&self, family: &str) -> Result<Value, PlatformError>;

    /// Register `definition` as a new revision and return its ARN.
    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<TaskDefinitionArn, PlatformError>;

    /// Point `service` in `cluster` at `task_definition`.
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionArn,
    ) -> Result<(), PlatformError>;
}
