//! AwsCliPlatform - ContainerPlatform backed by the `aws` command line tool.
//!
//! Every call runs `aws ecs <subcommand> ... --output json`, waits for it to
//! exit and captures stdout/stderr. A non-zero exit status is reported with
//! the tool's stderr text; nothing is retried.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;

use crate::domain::{TaskDefinition, TaskDefinitionArn};
use crate::ports::{ContainerPlatform, PlatformError, PlatformOperation};

const DEFAULT_AWS_BIN: &str = "aws";

/// How to invoke the CLI. Mirrors the `[aws]` table of the deploy config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsCliSettings {
    /// Path or name of the `aws` binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
}

impl AwsCliSettings {
    /// The configured binary, or `aws` from `PATH`.
    pub fn bin(&self) -> PathBuf {
        self.bin
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AWS_BIN))
    }
}

/// AwsCliPlatform implements ContainerPlatform by running the `aws` CLI.
///
/// # Implementation
/// - One child process per call, spawned with `tokio::process::Command`
/// - `AWS_PAGER` is cleared so the CLI never waits on a pager
/// - The register request is passed inline as `--cli-input-json`
/// - Region and profile flags are only added when configured
pub struct AwsCliPlatform {
    settings: AwsCliSettings,
}

impl AwsCliPlatform {
    pub fn new(settings: AwsCliSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &AwsCliSettings {
        &self.settings
    }

    fn ecs_args<I, S>(&self, subcommand: &str, args: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out = vec!["ecs".to_string(), subcommand.to_string()];
        out.extend(args.into_iter().map(Into::into));
        out.extend(["--output".to_string(), "json".to_string()]);
        if let Some(region) = &self.settings.region {
            out.extend(["--region".to_string(), region.clone()]);
        }
        if let Some(profile) = &self.settings.profile {
            out.extend(["--profile".to_string(), profile.clone()]);
        }
        out
    }

    fn describe_args(&self, family: &str) -> Vec<String> {
        self.ecs_args("describe-task-definition", ["--task-definition", family])
    }

    fn register_args(&self, definition_json: &str) -> Vec<String> {
        self.ecs_args("register-task-definition", ["--cli-input-json", definition_json])
    }

    fn update_service_args(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionArn,
    ) -> Vec<String> {
        self.ecs_args(
            "update-service",
            [
                "--cluster",
                cluster,
                "--service",
                service,
                "--task-definition",
                task_definition.as_str(),
            ],
        )
    }

    async fn run<I, S>(&self, operation: PlatformOperation, args: I) -> Result<Vec<u8>, PlatformError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.settings.bin();
        let started = Instant::now();

        let output = Command::new(&program)
            .args(args)
            // the v2 CLI pipes output through a pager by default
            .env("AWS_PAGER", "")
            .output()
            .await
            .map_err(|source| PlatformError::Spawn {
                operation,
                program: program.display().to_string(),
                source,
            })?;

        tracing::debug!(
            %operation,
            duration = ?started.elapsed(),
            status = %output.status,
            "executed aws cli"
        );

        if !output.status.success() {
            return Err(PlatformError::CallFailed {
                operation,
                message: failure_message(&output.stderr, &output.status),
            });
        }

        Ok(output.stdout)
    }
}

fn failure_message(stderr: &[u8], status: &std::process::ExitStatus) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("aws exited with {status}")
    } else {
        stderr.to_string()
    }
}

fn parse_json(operation: PlatformOperation, stdout: &[u8]) -> Result<Value, PlatformError> {
    serde_json::from_slice(stdout).map_err(|source| PlatformError::Decode { operation, source })
}

/// Extract `taskDefinition.taskDefinitionArn` from a register response.
fn parse_register_response(stdout: &[u8]) -> Result<TaskDefinitionArn, PlatformError> {
    let operation = PlatformOperation::RegisterTaskDefinition;
    let response = parse_json(operation, stdout)?;
    response
        .pointer("/taskDefinition/taskDefinitionArn")
        .and_then(Value::as_str)
        .map(TaskDefinitionArn::new)
        .ok_or(PlatformError::MissingResponseField {
            operation,
            field: "taskDefinition.taskDefinitionArn",
        })
}

#[async_trait]
impl ContainerPlatform for AwsCliPlatform {
    #[tracing::instrument(skip_all, name = "describe_task_definition", fields(family = %family))]
    async fn describe_task_definition(&self, family: &str) -> Result<Value, PlatformError> {
        let operation = PlatformOperation::DescribeTaskDefinition;
        let stdout = self.run(operation, self.describe_args(family)).await?;
        parse_json(operation, &stdout)
    }

    #[tracing::instrument(skip_all, name = "register_task_definition", fields(family = %definition.family))]
    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<TaskDefinitionArn, PlatformError> {
        let operation = PlatformOperation::RegisterTaskDefinition;
        let definition_json = serde_json::to_string(definition)
            .map_err(|source| PlatformError::Encode { operation, source })?;
        let stdout = self.run(operation, self.register_args(&definition_json)).await?;
        parse_register_response(&stdout)
    }

    #[tracing::instrument(skip_all, name = "update_service", fields(cluster = %cluster, service = %service))]
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionArn,
    ) -> Result<(), PlatformError> {
        let args = self.update_service_args(cluster, service, task_definition);
        self.run(PlatformOperation::UpdateService, args).await?;
        Ok(())
    }
}
