//! Deployer - roll services onto a new image tag.
//!
//! # Flow (per service, strictly in order)
//! 1. ContainerPlatform::describe_task_definition
//! 2. TaskDefinition::sanitize (allow-list + retag)
//! 3. ContainerPlatform::register_task_definition -> new ARN
//! 4. ContainerPlatform::update_service(cluster, service, ARN)
//!
//! A failure at any step abandons that service only; the batch moves on to
//! the next one. There is no retry and no rollback.

use thiserror::Error;
use tracing::Instrument;

use crate::domain::{
    DeployRunId, SanitizeError, ServiceTarget, TaskDefinition, TaskDefinitionArn, unwrap_envelope,
};
use crate::ports::{ContainerPlatform, PlatformError, RunIdGenerator, SystemClock, UlidGenerator};

/// DeployStage names the step at which a service deploy stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStage {
    Describe,
    Sanitize,
    Register,
    UpdateService,
}

/// DeployError aborts the deploy of a single service.
///
/// Each variant wraps the error of the step that failed; `stage()` names it.
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("fetching current task definition failed: {0}")]
    Describe(#[source] PlatformError),

    #[error("task definition cannot be re-registered: {0}")]
    Sanitize(#[source] SanitizeError),

    #[error("registering new task definition failed: {0}")]
    Register(#[source] PlatformError),

    #[error("updating service failed: {0}")]
    UpdateService(#[source] PlatformError),
}

impl DeployError {
    /// The step that failed.
    pub fn stage(&self) -> DeployStage {
        match self {
            Self::Describe(_) => DeployStage::Describe,
            Self::Sanitize(_) => DeployStage::Sanitize,
            Self::Register(_) => DeployStage::Register,
            Self::UpdateService(_) => DeployStage::UpdateService,
        }
    }
}

/// ServiceOutcome pairs a target with what happened to it.
///
/// `Ok` holds the ARN of the newly registered revision the service now runs.
#[derive(Debug)]
pub struct ServiceOutcome {
    pub target: ServiceTarget,
    pub result: Result<TaskDefinitionArn, DeployError>,
}

/// Result of one `deploy_all` call; outcomes are in input order.
#[derive(Debug)]
pub struct DeployReport {
    pub run_id: DeployRunId,
    pub outcomes: Vec<ServiceOutcome>,
}

impl DeployReport {
    /// Outcomes that reached update-service, in input order.
    pub fn succeeded(&self) -> impl Iterator<Item = &ServiceOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_ok())
    }

    /// Outcomes that stopped at some stage, in input order.
    pub fn failed(&self) -> impl Iterator<Item = &ServiceOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Deployer rolls services onto a new image tag through a ContainerPlatform.
///
/// # Flow
/// 1. `deploy_all` generates one DeployRunId for the batch
/// 2. `deploy_one` runs describe -> sanitize -> register -> update-service
/// 3. Failures are logged and recorded; the next target still runs
///
/// # Concurrency
/// Targets are deployed one at a time. A service's calls never interleave with
/// another service's calls.
pub struct Deployer<P> {
    platform: P,
    ids: Box<dyn RunIdGenerator>,
}

impl<P: ContainerPlatform> Deployer<P> {
    /// Deployer with a ULID run id generator on the system clock.
    pub fn new(platform: P) -> Self {
        Self {
            platform,
            ids: Box::new(UlidGenerator::new(SystemClock)),
        }
    }

    pub fn with_id_generator(mut self, ids: impl RunIdGenerator + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// The platform, e.g. to inspect an InMemoryPlatform after a run.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Deploy every target in order. Never stops early.
    pub async fn deploy_all(&self, targets: &[ServiceTarget]) -> DeployReport {
        let run_id = self.ids.generate_run_id();
        let span = tracing::info_span!("deploy_run", %run_id, services = targets.len());

        let outcomes = async {
            let mut outcomes = Vec::with_capacity(targets.len());
            for target in targets {
                let result = self.deploy_one(target).await;
                if let Err(err) = &result {
                    tracing::error!(
                        service = %target.service,
                        stage = ?err.stage(),
                        error = %err,
                        "deploy failed, continuing with next service"
                    );
                }
                outcomes.push(ServiceOutcome {
                    target: target.clone(),
                    result,
                });
            }
            outcomes
        }
        .instrument(span)
        .await;

        DeployReport { run_id, outcomes }
    }

    /// describe -> sanitize -> register -> update-service for one target.
    #[tracing::instrument(
        skip_all,
        name = "deploy_service",
        fields(service = %target.service, cluster = %target.cluster, tag = %target.tag)
    )]
    pub async fn deploy_one(&self, target: &ServiceTarget) -> Result<TaskDefinitionArn, DeployError> {
        let described = self
            .platform
            .describe_task_definition(&target.family)
            .await
            .map_err(DeployError::Describe)?;

        let raw = unwrap_envelope(&described).map_err(DeployError::Sanitize)?;
        let definition = TaskDefinition::sanitize(raw, &target.tag).map_err(DeployError::Sanitize)?;

        let arn = self
            .platform
            .register_task_definition(&definition)
            .await
            .map_err(DeployError::Register)?;
        tracing::info!(task_definition = %arn, "registered new task definition");

        self.platform
            .update_service(&target.cluster, &target.service, &arn)
            .await
            .map_err(DeployError::UpdateService)?;
        tracing::info!(task_definition = %arn, "service updated");

        Ok(arn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ImageTag;
    use crate::impls::{InMemoryPlatform, PlatformCall};
    use crate::ports::{FixedClock, PlatformOperation};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn document(family: &str, image: &str) -> Value {
        json!({
            "family": family,
            "containerDefinitions": [{"name": family, "image": image}],
            "networkMode": "awsvpc",
            "cpu": null
        })
    }

    fn platform() -> InMemoryPlatform {
        InMemoryPlatform::new()
            .with_task_definition("svc-a", document("svc-a", "registry/svc-a:old"))
            .with_task_definition("svc-b", document("svc-b", "registry/svc-b:old"))
    }

    fn targets(tag: &str) -> Vec<ServiceTarget> {
        let tag = ImageTag::new(tag).unwrap();
        vec![
            ServiceTarget::new("svc-a", tag.clone()),
            ServiceTarget::new("svc-b", tag),
        ]
    }

    fn registered_images(platform: &InMemoryPlatform) -> Vec<Vec<String>> {
        platform
            .registered()
            .iter()
            .map(|definition| definition.images().map(str::to_string).collect())
            .collect()
    }

    #[tokio::test]
    async fn deploys_every_service_in_order() {
        let deployer = Deployer::new(platform());

        let report = deployer.deploy_all(&targets("abc123")).await;

        assert!(report.all_succeeded());
        let services: Vec<&str> = report
            .outcomes
            .iter()
            .map(|outcome| outcome.target.service.as_str())
            .collect();
        assert_eq!(services, vec!["svc-a", "svc-b"]);

        let platform = deployer.platform();
        assert_eq!(
            registered_images(platform),
            vec![vec!["registry/svc-a:abc123".to_string()], vec!["registry/svc-b:abc123".to_string()]]
        );
        assert!(platform.service_task_definition("svc-a", "svc-a").is_some());
        assert!(platform.service_task_definition("svc-b", "svc-b").is_some());
    }

    #[tokio::test]
    async fn calls_are_strictly_sequenced() {
        let deployer = Deployer::new(platform());
        deployer.deploy_all(&targets("9")).await;

        let kinds: Vec<(&str, String)> = deployer
            .platform()
            .calls()
            .into_iter()
            .map(|call| match call {
                PlatformCall::Describe { family } => ("describe", family),
                PlatformCall::Register { family, .. } => ("register", family),
                PlatformCall::UpdateService { service, .. } => ("update", service),
            })
            .collect();

        assert_eq!(
            kinds,
            vec![
                ("describe", "svc-a".to_string()),
                ("register", "svc-a".to_string()),
                ("update", "svc-a".to_string()),
                ("describe", "svc-b".to_string()),
                ("register", "svc-b".to_string()),
                ("update", "svc-b".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn failed_fetch_does_not_stop_next_service() {
        let deployer = Deployer::new(
            platform().fail_on(PlatformOperation::DescribeTaskDefinition, "svc-a"),
        );

        let report = deployer.deploy_all(&targets("abc123")).await;

        assert!(!report.all_succeeded());
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].target.service, "svc-a");
        assert_eq!(
            failed[0].result.as_ref().unwrap_err().stage(),
            DeployStage::Describe
        );

        let succeeded: Vec<_> = report.succeeded().collect();
        assert_eq!(succeeded.len(), 1);
        assert_eq!(succeeded[0].target.service, "svc-b");

        // nothing was registered for svc-a
        assert_eq!(
            registered_images(deployer.platform()),
            vec![vec!["registry/svc-b:abc123".to_string()]]
        );
    }

    #[rstest]
    #[case::describe(PlatformOperation::DescribeTaskDefinition, DeployStage::Describe, 1)]
    #[case::register(PlatformOperation::RegisterTaskDefinition, DeployStage::Register, 2)]
    #[case::update(PlatformOperation::UpdateService, DeployStage::UpdateService, 3)]
    #[tokio::test]
    async fn failure_stops_at_failing_stage(
        #[case] operation: PlatformOperation,
        #[case] stage: DeployStage,
        #[case] calls_for_first_service: usize,
    ) {
        let deployer = Deployer::new(platform().fail_on(operation, "svc-a"));

        let report = deployer.deploy_all(&targets("1")).await;

        let err = report.outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(err.stage(), stage);
        assert!(report.outcomes[1].result.is_ok());
        // svc-b always makes its three calls
        assert_eq!(deployer.platform().calls().len(), calls_for_first_service + 3);
    }

    #[tokio::test]
    async fn unsanitizable_definition_fails_only_that_service() {
        let platform = platform()
            .with_task_definition("svc-a", json!({"containerDefinitions": [{"image": "a:1"}]}));
        let deployer = Deployer::new(platform);

        let report = deployer.deploy_all(&targets("2")).await;

        let err = report.outcomes[0].result.as_ref().unwrap_err();
        assert_eq!(err.stage(), DeployStage::Sanitize);
        assert!(matches!(err, DeployError::Sanitize(SanitizeError::MissingField(field)) if field == "family"));
        assert!(report.outcomes[1].result.is_ok());
    }

    #[tokio::test]
    async fn registered_document_is_clean() {
        let deployer = Deployer::new(platform());
        let target = ServiceTarget::new("svc-a", ImageTag::new("7").unwrap());

        deployer.deploy_one(&target).await.unwrap();

        let registered = serde_json::to_value(&deployer.platform().registered()[0]).unwrap();
        assert_eq!(
            registered,
            json!({
                "family": "svc-a",
                "containerDefinitions": [{"name": "svc-a", "image": "registry/svc-a:7"}],
                "volumes": [],
                "networkMode": "awsvpc"
            })
        );
    }

    #[tokio::test]
    async fn custom_cluster_and_family_are_used() {
        let platform = InMemoryPlatform::new()
            .with_task_definition("backend-td", document("backend-td", "registry/backend:old"));
        let deployer = Deployer::new(platform);
        let target = ServiceTarget::new("backend", ImageTag::new("3").unwrap())
            .with_cluster("parrot-dev")
            .with_family("backend-td");

        let arn = deployer.deploy_one(&target).await.unwrap();

        assert_eq!(
            deployer.platform().service_task_definition("parrot-dev", "backend"),
            Some(arn)
        );
    }

    #[tokio::test]
    async fn report_carries_generated_run_id() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 12, 58, 0).unwrap();
        let deployer = Deployer::new(platform()).with_id_generator(UlidGenerator::new(FixedClock::new(at)));

        let report = deployer.deploy_all(&[]).await;

        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
        assert_eq!(report.run_id.as_ulid().timestamp_ms(), at.timestamp_millis() as u64);
    }
}
