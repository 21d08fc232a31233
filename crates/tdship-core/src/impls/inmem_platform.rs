//! InMemoryPlatform - ContainerPlatform for development and tests.
//!
//! Keeps task definitions and service assignments in a `Mutex`. Every call is
//! appended to a call log so tests can assert on order, and any operation can
//! be scripted to fail for a given family (describe / register) or service
//! (update-service).

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::{TaskDefinition, TaskDefinitionArn};
use crate::ports::{ContainerPlatform, PlatformError, PlatformOperation};

const ARN_PREFIX: &str = "arn:aws:ecs:local:000000000000:task-definition";

/// One recorded platform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Describe {
        family: String,
    },
    Register {
        family: String,
        images: Vec<String>,
    },
    UpdateService {
        cluster: String,
        service: String,
        task_definition: TaskDefinitionArn,
    },
}

#[derive(Default)]
struct State {
    /// family -> (latest revision, raw document without envelope)
    definitions: HashMap<String, (u64, Value)>,
    /// (cluster, service) -> task definition in use
    services: HashMap<(String, String), TaskDefinitionArn>,
    failures: HashSet<(PlatformOperation, String)>,
    calls: Vec<PlatformCall>,
    registered: Vec<TaskDefinition>,
}

/// InMemoryPlatform keeps task definitions and services in process memory.
///
/// `describe_task_definition` returns the stored document wrapped in the
/// `taskDefinition` envelope, with `taskDefinitionArn`, `revision` and
/// `status` added the way the real platform reports them. Each register call
/// bumps the family's revision.
#[derive(Default)]
pub struct InMemoryPlatform {
    state: Mutex<State>,
}

impl InMemoryPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a task definition (raw, without envelope) at revision 1.
    pub fn with_task_definition(self, family: impl Into<String>, document: Value) -> Self {
        self.lock().definitions.insert(family.into(), (1, document));
        self
    }

    /// Make `operation` fail for `key` (the family for describe/register,
    /// the service name for update-service).
    pub fn fail_on(self, operation: PlatformOperation, key: impl Into<String>) -> Self {
        self.lock().failures.insert((operation, key.into()));
        self
    }

    /// Every call made so far, in order (failed calls included).
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.clone()
    }

    /// Documents passed to `register_task_definition`, in call order.
    pub fn registered(&self) -> Vec<TaskDefinition> {
        self.lock().registered.clone()
    }

    /// Task definition a service was last updated to.
    pub fn service_task_definition(&self, cluster: &str, service: &str) -> Option<TaskDefinitionArn> {
        self.lock()
            .services
            .get(&(cluster.to_string(), service.to_string()))
            .cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn check_failure(&self, operation: PlatformOperation, key: &str) -> Result<(), PlatformError> {
        if self.failures.contains(&(operation, key.to_string())) {
            return Err(PlatformError::CallFailed {
                operation,
                message: format!("scripted failure for `{key}`"),
            });
        }
        Ok(())
    }
}

fn arn(family: &str, revision: u64) -> TaskDefinitionArn {
    TaskDefinitionArn::new(format!("{ARN_PREFIX}/{family}:{revision}"))
}

#[async_trait]
impl ContainerPlatform for InMemoryPlatform {
    async fn describe_task_definition(&self, family: &str) -> Result<Value, PlatformError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::Describe {
            family: family.to_string(),
        });

        let operation = PlatformOperation::DescribeTaskDefinition;
        state.check_failure(operation, family)?;

        let (revision, document) =
            state
                .definitions
                .get(family)
                .ok_or_else(|| PlatformError::CallFailed {
                    operation,
                    message: "ClientException: Unable to describe task definition.".to_string(),
                })?;

        // what describe-task-definition adds on top of the registered document
        let mut described = document.clone();
        if let Some(fields) = described.as_object_mut() {
            fields.insert("taskDefinitionArn".to_string(), json!(arn(family, *revision)));
            fields.insert("revision".to_string(), json!(revision));
            fields.insert("status".to_string(), json!("ACTIVE"));
        }

        Ok(json!({ "taskDefinition": described }))
    }

    async fn register_task_definition(
        &self,
        definition: &TaskDefinition,
    ) -> Result<TaskDefinitionArn, PlatformError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::Register {
            family: definition.family.clone(),
            images: definition.images().map(str::to_string).collect(),
        });

        let operation = PlatformOperation::RegisterTaskDefinition;
        state.check_failure(operation, &definition.family)?;

        let document = serde_json::to_value(definition)
            .map_err(|source| PlatformError::Encode { operation, source })?;
        let revision = state
            .definitions
            .get(&definition.family)
            .map_or(1, |(revision, _)| revision + 1);
        state
            .definitions
            .insert(definition.family.clone(), (revision, document));
        state.registered.push(definition.clone());

        Ok(arn(&definition.family, revision))
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        task_definition: &TaskDefinitionArn,
    ) -> Result<(), PlatformError> {
        let mut state = self.lock();
        state.calls.push(PlatformCall::UpdateService {
            cluster: cluster.to_string(),
            service: service.to_string(),
            task_definition: task_definition.clone(),
        });

        state.check_failure(PlatformOperation::UpdateService, service)?;
        state
            .services
            .insert((cluster.to_string(), service.to_string()), task_definition.clone());
        Ok(())
    }
}
