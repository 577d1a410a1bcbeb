//! In-memory ECS used by the workflow tests.
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Error};
use async_trait::async_trait;
use rusoto_ecs::{
    CreateServiceRequest, Deployment, RegisterTaskDefinitionRequest, Service, TaskDefinition,
    UpdateServiceRequest,
};

use crate::aws::ecs::{name_from_arn, EcsApi};

const ARN_PREFIX: &str = "arn:aws:ecs:us-east-1:000000000000";

#[derive(Default)]
struct State {
    clusters: BTreeMap<String, BTreeMap<String, Service>>,
    task_definitions: BTreeMap<String, TaskDefinition>,
    revisions: HashMap<String, i64>,
    calls: Vec<String>,
}

#[derive(Default)]
pub struct MockEcs {
    state: Mutex<State>,
    failing: Option<&'static str>,
    stalled: bool,
    describe_delay: Option<Duration>,
}

pub fn task_definition_arn(id: &str) -> String {
    format!("{}:task-definition/{}", ARN_PREFIX, id)
}

fn deployment(task_definition: &Option<String>, status: &str) -> Deployment {
    Deployment {
        status: Some(status.to_owned()),
        task_definition: task_definition.clone(),
        ..Default::default()
    }
}

impl MockEcs {
    pub fn new() -> MockEcs {
        MockEcs::default()
    }

    pub fn with_cluster(self, cluster: &str) -> MockEcs {
        self.state.lock().unwrap().clusters.entry(cluster.to_owned()).or_default();
        self
    }

    /// Adds a settled service pointing at task definition `task_definition` (`family:revision`).
    pub fn with_service(self, cluster: &str, service: &str, task_definition: &str, desired: i64) -> MockEcs {
        let task_definition = Some(task_definition_arn(task_definition));
        let described = Service {
            cluster_arn: Some(format!("{}:cluster/{}", ARN_PREFIX, cluster)),
            service_arn: Some(format!("{}:service/{}/{}", ARN_PREFIX, cluster, service)),
            service_name: Some(service.to_owned()),
            status: Some("ACTIVE".to_owned()),
            desired_count: Some(desired),
            running_count: Some(desired),
            pending_count: Some(0),
            deployments: Some(vec![deployment(&task_definition, "PRIMARY")]),
            task_definition,
            ..Default::default()
        };
        self.state.lock().unwrap()
            .clusters
            .entry(cluster.to_owned())
            .or_default()
            .insert(service.to_owned(), described);
        self
    }

    pub fn with_task_definition(self, definition: TaskDefinition) -> MockEcs {
        {
            let mut state = self.state.lock().unwrap();
            let family = definition.family.clone().unwrap_or_default();
            let revision = definition.revision.unwrap_or(1);
            let arn = task_definition_arn(&format!("{}:{}", family, revision));
            let latest = state.revisions.entry(family).or_insert(0);
            *latest = (*latest).max(revision);
            state.task_definitions.insert(arn.clone(), TaskDefinition {
                task_definition_arn: Some(arn),
                revision: Some(revision),
                ..definition
            });
        }
        self
    }

    /// Makes every call of the named operation fail.
    pub fn failing(mut self, operation: &'static str) -> MockEcs {
        self.failing = Some(operation);
        self
    }

    /// Running counts no longer follow desired counts.
    pub fn stalled(mut self) -> MockEcs {
        self.stalled = true;
        self
    }

    /// Every `describe_services` call takes `delay` to answer.
    pub fn slow_describe(mut self, delay: Duration) -> MockEcs {
        self.describe_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change platform state.
    pub fn mutations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| {
                ["register_task_definition", "create_service", "update_service", "delete_service"]
                    .iter()
                    .any(|operation| call.starts_with(operation))
            })
            .collect()
    }

    pub fn service(&self, cluster: &str, service: &str) -> Option<Service> {
        self.state.lock().unwrap()
            .clusters
            .get(cluster)
            .and_then(|services| services.get(service))
            .cloned()
    }

    pub fn task_definition(&self, id: &str) -> Option<TaskDefinition> {
        self.state.lock().unwrap()
            .task_definitions
            .get(&task_definition_arn(name_from_arn(id)))
            .cloned()
    }

    fn record(&self, operation: &'static str, detail: String) -> Result<(), Error> {
        self.state.lock().unwrap().calls.push(format!("{} {}", operation, detail).trim().to_owned());
        if self.failing == Some(operation) {
            return Err(anyhow!("{} failed: ThrottlingException", operation));
        }
        Ok(())
    }
}

#[async_trait]
impl EcsApi for MockEcs {
    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        self.record("list_clusters", String::new())?;
        Ok(self.state.lock().unwrap().clusters.keys().cloned().collect())
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, Error> {
        self.record("list_services", cluster.to_owned())?;
        let state = self.state.lock().unwrap();
        let services = state.clusters
            .get(cluster)
            .ok_or_else(|| anyhow!("ClusterNotFoundException: {}", cluster))?;
        Ok(services.keys().cloned().collect())
    }

    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<Vec<Service>, Error> {
        self.record("describe_services", format!("{} {}", cluster, services.join(",")))?;
        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.state.lock().unwrap();
        let known = state.clusters
            .get(cluster)
            .ok_or_else(|| anyhow!("ClusterNotFoundException: {}", cluster))?;
        Ok(services.iter().filter_map(|name| known.get(name).cloned()).collect())
    }

    async fn describe_task_definition(&self, task_definition: &str) -> Result<TaskDefinition, Error> {
        self.record("describe_task_definition", task_definition.to_owned())?;
        self.task_definition(task_definition)
            .ok_or_else(|| anyhow!("ClientException: Unable to describe task definition {}", task_definition))
    }

    async fn register_task_definition(&self, request: RegisterTaskDefinitionRequest) -> Result<TaskDefinition, Error> {
        self.record("register_task_definition", request.family.clone())?;
        let mut state = self.state.lock().unwrap();
        let revision = {
            let latest = state.revisions.entry(request.family.clone()).or_insert(0);
            *latest += 1;
            *latest
        };
        let arn = task_definition_arn(&format!("{}:{}", request.family, revision));
        let definition = TaskDefinition {
            task_definition_arn: Some(arn.clone()),
            family: Some(request.family),
            revision: Some(revision),
            container_definitions: Some(request.container_definitions),
            cpu: request.cpu,
            memory: request.memory,
            network_mode: request.network_mode,
            requires_compatibilities: request.requires_compatibilities,
            status: Some("ACTIVE".to_owned()),
            ..Default::default()
        };
        state.task_definitions.insert(arn, definition.clone());
        Ok(definition)
    }

    async fn create_service(&self, request: CreateServiceRequest) -> Result<Service, Error> {
        let cluster = request.cluster.clone().unwrap_or_else(|| "default".to_owned());
        self.record("create_service", format!("{} {}", cluster, request.service_name))?;
        let mut state = self.state.lock().unwrap();
        let services = state.clusters
            .get_mut(&cluster)
            .ok_or_else(|| anyhow!("ClusterNotFoundException: {}", cluster))?;
        if services.contains_key(&request.service_name) {
            return Err(anyhow!("InvalidParameterException: Creation of service was not idempotent."));
        }
        let desired = request.desired_count.unwrap_or(0);
        let service = Service {
            cluster_arn: Some(format!("{}:cluster/{}", ARN_PREFIX, cluster)),
            service_arn: Some(format!("{}:service/{}/{}", ARN_PREFIX, cluster, request.service_name)),
            service_name: Some(request.service_name.clone()),
            status: Some("ACTIVE".to_owned()),
            launch_type: request.launch_type,
            desired_count: Some(desired),
            running_count: Some(if self.stalled { 0 } else { desired }),
            pending_count: Some(0),
            deployments: Some(vec![deployment(&request.task_definition, "PRIMARY")]),
            task_definition: request.task_definition,
            ..Default::default()
        };
        services.insert(request.service_name, service.clone());
        Ok(service)
    }

    async fn update_service(&self, request: UpdateServiceRequest) -> Result<Service, Error> {
        let cluster = request.cluster.clone().unwrap_or_else(|| "default".to_owned());
        self.record("update_service", format!("{} {}", cluster, request.service))?;
        let stalled = self.stalled;
        let mut state = self.state.lock().unwrap();
        let service = state.clusters
            .get_mut(&cluster)
            .and_then(|services| services.get_mut(&request.service))
            .ok_or_else(|| anyhow!("ServiceNotFoundException: {}", request.service))?;
        if let Some(task_definition) = request.task_definition {
            service.task_definition = Some(task_definition);
        }
        if let Some(desired) = request.desired_count {
            service.desired_count = Some(desired);
        }
        if stalled {
            let mut deployments = vec![deployment(&service.task_definition, "PRIMARY")];
            deployments.extend(service.deployments.take().unwrap_or_default());
            service.deployments = Some(deployments);
        } else {
            service.running_count = service.desired_count;
            service.deployments = Some(vec![deployment(&service.task_definition, "PRIMARY")]);
        }
        Ok(service.clone())
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), Error> {
        self.record("delete_service", format!("{} {}", cluster, service))?;
        let mut state = self.state.lock().unwrap();
        let services = state.clusters
            .get_mut(cluster)
            .ok_or_else(|| anyhow!("ClusterNotFoundException: {}", cluster))?;
        let desired = services
            .get(service)
            .ok_or_else(|| anyhow!("ServiceNotFoundException: {}", service))?
            .desired_count
            .unwrap_or(0);
        if desired > 0 {
            return Err(anyhow!("InvalidParameterException: The service cannot be stopped while it is scaled above 0."));
        }
        services.remove(service);
        Ok(())
    }
}
