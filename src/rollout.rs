//! The operator-facing ECS workflows: create, start, stop, update and delete.
//!
//! Each workflow is a short pipeline of cluster resolution, an optional task
//! definition registration, one service mutation and an optional stability
//! wait. The first failing step ends the workflow and nothing already applied
//! is undone.
use std::fmt;
use std::time::Duration;

use rusoto_ecs::Service;

use crate::aws::ecs::cluster::{clusters_for_service, resolve};
use crate::aws::ecs::service;
use crate::aws::ecs::stable::{wait_stable, Stability};
use crate::aws::ecs::task_definition::{
    self, check_tags, parse_environment, task_definition_id, ContainerSpec, SizeProfile,
};
use crate::aws::ecs::EcsApi;
use crate::error::{RolloutError, StepContext};

const DEFAULT_DESIRED_COUNT: i64 = 1;

/// Options shared by every workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct RolloutOptions {
    pub cluster: Option<String>,
    pub desired_count: Option<i64>,
    pub wait_for_stable: bool,
    pub stability: Stability,
}

impl Default for RolloutOptions {
    fn default() -> Self {
        RolloutOptions {
            cluster: None,
            desired_count: None,
            wait_for_stable: false,
            stability: Stability {
                timeout: Duration::from_secs(300),
                interval: Duration::from_secs(15),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOptions {
    pub service: String,
    pub size: String,
    pub port: u16,
    pub image: String,
    /// Raw `key=value` pairs.
    pub environment: Vec<String>,
    /// Existing task definition to run instead of registering a new one.
    pub task_definition: Option<String>,
    /// Cluster to create in when `--cluster` is not given.
    pub default_cluster: String,
    pub rollout: RolloutOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub service: String,
    /// Tags given as positional arguments.
    pub tags: Vec<String>,
    /// Tags given with `--docker-tags`.
    pub docker_tags: Vec<String>,
    pub rollout: RolloutOptions,
}

/// What a workflow left a service at.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    pub cluster: String,
    pub service: String,
    pub task_definition: String,
    pub desired_count: i64,
    /// Whether stability was waited for and confirmed.
    pub stable: bool,
}

impl Rollout {
    /// A rollout whose stability has not been confirmed yet.
    fn new(cluster: &str, service: &str, task_definition: &str, desired_count: i64) -> Rollout {
        Rollout {
            cluster: cluster.to_owned(),
            service: service.to_owned(),
            task_definition: task_definition_id(task_definition).to_owned(),
            desired_count,
            stable: false,
        }
    }
}

impl fmt::Display for Rollout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} running {} with desired count {}",
            self.cluster, self.service, self.task_definition, self.desired_count
        )
    }
}

/// Outcome of a workflow over several services, processed in order until
/// the first failure.
#[derive(Debug, Default)]
pub struct Batch {
    pub completed: Vec<Rollout>,
    pub error: Option<RolloutError>,
}

impl Batch {
    fn record(&mut self, result: Result<Rollout, RolloutError>) -> bool {
        match result {
            Ok(rollout) => {
                self.completed.push(rollout);
                true
            }
            Err(err) => {
                self.error = Some(err);
                false
            }
        }
    }

    pub fn into_result(self) -> Result<Vec<Rollout>, RolloutError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.completed),
        }
    }
}

/// Waits for `rollout` when asked to, marking it stable once confirmed.
async fn settle<A: EcsApi + ?Sized>(api: &A, mut rollout: Rollout, options: &RolloutOptions) -> Result<Rollout, RolloutError> {
    if options.wait_for_stable {
        wait_stable(api, &rollout, options.stability).await?;
        rollout.stable = true;
    }
    Ok(rollout)
}

enum Definition {
    Existing(String),
    Fresh(ContainerSpec),
}

fn desired_count_of(service: &Service) -> i64 {
    service.desired_count.unwrap_or_default()
}

/// Creates a service that must not exist yet.
pub async fn create<A: EcsApi + ?Sized>(api: &A, options: &CreateOptions) -> Result<Rollout, RolloutError> {
    let name = options.service.as_str();
    let definition = match &options.task_definition {
        Some(_) if !options.environment.is_empty() => {
            return Err(RolloutError::InputConflict(
                "environment cannot be set on an existing --task-definition".to_owned(),
            ))
        }
        Some(task_definition) => {
            warn!("Running existing task definition {}, size, port and image are ignored", task_definition);
            Definition::Existing(task_definition.clone())
        }
        None => Definition::Fresh(ContainerSpec {
            name: name.to_owned(),
            image: options.image.clone(),
            size: options.size.parse::<SizeProfile>()?,
            port: options.port,
            environment: parse_environment(&options.environment)?,
        }),
    };

    let (cluster, existing) = match &options.rollout.cluster {
        Some(cluster) => {
            let found = api
                .describe_services(cluster, &[name.to_owned()])
                .await
                .step("describing services")?;
            let existing = if found.is_empty() { Vec::new() } else { vec![cluster.clone()] };
            (cluster.clone(), existing)
        }
        None => (options.default_cluster.clone(), clusters_for_service(api, name).await?),
    };
    if !existing.is_empty() {
        return Err(RolloutError::AlreadyExists {
            service: name.to_owned(),
            clusters: existing,
        });
    }

    let task_definition = match definition {
        Definition::Existing(task_definition) => task_definition,
        Definition::Fresh(spec) => task_definition::register(api, task_definition::build_fresh(&spec)).await?,
    };

    let desired_count = options.rollout.desired_count.unwrap_or(DEFAULT_DESIRED_COUNT);
    service::create(api, &cluster, name, &task_definition, desired_count).await?;
    settle(api, Rollout::new(&cluster, name, &task_definition, desired_count), &options.rollout).await
}

async fn start_one<A: EcsApi + ?Sized>(api: &A, name: &str, options: &RolloutOptions) -> Result<Rollout, RolloutError> {
    let cluster = resolve(api, name, options.cluster.as_deref()).await?;
    let current = service::describe(api, &cluster, name).await?;
    let task_definition = service::current_task_definition(&current)?;
    let desired_count = options.desired_count.unwrap_or_else(|| match desired_count_of(&current) {
        0 => DEFAULT_DESIRED_COUNT,
        count => count,
    });

    service::update(api, &cluster, name, &task_definition, desired_count).await?;
    settle(api, Rollout::new(&cluster, name, &task_definition, desired_count), options).await
}

/// Scales services back up on their current task definition.
///
/// Without `--desired-count` the current count is kept unless it is zero,
/// in which case a single task is started.
pub async fn start<A: EcsApi + ?Sized>(api: &A, services: &[String], options: &RolloutOptions) -> Batch {
    let mut batch = Batch::default();
    for name in services {
        if !batch.record(start_one(api, name, options).await) {
            break;
        }
    }
    batch
}

async fn stop_one<A: EcsApi + ?Sized>(api: &A, name: &str, options: &RolloutOptions) -> Result<Rollout, RolloutError> {
    let cluster = resolve(api, name, options.cluster.as_deref()).await?;
    let current = service::describe(api, &cluster, name).await?;
    let task_definition = service::current_task_definition(&current)?;

    service::stop(api, &cluster, name, &task_definition).await?;
    settle(api, Rollout::new(&cluster, name, &task_definition, 0), options).await
}

/// Scales services to zero, keeping them registered.
pub async fn stop<A: EcsApi + ?Sized>(api: &A, services: &[String], options: &RolloutOptions) -> Batch {
    let mut batch = Batch::default();
    for name in services {
        if !batch.record(stop_one(api, name, options).await) {
            break;
        }
    }
    batch
}

/// Rolls a new task definition revision out to the service, re-tagging its
/// container images when tags are given.
pub async fn update<A: EcsApi + ?Sized>(api: &A, options: &UpdateOptions) -> Result<Rollout, RolloutError> {
    let tags = match (options.tags.is_empty(), options.docker_tags.is_empty()) {
        (false, false) => {
            return Err(RolloutError::InputConflict(
                "docker tags were given both as arguments and with --docker-tags".to_owned(),
            ))
        }
        (false, true) => &options.tags,
        (true, _) => &options.docker_tags,
    };
    check_tags(tags)?;
    let name = options.service.as_str();

    let cluster = resolve(api, name, options.rollout.cluster.as_deref()).await?;
    let current = service::describe(api, &cluster, name).await?;
    let desired_count = options.rollout.desired_count.unwrap_or_else(|| desired_count_of(&current));

    let previous = api
        .describe_task_definition(&service::current_task_definition(&current)?)
        .await
        .step("describing task definition")?;
    let request = task_definition::retag(&previous, tags)?;
    let task_definition = task_definition::register(api, request).await?;

    service::update(api, &cluster, name, &task_definition, desired_count).await?;
    settle(api, Rollout::new(&cluster, name, &task_definition, desired_count), &options.rollout).await
}

/// Drains the service to zero, waits for the drain regardless of
/// `wait_for_stable`, then deletes it.
pub async fn delete<A: EcsApi + ?Sized>(api: &A, name: &str, options: &RolloutOptions) -> Result<Rollout, RolloutError> {
    let cluster = resolve(api, name, options.cluster.as_deref()).await?;
    let current = service::describe(api, &cluster, name).await?;
    let task_definition = service::current_task_definition(&current)?;

    service::stop(api, &cluster, name, &task_definition).await?;
    let mut drained = Rollout::new(&cluster, name, &task_definition, 0);
    wait_stable(api, &drained, options.stability).await?;
    service::remove(api, &cluster, name).await?;
    drained.stable = true;
    Ok(drained)
}
