use rusoto_ecs::{CreateServiceRequest, Service, UpdateServiceRequest};

use crate::aws::ecs::EcsApi;
use crate::error::{RolloutError, StepContext};

const LAUNCH_TYPE_EC2: &str = "EC2";

/// Current description of `service` in `cluster`, or `NotFound`.
pub async fn describe<A: EcsApi + ?Sized>(api: &A, cluster: &str, service: &str) -> Result<Service, RolloutError> {
    let mut services = api
        .describe_services(cluster, &[service.to_owned()])
        .await
        .step("describing services")?;
    if services.is_empty() {
        return Err(RolloutError::NotFound(service.to_owned()));
    }
    Ok(services.remove(0))
}

/// Task definition arn the service currently runs.
pub fn current_task_definition(service: &Service) -> Result<String, RolloutError> {
    service.task_definition.clone().ok_or_else(|| RolloutError::Api {
        step: "describing services",
        source: anyhow::anyhow!("service {:?} has no task definition", service.service_name),
    })
}

/// Registers a new service on provisioned (EC2) capacity.
pub async fn create<A: EcsApi + ?Sized>(
    api: &A,
    cluster: &str,
    service: &str,
    task_definition: &str,
    desired_count: i64,
) -> Result<Service, RolloutError> {
    info!("Creating service {} in {} with {} x {}", service, cluster, desired_count, task_definition);
    api.create_service(CreateServiceRequest {
        cluster: Some(cluster.to_owned()),
        service_name: service.to_owned(),
        task_definition: Some(task_definition.to_owned()),
        desired_count: Some(desired_count),
        launch_type: Some(LAUNCH_TYPE_EC2.to_owned()),
        ..Default::default()
    })
        .await
        .step("creating service")
}

/// Points the service at `task_definition` with `desired_count` tasks.
pub async fn update<A: EcsApi + ?Sized>(
    api: &A,
    cluster: &str,
    service: &str,
    task_definition: &str,
    desired_count: i64,
) -> Result<Service, RolloutError> {
    info!("Updating service {} in {} to {} x {}", service, cluster, desired_count, task_definition);
    api.update_service(UpdateServiceRequest {
        cluster: Some(cluster.to_owned()),
        service: service.to_owned(),
        task_definition: Some(task_definition.to_owned()),
        desired_count: Some(desired_count),
        ..Default::default()
    })
        .await
        .step("updating service")
}

/// Scales the service to zero without removing it.
pub async fn stop<A: EcsApi + ?Sized>(api: &A, cluster: &str, service: &str, task_definition: &str) -> Result<Service, RolloutError> {
    update(api, cluster, service, task_definition, 0)
        .await
        .map_err(|err| match err {
            RolloutError::Api { source, .. } => RolloutError::Api {
                step: "updating service with desired count of 0",
                source,
            },
            err => err,
        })
}

/// Removes a service that has already been drained.
pub async fn remove<A: EcsApi + ?Sized>(api: &A, cluster: &str, service: &str) -> Result<(), RolloutError> {
    info!("Deleting service {} in {}", service, cluster);
    api.delete_service(cluster, service).await.step("deleting service")
}
