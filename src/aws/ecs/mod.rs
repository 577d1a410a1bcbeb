use std::sync::Arc;

use anyhow::{anyhow, Error};
use async_trait::async_trait;
use rusoto_core::Region;
use rusoto_credential::{DefaultCredentialsProvider, StaticProvider};
use rusoto_ecs::{
    CreateServiceRequest, DeleteServiceRequest, DescribeServicesRequest,
    DescribeTaskDefinitionRequest, Ecs, EcsClient, ListClustersRequest, ListServicesRequest,
    RegisterTaskDefinitionRequest, Service, TaskDefinition, UpdateServiceRequest,
};

use crate::aws::client::HttpClient;
use crate::aws::credentials::{match_rusoto_errors, Credentials};

pub mod cluster;
pub mod describe;
pub mod dto;
#[cfg(test)]
pub mod mock;
pub mod service;
pub mod stable;
pub mod task_definition;

/// Maximum number of services a single DescribeServices call accepts.
const DESCRIBE_SERVICES_BATCH: usize = 10;

/// The ECS control plane calls the workflows depend on.
#[async_trait]
pub trait EcsApi: Send + Sync {
    /// Names of every cluster in the account and region.
    async fn list_clusters(&self) -> Result<Vec<String>, Error>;

    /// Names of every service in `cluster`.
    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, Error>;

    /// Active services among `services`. Unknown or inactive names are left out.
    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<Vec<Service>, Error>;

    async fn describe_task_definition(&self, task_definition: &str) -> Result<TaskDefinition, Error>;

    async fn register_task_definition(&self, request: RegisterTaskDefinitionRequest) -> Result<TaskDefinition, Error>;

    async fn create_service(&self, request: CreateServiceRequest) -> Result<Service, Error>;

    async fn update_service(&self, request: UpdateServiceRequest) -> Result<Service, Error>;

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), Error>;
}

pub fn build_ecs_client(client: Arc<HttpClient>, region: Region, creds: Option<Credentials>) -> Result<EcsClient, Error> {
    match creds {
        Some(creds) => {
            let cred_provider: StaticProvider = creds.into_provider();
            Ok(EcsClient::new_with(client, cred_provider, region))
        }
        None => {
            let cred_provider = DefaultCredentialsProvider::new()
                .map_err(|err| anyhow!("Failed to build the default aws credentials chain: {}", err))?;
            Ok(EcsClient::new_with(client, cred_provider, region))
        }
    }
}

/// Last path segment of an ECS arn, e.g. the cluster or service name.
pub fn name_from_arn(arn: &str) -> &str {
    match arn.rfind('/') {
        Some(ix) => &arn[ix + 1..],
        None => arn,
    }
}

/// Whether the service description denotes a live service.
pub fn is_active(service: &Service) -> bool {
    service.status.as_deref().map_or(true, |status| status != "INACTIVE")
}

#[async_trait]
impl EcsApi for EcsClient {
    async fn list_clusters(&self) -> Result<Vec<String>, Error> {
        let mut clusters = Vec::new();
        let mut next_token = None;
        loop {
            let response = Ecs::list_clusters(self, ListClustersRequest {
                max_results: None,
                next_token,
            })
                .await
                .map_err(match_rusoto_errors)?;
            clusters.extend(
                response.cluster_arns.unwrap_or_default()
                    .iter()
                    .map(|arn| name_from_arn(arn).to_owned()),
            );
            next_token = response.next_token;
            if next_token.is_none() {
                break;
            }
        }
        debug!("Listed clusters {:?}", clusters);
        Ok(clusters)
    }

    async fn list_services(&self, cluster: &str) -> Result<Vec<String>, Error> {
        let mut services = Vec::new();
        let mut next_token = None;
        loop {
            let response = Ecs::list_services(self, ListServicesRequest {
                cluster: Some(cluster.to_owned()),
                next_token,
                ..Default::default()
            })
                .await
                .map_err(match_rusoto_errors)?;
            services.extend(
                response.service_arns.unwrap_or_default()
                    .iter()
                    .map(|arn| name_from_arn(arn).to_owned()),
            );
            next_token = response.next_token;
            if next_token.is_none() {
                break;
            }
        }
        debug!("Listed services of cluster {}: {:?}", cluster, services);
        Ok(services)
    }

    async fn describe_services(&self, cluster: &str, services: &[String]) -> Result<Vec<Service>, Error> {
        let mut described = Vec::new();
        for batch in services.chunks(DESCRIBE_SERVICES_BATCH) {
            let response = Ecs::describe_services(self, DescribeServicesRequest {
                cluster: Some(cluster.to_owned()),
                include: None,
                services: batch.to_vec(),
            })
                .await
                .map_err(match_rusoto_errors)?;
            for failure in response.failures.unwrap_or_default() {
                debug!("Describe services failure in {}: {:?} {:?}", cluster, failure.arn, failure.reason);
            }
            described.extend(response.services.unwrap_or_default().into_iter().filter(is_active));
        }
        Ok(described)
    }

    async fn describe_task_definition(&self, task_definition: &str) -> Result<TaskDefinition, Error> {
        let response = Ecs::describe_task_definition(self, DescribeTaskDefinitionRequest {
            include: None,
            task_definition: task_definition.to_owned(),
        })
            .await
            .map_err(match_rusoto_errors)?;
        response.task_definition
            .ok_or_else(|| anyhow!("Task definition {} missing from response", task_definition))
    }

    async fn register_task_definition(&self, request: RegisterTaskDefinitionRequest) -> Result<TaskDefinition, Error> {
        let family = request.family.clone();
        let response = Ecs::register_task_definition(self, request)
            .await
            .map_err(match_rusoto_errors)?;
        response.task_definition
            .ok_or_else(|| anyhow!("Registered task definition for {} missing from response", family))
    }

    async fn create_service(&self, request: CreateServiceRequest) -> Result<Service, Error> {
        let name = request.service_name.clone();
        let response = Ecs::create_service(self, request)
            .await
            .map_err(match_rusoto_errors)?;
        response.service
            .ok_or_else(|| anyhow!("Created service {} missing from response", name))
    }

    async fn update_service(&self, request: UpdateServiceRequest) -> Result<Service, Error> {
        let name = request.service.clone();
        let response = Ecs::update_service(self, request)
            .await
            .map_err(match_rusoto_errors)?;
        response.service
            .ok_or_else(|| anyhow!("Updated service {} missing from response", name))
    }

    async fn delete_service(&self, cluster: &str, service: &str) -> Result<(), Error> {
        Ecs::delete_service(self, DeleteServiceRequest {
            cluster: Some(cluster.to_owned()),
            force: None,
            service: service.to_owned(),
        })
            .await
            .map_err(match_rusoto_errors)?;
        Ok(())
    }
}
