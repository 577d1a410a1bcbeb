use std::collections::{BTreeMap, HashMap};

use anyhow::anyhow;
use futures::future::{join_all, try_join_all};
use resiter::GetOks;

use crate::aws::ecs::cluster::clusters_for_service;
use crate::aws::ecs::dto::ServiceResponse;
use crate::aws::ecs::task_definition::image_tag;
use crate::aws::ecs::EcsApi;
use crate::error::{RolloutError, StepContext};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescribeOptions {
    pub cluster: Option<String>,
    pub services: Vec<String>,
}

/// Works out which services of which clusters to show.
async fn cluster_members<A: EcsApi + ?Sized>(
    api: &A,
    options: &DescribeOptions,
) -> Result<BTreeMap<String, Vec<String>>, RolloutError> {
    let mut members: BTreeMap<String, Vec<String>> = BTreeMap::new();

    match (&options.cluster, options.services.is_empty()) {
        (Some(cluster), false) => {
            members.insert(cluster.clone(), options.services.clone());
        }
        (None, false) => {
            for service in &options.services {
                for cluster in clusters_for_service(api, service).await? {
                    let services = members.entry(cluster).or_default();
                    if !services.contains(service) {
                        services.push(service.clone());
                    }
                }
            }
        }
        (cluster, true) => {
            let clusters = match cluster {
                Some(cluster) => vec![cluster.clone()],
                None => api.list_clusters().await.step("listing clusters")?,
            };
            for cluster in clusters {
                let services = api.list_services(&cluster).await.step("listing services")?;
                if !services.is_empty() {
                    members.insert(cluster, services);
                }
            }
        }
    }

    Ok(members)
}

/// Image tags of every container in `task_definition`. Lookup failures yield no tags.
async fn tags_for<A: EcsApi + ?Sized>(api: &A, task_definition: String) -> (String, Vec<String>) {
    let tags = match api.describe_task_definition(&task_definition).await {
        Ok(definition) => definition.container_definitions
            .unwrap_or_default()
            .iter()
            .filter_map(|container| container.image.as_deref().and_then(image_tag))
            .map(str::to_owned)
            .collect(),
        Err(err) => {
            warn!("Could not read tags of {}: {:#}", task_definition, err);
            Vec::new()
        }
    };
    (task_definition, tags)
}

/// Rows for every requested service, sorted by cluster then name.
pub async fn describe_services<A: EcsApi + ?Sized>(
    api: &A,
    options: &DescribeOptions,
) -> Result<Vec<ServiceResponse>, RolloutError> {
    let members = cluster_members(api, options).await?;

    let described = try_join_all(members.iter().map(|(cluster, services)| async move {
        api.describe_services(cluster, services)
            .await
            .map(|described| (cluster.clone(), described))
    }))
        .await
        .step("describing services")?;

    let mut rows: Vec<ServiceResponse> = described
        .into_iter()
        .flat_map(|(cluster, services)| {
            services.into_iter().map(move |service| {
                let name = service.service_name.clone();
                ServiceResponse::from_service(&cluster, service)
                    .ok_or_else(|| anyhow!("Service {:?} is missing its name or task definition", name))
            })
        })
        .oks()
        .collect();

    if rows.is_empty() && !options.services.is_empty() {
        return Err(RolloutError::NotFound(options.services.join(", ")));
    }

    let mut task_definitions: Vec<String> = rows.iter().map(|row| row.task_definition.clone()).collect();
    task_definitions.sort();
    task_definitions.dedup();
    let tags: HashMap<String, Vec<String>> = join_all(
        task_definitions.into_iter().map(|task_definition| tags_for(api, task_definition)),
    )
        .await
        .into_iter()
        .collect();

    for row in rows.iter_mut() {
        row.tags = tags.get(&row.task_definition).cloned().unwrap_or_default();
    }
    rows.sort_by(|a, b| (&a.cluster, &a.service_name).cmp(&(&b.cluster, &b.service_name)));
    Ok(rows)
}
