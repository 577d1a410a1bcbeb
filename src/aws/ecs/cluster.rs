use crate::aws::ecs::EcsApi;
use crate::error::{RolloutError, StepContext};

/// Every cluster hosting a service named exactly `service`, sorted by name.
pub async fn clusters_for_service<A: EcsApi + ?Sized>(api: &A, service: &str) -> Result<Vec<String>, RolloutError> {
    let mut clusters = Vec::new();
    for cluster in api.list_clusters().await.step("listing clusters")? {
        let services = api.list_services(&cluster).await.step("listing services")?;
        if services.iter().any(|name| name == service) {
            clusters.push(cluster);
        }
    }
    clusters.sort();
    clusters.dedup();
    debug!("Service {} found in clusters {:?}", service, clusters);
    Ok(clusters)
}

/// Picks the single cluster hosting `service`.
///
/// An explicit cluster is returned unchanged. Otherwise exactly one cluster
/// must host the service: none is `NotFound`, several is `AmbiguousCluster`
/// carrying all candidates so the operator can choose.
pub async fn resolve<A: EcsApi + ?Sized>(
    api: &A,
    service: &str,
    explicit_cluster: Option<&str>,
) -> Result<String, RolloutError> {
    if let Some(cluster) = explicit_cluster {
        return Ok(cluster.to_owned());
    }

    let mut clusters = clusters_for_service(api, service).await?;
    match clusters.len() {
        0 => Err(RolloutError::NotFound(service.to_owned())),
        1 => Ok(clusters.remove(0)),
        _ => Err(RolloutError::AmbiguousCluster {
            service: service.to_owned(),
            clusters,
        }),
    }
}
