use std::time::{Duration, Instant};

use rusoto_ecs::Service;

use crate::aws::ecs::service::describe;
use crate::aws::ecs::EcsApi;
use crate::error::RolloutError;
use crate::rollout::Rollout;

/// How long to wait for a service to settle and how often to look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stability {
    pub timeout: Duration,
    pub interval: Duration,
}

/// Running count matches desired count with a single deployment left.
pub fn is_stable(service: &Service) -> bool {
    let deployments = service.deployments.as_ref().map_or(0, |deployments| deployments.len());
    deployments <= 1 && service.running_count.unwrap_or(0) == service.desired_count.unwrap_or(0)
}

async fn poll_until_stable<A: EcsApi + ?Sized>(api: &A, target: &Rollout, interval: Duration) -> Result<Service, RolloutError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let described = describe(api, &target.cluster, &target.service).await?;
        debug!(
            "Stability check #{} for {}: running {:?} desired {:?} pending {:?}",
            attempt, target.service, described.running_count, described.desired_count, described.pending_count
        );
        if is_stable(&described) {
            return Ok(described);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Blocks until the service of `target` is stable or `stability.timeout`
/// elapses, including time spent inside a slow describe call.
///
/// The mutation that triggered the wait has already been accepted, a
/// `Timeout` carries `target` so the operator still learns what was applied.
pub async fn wait_stable<A: EcsApi + ?Sized>(
    api: &A,
    target: &Rollout,
    stability: Stability,
) -> Result<Service, RolloutError> {
    let started = Instant::now();
    match tokio::time::timeout(stability.timeout, poll_until_stable(api, target, stability.interval)).await {
        Ok(polled) => {
            if polled.is_ok() {
                info!("Service {} is stable after {:?}", target.service, started.elapsed());
            }
            polled
        }
        Err(_) => {
            warn!("Service {} not stable after {:?}", target.service, started.elapsed());
            Err(RolloutError::Timeout {
                rollout: target.clone(),
                waited: stability.timeout,
            })
        }
    }
}
