use std::time::Duration;

use anyhow::Error;
use thiserror::Error as ThisError;

use crate::rollout::Rollout;

/// Failures surfaced by the ECS workflows.
///
/// Every step fails fast: the first error aborts the remaining steps and is
/// reported as-is. Nothing already applied is rolled back.
#[derive(Debug, ThisError)]
pub enum RolloutError {
    #[error("service [{0}] was not found in any cluster")]
    NotFound(String),

    #[error("more than one cluster hosts service [{service}], you must explicitly specify --cluster")]
    AmbiguousCluster {
        service: String,
        clusters: Vec<String>,
    },

    #[error("service [{service}] already exists in the following cluster or clusters")]
    AlreadyExists {
        service: String,
        clusters: Vec<String>,
    },

    #[error("conflicting arguments: {0}")]
    InputConflict(String),

    #[error("unknown size [{0}], expected one of xsmall, small, medium, large, xlarge, 2xlarge")]
    InvalidSize(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{rollout}: request accepted, stability not confirmed within {waited:?}")]
    Timeout { rollout: Rollout, waited: Duration },

    #[error("{step}: {source:#}")]
    Api {
        step: &'static str,
        #[source]
        source: Error,
    },
}

impl RolloutError {
    /// Clusters the operator has to pick from, if any.
    pub fn candidates(&self) -> &[String] {
        match self {
            RolloutError::AmbiguousCluster { clusters, .. } => clusters,
            RolloutError::AlreadyExists { clusters, .. } => clusters,
            _ => &[],
        }
    }
}

/// Labels a platform call failure with the workflow step it belongs to.
pub trait StepContext<T> {
    fn step(self, step: &'static str) -> Result<T, RolloutError>;
}

impl<T> StepContext<T> for Result<T, Error> {
    fn step(self, step: &'static str) -> Result<T, RolloutError> {
        self.map_err(|source| {
            log::error!("Failed while {}: `{:#}`", step, source);
            RolloutError::Api { step, source }
        })
    }
}
