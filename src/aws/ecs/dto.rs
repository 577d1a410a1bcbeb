use chrono::{TimeZone, Utc};
use rusoto_ecs::Service;
use serde::{Deserialize, Serialize};

use crate::aws::ecs::task_definition::task_definition_id;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceResponse {
    #[serde(rename = "cluster")]
    pub cluster: String,
    /// Service name, unique within its cluster.
    #[serde(rename = "serviceName")]
    pub service_name: String,
    #[serde(rename = "pendingCount")]
    pub pending_count: i64,
    /// Tasks in the `RUNNING` state.
    #[serde(rename = "runningCount")]
    pub running_count: i64,
    #[serde(rename = "desiredCount")]
    pub desired_count: i64,
    /// `family:revision` the service runs.
    #[serde(rename = "taskDefinition")]
    pub task_definition: String,
    /// Image tag of every container, in definition order.
    #[serde(rename = "tags")]
    pub tags: Vec<String>,
    #[serde(rename = "createdAt")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl ServiceResponse {
    pub fn from_service(cluster: &str, service: Service) -> Option<ServiceResponse> {
        let task_definition = task_definition_id(service.task_definition.as_deref()?).to_owned();
        Some(ServiceResponse {
            cluster: cluster.to_owned(),
            service_name: service.service_name?,
            pending_count: service.pending_count.unwrap_or_default(),
            running_count: service.running_count.unwrap_or_default(),
            desired_count: service.desired_count.unwrap_or_default(),
            task_definition,
            tags: Vec::new(),
            created_at: service.created_at.and_then(format_timestamp),
        })
    }

    pub fn row(&self) -> Vec<String> {
        vec![
            self.cluster.clone(),
            self.service_name.clone(),
            self.pending_count.to_string(),
            self.running_count.to_string(),
            self.desired_count.to_string(),
            self.task_definition.clone(),
            self.tags.join(","),
        ]
    }
}

pub const SERVICE_HEADERS: [&str; 7] = ["Cluster", "Name", "Pending", "Running", "Desired", "TaskDef", "Tags"];

/// Seconds since the epoch, as sent by ECS, rendered in RFC 3339.
fn format_timestamp(seconds: f64) -> Option<String> {
    let whole = seconds.trunc() as i64;
    let nanos = (seconds.fract() * 1e9) as u32;
    Utc.timestamp_opt(whole, nanos).single().map(|time| time.to_rfc3339())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_service_response_from_service() {
        let service = Service {
            service_name: Some("orders".to_owned()),
            task_definition: Some("arn:aws:ecs:us-east-1:123456789012:task-definition/orders:7".to_owned()),
            desired_count: Some(3),
            running_count: Some(2),
            pending_count: Some(1),
            created_at: Some(1_560_000_000.0),
            ..Default::default()
        };
        let response = ServiceResponse::from_service("api", service).unwrap();
        assert_eq!(response.task_definition, "orders:7");
        assert_eq!(response.created_at.as_deref(), Some("2019-06-08T13:20:00+00:00"));
        assert_eq!(
            response.row(),
            vec!["api", "orders", "1", "2", "3", "orders:7", ""]
        );
    }

    #[test]
    fn test_service_without_task_definition_skipped() {
        let service = Service {
            service_name: Some("orders".to_owned()),
            ..Default::default()
        };
        assert!(ServiceResponse::from_service("api", service).is_none());
    }

    #[test]
    fn test_service_response_serialises() {
        let response = ServiceResponse {
            cluster: "api".to_owned(),
            service_name: "orders".to_owned(),
            desired_count: 1,
            running_count: 1,
            task_definition: "orders:1".to_owned(),
            tags: vec!["1.0.0".to_owned()],
            ..Default::default()
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["serviceName"], "orders");
        assert_eq!(json["tags"][0], "1.0.0");
        assert!(json.get("createdAt").is_none());
    }
}
