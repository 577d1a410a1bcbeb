use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use regex::Regex;
use rusoto_ecs::{ContainerDefinition, KeyValuePair, PortMapping, RegisterTaskDefinitionRequest, TaskDefinition};

use crate::aws::ecs::{name_from_arn, EcsApi};
use crate::error::{RolloutError, StepContext};

/// T-shirt sizes for a single container, as (cpu units, memory MiB).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeProfile {
    XSmall,
    Small,
    Medium,
    Large,
    XLarge,
    XXLarge,
}

impl SizeProfile {
    pub const ALL: [SizeProfile; 6] = [
        SizeProfile::XSmall,
        SizeProfile::Small,
        SizeProfile::Medium,
        SizeProfile::Large,
        SizeProfile::XLarge,
        SizeProfile::XXLarge,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SizeProfile::XSmall => "xsmall",
            SizeProfile::Small => "small",
            SizeProfile::Medium => "medium",
            SizeProfile::Large => "large",
            SizeProfile::XLarge => "xlarge",
            SizeProfile::XXLarge => "2xlarge",
        }
    }

    pub fn resources(self) -> (i64, i64) {
        match self {
            SizeProfile::XSmall => (64, 128),
            SizeProfile::Small => (128, 256),
            SizeProfile::Medium => (256, 512),
            SizeProfile::Large => (512, 1024),
            SizeProfile::XLarge => (1024, 2048),
            SizeProfile::XXLarge => (2048, 4096),
        }
    }
}

impl FromStr for SizeProfile {
    type Err = RolloutError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        SizeProfile::ALL
            .iter()
            .copied()
            .find(|size| size.name() == name)
            .ok_or_else(|| RolloutError::InvalidSize(name.to_owned()))
    }
}

impl fmt::Display for SizeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Desired shape of the single container a fresh service runs.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub size: SizeProfile,
    pub port: u16,
    pub environment: BTreeMap<String, String>,
}

/// Parses repeated `key=value` arguments. A repeated key keeps its last value.
pub fn parse_environment(pairs: &[String]) -> Result<BTreeMap<String, String>, RolloutError> {
    let kv_regex = build_env_regex();
    let mut environment = BTreeMap::new();
    for pair in pairs {
        let caps = kv_regex
            .captures(pair)
            .ok_or_else(|| RolloutError::InvalidInput(format!("environment `{}` is not in key=value form", pair)))?;
        environment.insert(caps[1].to_owned(), caps[2].to_owned());
    }
    Ok(environment)
}

fn build_env_regex() -> Regex {
    Regex::new(r"^([^=\s]+)=(.*)$").unwrap()
}

/// Registration request for a brand new family named after the container.
pub fn build_fresh(spec: &ContainerSpec) -> RegisterTaskDefinitionRequest {
    let (cpu, memory) = spec.size.resources();
    let environment = spec.environment
        .iter()
        .map(|(name, value)| KeyValuePair {
            name: Some(name.clone()),
            value: Some(value.clone()),
        })
        .collect::<Vec<_>>();

    RegisterTaskDefinitionRequest {
        family: spec.name.clone(),
        container_definitions: vec![ContainerDefinition {
            name: Some(spec.name.clone()),
            image: Some(spec.image.clone()),
            cpu: Some(cpu),
            memory: Some(memory),
            memory_reservation: Some(memory),
            essential: Some(true),
            port_mappings: Some(vec![PortMapping {
                container_port: Some(i64::from(spec.port)),
                host_port: Some(0),
                protocol: Some("tcp".to_owned()),
            }]),
            environment: if environment.is_empty() { None } else { Some(environment) },
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Rejects blank docker tags, which would leave images ending in `:`.
pub fn check_tags(tags: &[String]) -> Result<(), RolloutError> {
    match tags.iter().position(|tag| tag.trim().is_empty()) {
        Some(ix) => Err(RolloutError::InvalidInput(format!("docker tag #{} is empty", ix + 1))),
        None => Ok(()),
    }
}

/// Registration request copying `previous` with each container image
/// re-tagged positionally. `tags` must match the container count.
pub fn retag(previous: &TaskDefinition, tags: &[String]) -> Result<RegisterTaskDefinitionRequest, RolloutError> {
    let family = previous.family
        .clone()
        .ok_or_else(|| RolloutError::InvalidInput("task definition has no family".to_owned()))?;
    let mut containers = previous.container_definitions.clone().unwrap_or_default();

    if !tags.is_empty() {
        check_tags(tags)?;
        if tags.len() != containers.len() {
            return Err(RolloutError::InvalidInput(format!(
                "{} docker tags given but task definition {} has {} container definitions",
                tags.len(),
                family,
                containers.len()
            )));
        }
        for (container, tag) in containers.iter_mut().zip(tags) {
            let image = container.image.as_deref().unwrap_or_default();
            let retagged = retag_image(image, tag);
            debug!("Container {:?} image {} -> {}", container.name, image, retagged);
            container.image = Some(retagged);
        }
    }

    Ok(RegisterTaskDefinitionRequest {
        family,
        container_definitions: containers,
        cpu: previous.cpu.clone(),
        memory: previous.memory.clone(),
        network_mode: previous.network_mode.clone(),
        pid_mode: previous.pid_mode.clone(),
        ipc_mode: previous.ipc_mode.clone(),
        placement_constraints: previous.placement_constraints.clone(),
        requires_compatibilities: previous.requires_compatibilities.clone(),
        volumes: previous.volumes.clone(),
        task_role_arn: previous.task_role_arn.clone(),
        execution_role_arn: previous.execution_role_arn.clone(),
        ..Default::default()
    })
}

/// Replaces everything after the last `:` of an image reference with `tag`.
/// A registry port (`host:5000/repo`) is not mistaken for a tag.
pub fn retag_image(image: &str, tag: &str) -> String {
    match image.rfind(':') {
        Some(ix) if !image[ix + 1..].contains('/') => format!("{}:{}", &image[..ix], tag),
        _ => format!("{}:{}", image, tag),
    }
}

/// Tag part of an image reference, if it has one.
pub fn image_tag(image: &str) -> Option<&str> {
    match image.rfind(':') {
        Some(ix) if !image[ix + 1..].contains('/') => Some(&image[ix + 1..]),
        _ => None,
    }
}

/// `family:revision` part of a task definition arn.
pub fn task_definition_id(arn: &str) -> &str {
    name_from_arn(arn)
}

/// Registers `request` as a new revision and returns its arn.
pub async fn register<A: EcsApi + ?Sized>(api: &A, request: RegisterTaskDefinitionRequest) -> Result<String, RolloutError> {
    let family = request.family.clone();
    let registered = api.register_task_definition(request).await.step("registering task definition")?;
    let arn = registered.task_definition_arn.ok_or_else(|| RolloutError::Api {
        step: "registering task definition",
        source: anyhow::anyhow!("no arn returned for family {}", family),
    })?;
    info!("Registered task definition {}", task_definition_id(&arn));
    Ok(arn)
}
