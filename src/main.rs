#[macro_use]
extern crate log;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use clap::{Args, Parser, Subcommand};
use rusoto_ecs::EcsClient;

use crate::aws::client;
use crate::aws::credentials::assume_role;
use crate::aws::ecs::build_ecs_client;
use crate::aws::ecs::describe::{describe_services, DescribeOptions};
use crate::aws::ecs::dto::SERVICE_HEADERS;
use crate::aws::ecs::stable::Stability;
use crate::aws::manager::Config;
use crate::error::{RolloutError, StepContext};
use crate::rollout::{CreateOptions, RolloutOptions, UpdateOptions};

mod aws;
mod error;
mod output;
mod rollout;

#[derive(Parser)]
#[command(name = "morgan", about = "Automation for aws ecs services", version)]
struct Cli {
    /// Log filter such as `debug` or `morgan=trace` (defaults to RUST_LOG)
    #[arg(long, global = true)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Automation for ecs
    Ecs {
        #[command(subcommand)]
        subcommand: EcsSubcommand,
    },
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// ecs cluster (looked up from the service name when omitted)
    #[arg(long, short = 'c')]
    cluster: Option<String>,

    /// Seconds to wait for the service to become stable
    #[arg(long, short = 't')]
    timeout: Option<u64>,

    /// Waits for the service to become stable
    #[arg(long = "service-stable", short = 'w')]
    service_stable: bool,
}

#[derive(Subcommand, Debug)]
enum EcsSubcommand {
    /// Creates a service from a size profile and an image
    #[command(alias = "create-service")]
    Create {
        service: String,
        /// xsmall, small, medium, large, xlarge or 2xlarge
        size: String,
        port: u16,
        image: String,
        /// Container environment as key=value, repeatable
        #[arg(short = 'e', long = "env")]
        env: Vec<String>,
        /// Run an already registered task definition instead of building one
        #[arg(long)]
        task_definition: Option<String>,
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        desired_count: Option<i64>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Starts services on their current task definition
    #[command(alias = "start-service")]
    Start {
        #[arg(required = true)]
        services: Vec<String>,
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        desired_count: Option<i64>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Scales services down to zero
    #[command(alias = "stop-service")]
    Stop {
        #[arg(required = true)]
        services: Vec<String>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Rolls out new docker tags, one per container definition
    #[command(alias = "update-service")]
    Update {
        service: String,
        tags: Vec<String>,
        /// Comma separated docker tags, instead of positional tags
        #[arg(long, value_delimiter = ',')]
        docker_tags: Vec<String>,
        #[arg(long, value_parser = clap::value_parser!(i64).range(0..))]
        desired_count: Option<i64>,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Drains a service to zero, waits, then deletes it
    #[command(alias = "delete-service")]
    Delete {
        service: String,
        #[arg(long, short = 'c')]
        cluster: Option<String>,
        #[arg(long, short = 't')]
        timeout: Option<u64>,
    },
    /// Describes services
    #[command(alias = "describe-services")]
    Describe {
        services: Vec<String>,
        #[arg(long, short = 'c')]
        cluster: Option<String>,
        /// Output as JSON
        #[arg(long, short = 'j')]
        json: bool,
    },
}

impl EcsSubcommand {
    fn label(&self) -> &'static str {
        match self {
            EcsSubcommand::Create { .. } => "creating service",
            EcsSubcommand::Start { .. } => "starting service",
            EcsSubcommand::Stop { .. } => "stopping service",
            EcsSubcommand::Update { .. } => "updating service",
            EcsSubcommand::Delete { .. } => "deleting service",
            EcsSubcommand::Describe { .. } => "describing services",
        }
    }
}

fn init_logger(filter: Option<&str>) {
    match filter {
        Some(filter) => pretty_env_logger::formatted_builder().parse_filters(filter).init(),
        None => pretty_env_logger::init(),
    }
}

async fn connect(config: &Config) -> Result<EcsClient, Error> {
    let client = Arc::new(client::new_client()?);
    let region = config.region()?;
    let creds = match &config.role_arn {
        Some(role_arn) => Some(assume_role(client.clone(), region.clone(), role_arn).await?),
        None => None,
    };
    build_ecs_client(client, region, creds)
}

fn rollout_options(config: &Config, common: CommonArgs, desired_count: Option<i64>) -> RolloutOptions {
    RolloutOptions {
        cluster: common.cluster,
        desired_count,
        wait_for_stable: common.service_stable,
        stability: Stability {
            timeout: Duration::from_secs(common.timeout.unwrap_or_else(|| config.timeout_seconds())),
            interval: config.poll_interval(),
        },
    }
}

async fn run(subcommand: EcsSubcommand) -> Result<(), RolloutError> {
    let config = Config::load().step("loading configuration")?;
    let api = connect(&config).await.step("connecting to aws")?;

    match subcommand {
        EcsSubcommand::Create { service, size, port, image, env, task_definition, desired_count, common } => {
            let options = CreateOptions {
                service,
                size,
                port,
                image,
                environment: env,
                task_definition,
                default_cluster: config.default_cluster().to_owned(),
                rollout: rollout_options(&config, common, desired_count),
            };
            let created = rollout::create(&api, &options).await?;
            output::success(&format!("creating service {}", output::rollout_summary(&created)));
        }
        EcsSubcommand::Start { services, desired_count, common } => {
            let options = rollout_options(&config, common, desired_count);
            let batch = rollout::start(&api, &services, &options).await;
            for started in &batch.completed {
                output::success(&format!("starting service {}", output::rollout_summary(started)));
            }
            batch.into_result()?;
        }
        EcsSubcommand::Stop { services, common } => {
            let options = rollout_options(&config, common, None);
            let batch = rollout::stop(&api, &services, &options).await;
            for stopped in &batch.completed {
                output::success(&format!("stopping service {}", output::rollout_summary(stopped)));
            }
            batch.into_result()?;
        }
        EcsSubcommand::Update { service, tags, docker_tags, desired_count, common } => {
            let options = UpdateOptions {
                service,
                tags,
                docker_tags,
                rollout: rollout_options(&config, common, desired_count),
            };
            let updated = rollout::update(&api, &options).await?;
            output::success(&format!("updating service {}", output::rollout_summary(&updated)));
        }
        EcsSubcommand::Delete { service, cluster, timeout } => {
            let common = CommonArgs {
                cluster,
                timeout,
                service_stable: true,
            };
            let deleted = rollout::delete(&api, &service, &rollout_options(&config, common, None)).await?;
            output::success(&format!("deleting service {}/{}", deleted.cluster, deleted.service));
        }
        EcsSubcommand::Describe { services, cluster, json } => {
            let rows = describe_services(&api, &DescribeOptions { cluster, services }).await?;
            if json {
                output::print_json(&rows).step("writing json")?;
            } else {
                output::print_table(&SERVICE_HEADERS, rows.iter().map(|row| row.row()).collect());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.log.as_deref());

    match cli.command {
        Commands::Ecs { subcommand } => {
            let label = subcommand.label();
            if let Err(err) = run(subcommand).await {
                output::failure(label, &err);
                std::process::exit(1);
            }
        }
    }
}
