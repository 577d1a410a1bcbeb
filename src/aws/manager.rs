use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Error};
use rusoto_core::region::Region;
use serde::{Deserialize, Serialize};

const CONFIG_ENV: &str = "MORGAN_CONFIG";
const DEFAULT_CLUSTER: &str = "default";
const DEFAULT_POLL_SECONDS: u64 = 15;
const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub region: Option<String>,
    pub role_arn: Option<String>,
    pub default_cluster: Option<String>,
    pub stable_poll_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
}

impl Config {
    pub fn init() -> Config {
        Config {
            default_cluster: Some(DEFAULT_CLUSTER.to_owned()),
            stable_poll_seconds: Some(DEFAULT_POLL_SECONDS),
            timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
            ..Default::default()
        }
    }

    pub fn load() -> Result<Config, Error> {
        let config_path = build_config_path()?;

        let config = if config_path.exists() {
            let data = read_config_file(&config_path)?;
            serde_json::from_str(&data)
                .with_context(|| format!("Invalid json in {:?}", config_path))?
        } else {
            let config = Self::init();
            config.persist(&config_path)?;
            config
        };

        debug!("Loaded config {:?} from {:?}", config, config_path);
        Ok(config)
    }

    pub fn persist(&self, config_path: &Path) -> Result<(), Error> {
        let file = File::create(config_path)
            .with_context(|| format!("could not create {:?}", config_path))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Configured region, or rusoto's own lookup (`AWS_DEFAULT_REGION`,
    /// `AWS_REGION`, then us-east-1).
    pub fn region(&self) -> Result<Region, Error> {
        match &self.region {
            Some(name) => Region::from_str(name)
                .map_err(|err| anyhow!("Invalid region `{}` in config: {}", name, err)),
            None => Ok(Region::default()),
        }
    }

    pub fn default_cluster(&self) -> &str {
        self.default_cluster.as_deref().unwrap_or(DEFAULT_CLUSTER)
    }

    /// Delay between stability checks, never below one second.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.stable_poll_seconds.unwrap_or(DEFAULT_POLL_SECONDS).max(1))
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS)
    }
}

fn build_config_path() -> Result<PathBuf, Error> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow!("Missing home directory"))?;
    Ok(Path::new(home_dir.as_path()).join(".morgan.json"))
}

fn read_config_file(config_path: &Path) -> Result<String, Error> {
    let mut config_file =
        File::open(config_path).with_context(|| format!("could not read {:?}", config_path))?;
    let mut data = String::new();
    config_file.read_to_string(&mut data)?;
    Ok(data)
}
