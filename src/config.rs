//! Cluster Configuration
//!
//! One `ClusterConfig` is built at process start and shared (`Arc`) with every
//! component. Values come from built-in defaults, then `CLUSTER_*` environment
//! variables, then command-line flags applied by `main.rs`.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HEARTBEAT_MS: u64 = 5_000;
const DEFAULT_DEAD_THRESHOLD_MS: u64 = 12_000;
const DEFAULT_EVICTION_MS: u64 = 2_000;
const DEFAULT_CALLBACK_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Root of the shared working area (map output and shard files).
    pub working_dir: PathBuf,
    /// Address other processes use to reach listeners opened by this one.
    pub advertise_host: Ipv4Addr,
    /// Where the registry publishes its address.
    pub registry_info_path: PathBuf,
    /// Where the orchestrator publishes its address.
    pub orchestrator_info_path: PathBuf,
    pub heartbeat_interval_ms: u64,
    pub dead_threshold_ms: u64,
    pub eviction_interval_ms: u64,
    /// How long one accept on a job's callback endpoint may wait.
    pub callback_timeout_ms: u64,
    /// Dispatch rounds per phase before the job is failed.
    pub max_attempts: u32,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("working"),
            advertise_host: Ipv4Addr::LOCALHOST,
            registry_info_path: PathBuf::from("registry_info"),
            orchestrator_info_path: PathBuf::from("orchestrator_info"),
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_MS,
            dead_threshold_ms: DEFAULT_DEAD_THRESHOLD_MS,
            eviction_interval_ms: DEFAULT_EVICTION_MS,
            callback_timeout_ms: DEFAULT_CALLBACK_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ClusterConfig {
    /// Defaults overridden by any `CLUSTER_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CLUSTER_WORKING_DIR") {
            config.working_dir = PathBuf::from(dir);
        }
        if let Some(host) = env_parse::<Ipv4Addr>("CLUSTER_ADVERTISE_HOST")? {
            config.advertise_host = host;
        }
        if let Ok(path) = std::env::var("CLUSTER_REGISTRY_INFO") {
            config.registry_info_path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("CLUSTER_ORCHESTRATOR_INFO") {
            config.orchestrator_info_path = PathBuf::from(path);
        }
        if let Some(ms) = env_parse("CLUSTER_HEARTBEAT_MS")? {
            config.heartbeat_interval_ms = ms;
        }
        if let Some(ms) = env_parse("CLUSTER_DEAD_THRESHOLD_MS")? {
            config.dead_threshold_ms = ms;
        }
        if let Some(ms) = env_parse("CLUSTER_EVICTION_MS")? {
            config.eviction_interval_ms = ms;
        }
        if let Some(ms) = env_parse("CLUSTER_CALLBACK_TIMEOUT_MS")? {
            config.callback_timeout_ms = ms;
        }
        if let Some(n) = env_parse("CLUSTER_MAX_ATTEMPTS")? {
            config.max_attempts = n;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dead_threshold_ms <= self.heartbeat_interval_ms {
            bail!(
                "dead threshold ({} ms) must exceed the heartbeat interval ({} ms)",
                self.dead_threshold_ms,
                self.heartbeat_interval_ms
            );
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.eviction_interval_ms == 0 || self.heartbeat_interval_ms == 0 {
            bail!("loop intervals must be non-zero");
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn dead_threshold(&self) -> Duration {
        Duration::from_millis(self.dead_threshold_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_millis(self.callback_timeout_ms)
    }

    /// `working/mappers/`
    pub fn mappers_dir(&self) -> PathBuf {
        self.working_dir.join("mappers")
    }

    /// `working/mappers/<txn>/`, scratch space for one indexing job.
    pub fn transaction_dir(&self, transaction_id: i32) -> PathBuf {
        self.mappers_dir().join(transaction_id.to_string())
    }

    /// `working/reducers/`
    pub fn reducers_dir(&self) -> PathBuf {
        self.working_dir.join("reducers")
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(value) => Ok(Some(value)),
            Err(e) => bail!("invalid {}={:?}: {}", key, raw, e),
        },
        Err(_) => Ok(None),
    }
}
