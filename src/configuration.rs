//! src/configuration.rs
use serde_aux::field_attributes::deserialize_number_from_string;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;

#[derive(serde::Deserialize, Clone)]
pub struct Settings {
    pub cluster: ClusterSettings,
    pub rpc: RpcSettings,
    pub job: JobSettings,
}

#[derive(serde::Deserialize, Clone)]
pub struct ClusterSettings {
    pub workers: u16,
    pub poll_interval_ms: u64,
}

impl ClusterSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct RpcSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

impl RpcSettings {
    pub fn get_host(&self) -> IpAddr {
        IpAddr::from_str(&self.host).expect("Invalid host")
    }
}

#[derive(serde::Deserialize, Clone)]
pub struct JobSettings {
    pub reduce_count: u64,
    pub task_timeout_ms: u64,
}

impl JobSettings {
    pub fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().expect("Failed to determine the current directory.");
    let config_dir = base_path.join("configuration");

    let settings = config::Config::builder()
        .add_source(config::File::from(config_dir.join("job.yaml")))
        .add_source(
            config::Environment::with_prefix("MRCOORD")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;
    settings.try_deserialize::<Settings>()
}
