use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::sync::OnceLock;

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn config_ref() -> &'static Config {
    CONFIG.get().unwrap()
}

#[derive(Debug, Deserialize)]
pub struct Config {
    // etcd endpoints
    pub etcd_config: EtcdConfig,
    // seconds between reconcile sweeps
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EtcdConfig {
    pub endpoints: Vec<String>,
}

fn default_reconcile_interval() -> u64 {
    5
}

pub fn load_config(path: &str) -> anyhow::Result<&'static Config> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read config from {path}"))?;
    let cfg: Config = serde_yaml::from_str(&content).context("Failed to parse YAML config")?;
    let cfg = CONFIG.get_or_init(|| cfg);
    Ok(cfg)
}
