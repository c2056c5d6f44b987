use anyhow::Context;
use clap::Parser;
use log::{error, info};
use shardopd::api::{ClusterStore, EtcdStore};
use shardopd::cli::{Cli, Commands};
use shardopd::config::{Config, config_ref, load_config};
use shardopd::controllers::{Controller, StatusController};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::init();

    match &cli.command {
        Commands::Start { config } => {
            load_config(config.to_str().unwrap())?;
            run_operator().await?;
        }
        Commands::Apply { config, file } => {
            load_config(config.to_str().unwrap())?;
            apply_manifest(file).await?;
        }
    }

    Ok(())
}

async fn connect_store(cfg: &Config) -> anyhow::Result<Arc<EtcdStore>> {
    let store = Arc::new(
        EtcdStore::new(cfg.etcd_config.endpoints.clone())
            .await
            .with_context(|| "Failed to connect etcd")?,
    );
    Ok(store)
}

async fn run_operator() -> anyhow::Result<()> {
    let cfg = config_ref();
    let store = connect_store(cfg).await?;
    let controller = StatusController::new();

    info!(
        target: "shardopd::main",
        "reconciling shard clusters every {}s", cfg.reconcile_interval_secs
    );

    loop {
        match store.list_shard_cluster_names().await {
            Ok(names) => {
                for name in names {
                    let handle: Arc<dyn ClusterStore> = store.clone();
                    if let Err(err) = controller.reconcile(&name, handle).await {
                        error!("reconcile shard cluster {name} failed: {err:#}");
                    }
                }
            }
            Err(err) => error!("list shard clusters failed: {err:#}"),
        }

        sleep(Duration::from_secs(cfg.reconcile_interval_secs)).await;
    }
}

async fn apply_manifest(file: &Path) -> anyhow::Result<()> {
    let cfg = config_ref();
    let store = connect_store(cfg).await?;

    let yaml = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read manifest {}", file.display()))?;
    let cluster: common::ShardCluster =
        serde_yaml::from_str(&yaml).context("Failed to parse ShardCluster manifest")?;

    store
        .insert_shard_cluster_yaml(&cluster.metadata.name, &yaml)
        .await?;
    println!("shardcluster/{} applied", cluster.metadata.name);
    Ok(())
}
