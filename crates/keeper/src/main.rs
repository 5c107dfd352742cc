//! HA sidecar agent: exposes engine-agnostic cluster operations next to a
//! database process.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod agent;
mod config;
mod error;

use agent::Agent;
use config::Config;
use error::{Error, Result};

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, env = "KEEPER_CONFIG")]
    config: Option<PathBuf>,

    /// Pod the agent runs in
    #[arg(long, env = "KEEPER_POD_NAME")]
    pod_name: Option<String>,

    /// Namespace of the pod
    #[arg(long, env = "KEEPER_NAMESPACE")]
    namespace: Option<String>,

    /// Address of the node
    #[arg(long, env = "KEEPER_HOST_IP")]
    host_ip: Option<String>,

    /// Built-in engine manager
    #[arg(long, env = "KEEPER_ENGINE")]
    engine: Option<String>,

    /// Log filter, e.g. `info` or `keeper_operations=debug`
    #[arg(long, env = "KEEPER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(pod_name) = self.pod_name {
            config.pod_name = pod_name;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if let Some(host_ip) = self.host_ip {
            config.host_ip = host_ip;
        }
        if let Some(engine) = self.engine {
            config.engine = Some(engine);
        }

        Ok(config)
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn log_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(log_filter(&args.log_level)?)
            .finish(),
    )?;

    let config = args.into_config()?;
    info!("starting keeper for pod {:?}", config.pod_name);

    let agent = Agent::start(&config).await?;

    tokio::signal::ctrl_c().await.map_err(Error::Signal)?;
    info!("shutdown signal received");

    agent.shutdown().await;

    Ok(())
}
