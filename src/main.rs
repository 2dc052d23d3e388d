mod cli;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use rust_eth_activity_lab::activity::ActivityEngine;
use rust_eth_activity_lab::api::{self, resolve_window, AppState};
use rust_eth_activity_lab::chain::ChainCache;
use rust_eth_activity_lab::config::Config;
use rust_eth_activity_lab::engine_stats::ENGINE_STATS;
use rust_eth_activity_lab::eth::EthClient;
use rust_eth_activity_lab::explorer::ExplorerClient;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("failed to load configuration")?;
    let engine = Arc::new(build_engine(&config)?);

    match cli.command {
        Commands::Serve { addr } => {
            let bind = addr.unwrap_or_else(|| config.http_bind_addr.clone());
            api::run_http_server(&bind, AppState { engine }).await?;
        }
        Commands::Activity {
            address,
            start,
            end,
        } => {
            let (start, end) = resolve_window(start, end);
            let rows = engine.build_activity(&address, start, end).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
            tracing::info!("engine counters: {:?}", ENGINE_STATS.snapshot());
        }
        Commands::Stats {
            address,
            start,
            end,
        } => {
            let (start, end) = resolve_window(start, end);
            let stats = engine.build_stats(&address, start, end).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            tracing::info!("engine counters: {:?}", ENGINE_STATS.snapshot());
        }
    }

    Ok(())
}

fn build_engine(config: &Config) -> anyhow::Result<ActivityEngine> {
    let gateway = ExplorerClient::new(
        &config.explorer_api_url,
        config.explorer_api_key.clone(),
        config.request_timeout,
    )?;
    let rpc = EthClient::new(&config.eth_rpc_url, config.request_timeout)?;
    let chain = ChainCache::new(Arc::new(rpc), config.retry_policy());

    Ok(ActivityEngine::new(
        Arc::new(gateway),
        Arc::new(chain),
        Arc::new(config.registry()),
        config.limits(),
    ))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
}
