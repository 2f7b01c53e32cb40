//! Timestake node CLI
//!
//! - `params`: print the effective configuration after file, environment
//!   and flag layering
//! - `simulate`: drive one goal through proof, voting, settlement and
//!   reputation accounting, then print the outcome as JSON

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use timestake_protocol::Amount;
use timestake_storage::{InMemoryLedgerStore, LedgerStore};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod simulate;

use config::{NodeConfig, StorageConfig};

/// Timestake CLI
#[derive(Parser)]
#[command(name = "timestake")]
#[command(about = "Timestake - staked commitments judged by a staked panel", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "TIMESTAKE_CONFIG")]
    config: Option<String>,

    /// Log level
    #[arg(long, env = "TIMESTAKE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long, env = "TIMESTAKE_LOG_JSON")]
    json: bool,

    /// PostgreSQL URL; switches storage to postgres
    #[arg(long, env = "TIMESTAKE_DATABASE_URL")]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as JSON
    Params,

    /// Run one goal through its whole lifecycle
    Simulate {
        /// Number of judges to register
        #[arg(long, default_value_t = 3)]
        judges: usize,

        /// How many of them vote yes
        #[arg(long, default_value_t = 2)]
        yes: usize,

        /// Goal stake (defaults to the minimum goal stake)
        #[arg(long)]
        stake: Option<Amount>,

        /// Value to seed the reward pool with
        #[arg(long, default_value_t = 0)]
        reward_pool: Amount,

        /// Goal id to use
        #[arg(long, default_value_t = 1)]
        goal_id: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = NodeConfig::load(cli.config.as_deref()).context("loading configuration")?;

    // Override with CLI args
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json {
        config.logging.json = true;
    }
    if let Some(url) = cli.database_url {
        config.storage = StorageConfig::Postgres {
            url,
            max_connections: 10,
            connect_timeout_secs: 5,
        };
    }

    init_tracing(&config);

    match cli.command {
        Commands::Params => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            judges,
            yes,
            stake,
            reward_pool,
            goal_id,
        } => {
            let store = open_store(&config.storage).await?;
            let report = simulate::run(
                &config,
                store,
                simulate::Scenario {
                    judges,
                    yes_votes: yes,
                    stake,
                    reward_pool,
                    goal_id,
                },
            )
            .await?;
            info!(goal_id = %report.goal_id, status = %report.status, "Simulation finished");
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing(config: &NodeConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.level.clone().into());

    if config.logging.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn open_store(storage: &StorageConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match storage {
        StorageConfig::Memory => Ok(Arc::new(InMemoryLedgerStore::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = timestake_storage::postgres::PostgresLedgerStore::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await
            .context("connecting to postgres")?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => {
            anyhow::bail!("postgres storage requested but this binary was built without the `postgres` feature")
        }
    }
}
