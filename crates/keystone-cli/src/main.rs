//! Keystone command-line driver
//!
//! Replays operation scripts against an in-memory identity and prints every
//! notification as a JSON line. Also derives key identifiers from addresses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keystone_core::{Address, IdentityConfig};
use keystone_identity::Identity;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod script;

#[derive(Parser)]
#[command(name = "keystone")]
#[command(about = "Keystone - purpose-keyed identity registry with n-of-m execution")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an operation script and print emitted notifications
    Run {
        /// TOML script to replay
        script: PathBuf,
    },

    /// Print the key identifier derived from an address
    DeriveKey {
        /// 20-byte hex address, with or without 0x
        address: String,
    },
}

fn load_config(path: Option<&Path>) -> Result<IdentityConfig> {
    let mut config = match path {
        Some(path) => IdentityConfig::load_from_file(path)?,
        None => IdentityConfig::default(),
    };
    config.merge_with_env()?;
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).context("failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { script: path } => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let parsed = script::Script::from_toml_str(&content)?;
            let mut identity = Identity::new(parsed.identity, config);
            info!(identity = %identity.address(), steps = parsed.steps.len(), "replaying script");

            for record in script::run(&mut identity, parsed)? {
                println!("{}", serde_json::to_string(&record)?);
            }
        }

        Commands::DeriveKey { address } => {
            let address: Address = address.parse()?;
            println!("{}", address.key_id());
        }
    }

    Ok(())
}
