use std::{fs, fs::File, path::PathBuf};

use anyhow::{Context, Result};
use branch_ledger::bin_utils::{Service, ServiceError, SimulationConfig};
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Runs concurrent tellers against a multi-branch ledger and prints CSV reports.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// TOML file with simulation settings
    #[arg(long, env = "BRANCH_LEDGER_CONFIG")]
    config: Option<PathBuf>,
    /// CSV teller script to run instead of random traffic
    #[arg(long)]
    script: Option<PathBuf>,
    #[arg(long)]
    branches: Option<u32>,
    #[arg(long)]
    accounts: Option<u32>,
    #[arg(long)]
    workers: Option<usize>,
    #[arg(long)]
    days: Option<u32>,
    #[arg(long)]
    ops_per_day: Option<usize>,
    #[arg(long)]
    seed: Option<u64>,
    /// Opening balance of every account, in cents
    #[arg(long)]
    initial_amount: Option<i64>,
    /// Amount in cents at or above which operations are counted as reportable
    #[arg(long)]
    reporting_amount: Option<i64>,
}

impl Args {
    fn load_config(&self) -> Result<SimulationConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read `{}`", path.display()))?;
                toml::from_str(&text)
                    .with_context(|| format!("Failed to parse `{}`", path.display()))?
            }
            None => SimulationConfig::default(),
        };
        if let Some(v) = self.branches {
            config.ledger.branch_count = v;
        }
        if let Some(v) = self.accounts {
            config.ledger.accounts_per_branch = v;
        }
        if let Some(v) = self.workers {
            config.ledger.worker_count = v;
        }
        if let Some(v) = self.initial_amount {
            config.ledger.initial_amount = v;
        }
        if let Some(v) = self.reporting_amount {
            config.ledger.reporting_amount = v;
        }
        if let Some(v) = self.days {
            config.days = v;
        }
        if let Some(v) = self.ops_per_day {
            config.ops_per_day = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.load_config()?;
    let script = match &args.script {
        Some(path) => Some(
            File::open(path).with_context(|| format!("Failed to open `{}`", path.display()))?,
        ),
        None => None,
    };

    let service = Service {
        config,
        script,
        output: &mut std::io::stdout(),
        error_printer: Box::new(|err: &ServiceError| match err {
            ServiceError::Parse { .. } | ServiceError::Command { .. } => warn!("{err}"),
            // rejected operations are normal traffic, the teller already logs them
            ServiceError::Teller { .. } => {}
        }),
    };
    service.run()?;
    Ok(())
}
