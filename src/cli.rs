use crate::commands::{handle_monitor, MonitorArgs};
use crate::config::{Config, Overrides};
use crate::errors::Result;
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sagewatch")]
#[command(about = "Show running SageMaker compute and what it is costing")]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to <config dir>/sagewatch/config.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    #[command(flatten)]
    pub monitor: MonitorArgs,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            region: self.monitor.region.clone(),
            endpoint_url: self.monitor.endpoint_url.clone(),
            pricing_file: self.monitor.pricing.clone(),
            detailed: self.monitor.detailed,
        }
    }
}

/// Install the logger. `RUST_LOG` wins unless `--verbose` is given.
pub fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.format_timestamp(None).init();
}

pub async fn run_cli(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref(), cli.overrides())?;
    handle_monitor(cli.monitor, &config).await
}
