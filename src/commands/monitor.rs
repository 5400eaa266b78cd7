use crate::config::Config;
use crate::display::{print_warning, render_report};
use crate::errors::{Result, SageWatchError};
use crate::report::Report;
use chrono::Utc;
use clap::Args;
use log::{debug, info, warn};
use sagewatch_api::{AggregateResult, AggregateStatus, Aggregator, Retrier, SageMakerClient};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Args, Debug, Clone, Default)]
pub struct MonitorArgs {
    /// Region to poll (defaults to AWS_REGION, then the config file, then us-east-1)
    #[arg(short, long)]
    pub region: Option<String>,

    /// Print JSON instead of a table
    #[arg(short, long)]
    pub json: bool,

    /// TOML or JSON price table overriding the built-in prices
    #[arg(long, value_name = "FILE")]
    pub pricing: Option<PathBuf>,

    /// Custom service endpoint, e.g. a local emulator
    #[arg(long, value_name = "URL")]
    pub endpoint_url: Option<String>,

    /// Describe each endpoint and notebook for instance details (slower)
    #[arg(long)]
    pub detailed: bool,
}

/// Poll every resource kind once and print what is running and what it costs.
pub async fn handle_monitor(args: MonitorArgs, config: &Config) -> Result<()> {
    let retrier = Retrier::new(config.retry_policy()?);
    let prices = config.price_table()?;
    let client = Arc::new(SageMakerClient::from_config(config)?);
    info!("Polling SageMaker in {} via {}", client.region(), client.endpoint());

    let cancel = CancellationToken::new();
    let ctrl_c = spawn_interrupt_watcher(cancel.clone());

    let outcome = poll(&client, &retrier, config.detailed(), &cancel).await;
    ctrl_c.abort();

    let outcome = outcome?;
    let status = outcome.status();
    let AggregateResult {
        resources,
        warnings,
        fatal_error,
    } = outcome;

    let now = Utc::now();
    let report = Report::build(client.region(), resources, warnings, &prices, now);

    for message in &report.warnings {
        print_warning(message);
    }

    if let Some(output) = render_output(&report, status, args.json)? {
        print!("{}", output);
    }

    match fatal_error {
        Some(failure) => Err(failure.into()),
        None => Ok(()),
    }
}

/// Stdout text for a finished run. A fatal failure with nothing listed has no
/// output; the error alone is reported.
fn render_output(report: &Report, status: AggregateStatus, json: bool) -> Result<Option<String>> {
    if status == AggregateStatus::Fatal && report.is_empty() {
        return Ok(None);
    }

    if json {
        Ok(Some(format!("{}\n", serde_json::to_string_pretty(&report.to_json())?)))
    } else {
        Ok(Some(render_report(report)))
    }
}

async fn poll(
    client: &Arc<SageMakerClient>,
    retrier: &Retrier,
    detailed: bool,
    cancel: &CancellationToken,
) -> Result<AggregateResult> {
    let api = client.as_ref();
    let valid = retrier
        .execute(cancel, move || api.validate_configuration())
        .await?;

    if !valid {
        return Err(SageWatchError::Unauthorized(format!(
            "the platform refused the configured credentials for region {}",
            client.region()
        )));
    }
    debug!("Credentials accepted");

    let aggregator = Aggregator::from_client(Arc::clone(client), detailed, retrier.clone());
    Ok(aggregator.run(cancel).await?)
}

fn spawn_interrupt_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling outstanding requests");
            cancel.cancel();
        }
    })
}
