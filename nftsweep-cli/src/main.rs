//! `nftsweep` - audit a list of wallet addresses for ERC-721 ownership.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nftsweep_core::{CsvSink, Orchestrator, RpcEvaluator, SweepConfig, build_handles};
use nftsweep_model::SweepEvent;

mod inputs;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "nftsweep")]
#[command(about = "Check which wallet addresses own tokens in a set of ERC-721 contracts")]
struct Cli {
    /// File with one wallet address per line
    #[arg(long, default_value = "input_addresses.txt")]
    input: PathBuf,

    /// File with one contract address per line, in check-precedence order
    #[arg(long, default_value = "nft_contracts.txt")]
    contracts: PathBuf,

    /// JSON ABI descriptor; must expose balanceOf(address)
    #[arg(long, default_value = "erc721_abi.json")]
    abi: PathBuf,

    /// Destination CSV; appended to and resumed across runs
    #[arg(long, default_value = "nft_owners.csv")]
    output: PathBuf,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint URL
    #[arg(long, env = "NFTSWEEP_RPC_URL")]
    rpc_url: Option<String>,

    /// Override the configured worker count
    #[arg(long)]
    concurrency: Option<usize>,

    /// Discard previously persisted results instead of resuming
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Populate process env before clap resolves `env =` arguments.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&cli)?;

    let address_lines = inputs::load_lines(&cli.input)?;
    let addresses = inputs::parse_addresses(&address_lines);
    if addresses.is_empty() {
        bail!("no valid addresses in {}", cli.input.display());
    }

    let contract_lines = inputs::load_lines(&cli.contracts)?;
    let contract_addresses = inputs::parse_contracts(&contract_lines);
    if contract_addresses.is_empty() {
        bail!("no valid contract addresses in {}", cli.contracts.display());
    }

    let abi_raw = inputs::load_abi(&cli.abi)?;
    let handles = build_handles(&contract_addresses, &abi_raw)
        .context("building contract handles")?;

    if cli.fresh && cli.output.exists() {
        std::fs::remove_file(&cli.output)
            .with_context(|| format!("truncating {}", cli.output.display()))?;
        info!(path = %cli.output.display(), "previous results discarded");
    }

    // Committed records survive re-runs: subtract them from the input set.
    let done = CsvSink::existing_addresses(&cli.output)
        .with_context(|| format!("reading existing results {}", cli.output.display()))?;
    let total_input = addresses.len();
    let pending: Vec<_> = addresses
        .into_iter()
        .filter(|a| !done.contains(a))
        .collect();
    if pending.len() < total_input {
        info!(
            persisted = total_input - pending.len(),
            pending = pending.len(),
            "resuming: previously persisted addresses skipped"
        );
    }
    if pending.is_empty() {
        println!("All {total_input} addresses already checked; nothing to do.");
        return Ok(());
    }

    let evaluator = Arc::new(RpcEvaluator::new(&config.rpc)?);
    let mut orchestrator = Orchestrator::new(config)?;

    // Ctrl-C cancels cooperatively: in-flight scans finish their current
    // contract, completed work is flushed, and the summary still prints.
    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; stopping submissions and flushing completed work");
            token.cancel();
        }
    });

    let mut events = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let SweepEvent::AddressChecked {
                address,
                owns,
                completed,
                total,
                ..
            } = event
            {
                info!("[{completed}/{total}] {address}: owns NFT = {owns}");
            }
        }
    });

    let started = Instant::now();
    let mut sink = CsvSink::new(&cli.output);
    let summary = orchestrator
        .run(pending, handles.into(), evaluator, &mut sink)
        .await?;
    let elapsed = started.elapsed();
    drop(orchestrator);
    let _ = progress.await;

    println!(
        "Checked {} addresses: {} own at least one NFT ({:.1}%)",
        summary.checked,
        summary.positive,
        summary.ratio * 100.0
    );
    if summary.permanent_failures > 0 {
        println!(
            "{} contract calls were rejected outright (counted as not owning); see the log.",
            summary.permanent_failures
        );
    }
    println!("Results written to {}", cli.output.display());
    println!("Done in {:.2} seconds.", elapsed.as_secs_f64());
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<SweepConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            SweepConfig::from_toml_str(&raw)?
        }
        None => SweepConfig::default(),
    };
    if let Some(url) = &cli.rpc_url {
        config.rpc.url = url.clone();
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency = concurrency;
    }
    config.validate()?;
    Ok(config)
}
