/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Decoded stream events on stdout, logs on stderr
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use binance_stream_adapter::StreamClient;
use binance_stream_tail::TailConfig;

#[derive(Parser, Debug)]
#[command(name = "binance-stream-tail", version, about = "Tail Binance market and user-data streams")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: PathBuf,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(
        config_path = %args.config_path.display(),
        dry_run = args.dry_run,
        "starting binance-stream-tail"
    );

    let config = load_config(&args.config_path)?;
    info!(
        subscription_count = config.subscriptions.len(),
        base_url = %config.stream.base_url,
        "configuration loaded"
    );

    if args.dry_run {
        for subscription in &config.subscriptions {
            let label = subscription.label()?;
            let endpoint = config
                .stream
                .endpoint(&subscription.stream.endpoint_suffix()?)?;
            info!(subscription = %label, endpoint = %endpoint, "would subscribe");
        }
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    let client = StreamClient::with_config(config.stream.clone()).context("create stream client")?;
    let summary = binance_stream_tail::run(&client, &config, shutdown, std::io::stdout().lock())
        .await
        .context("tail streams")?;

    for report in &summary.subscriptions {
        info!(
            subscription = %report.label,
            state = ?report.state,
            delivered = report.stats.delivered,
            dropped = report.stats.decode_failures + report.stats.unroutable + report.stats.filtered,
            "subscription summary"
        );
    }
    info!(written = summary.written, "tail complete");

    Ok(())
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: &PathBuf) -> Result<TailConfig> {
    let path_str = path
        .to_str()
        .context("config path must be valid utf-8")?;
    TailConfig::from_file(path_str).context("load config")
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
