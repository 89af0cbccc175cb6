use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use metrics::{counter, gauge};
use tokio::sync::watch;

use whaleflow::analysis::{align, correlate, render_price_vs_whale};
use whaleflow::coingecko::CoinGeckoClient;
use whaleflow::config::{AppConfig, LogFormat, DEFAULT_CONFIG_PATH};
use whaleflow::helius::HeliusClient;
use whaleflow::ingestion::{aggregate, AggregatorConfig};
use whaleflow::metrics as names;
use whaleflow::pricing::{HeuristicPricer, PriceIndex};
use whaleflow::storage;

/// Extract Solana whale transfers and correlate them with token price.
#[derive(Debug, Parser)]
#[command(name = "whaleflow", version, about)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "WHALEFLOW_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Skip rendering the price vs whale chart.
    #[arg(long)]
    skip_plot: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(LogFormat::Pretty);
            tracing::error!(path = %args.config.display(), error = %e, "Failed to load config");
            return Err(e).with_context(|| format!("failed to load config from {}", args.config.display()));
        }
    };
    init_tracing(config.log_format);
    let metrics_handle = whaleflow::metrics::init_metrics()?;

    tracing::info!(
        token = %config.token_name,
        start = %config.start_date,
        end = %config.end_date,
        threshold = %config.whale_threshold_usd,
        "Starting whale activity pipeline"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, cancelling run");
            let _ = shutdown_tx.send(true);
        }
    });

    // --- Inputs ---
    let addresses = storage::load_addresses(&config.paths.addresses)
        .context("failed to load wallet addresses")?;

    let coingecko = CoinGeckoClient::new(&config.coingecko)?;
    let samples = coingecko
        .get_price_history(
            &config.token_name,
            &config.vs_currency,
            config.start_date,
            config.end_date,
        )
        .await
        .context("failed to fetch token price history")?;
    counter!(names::PRICE_SAMPLES).increment(samples.len() as u64);

    let price_index = PriceIndex::from_samples(samples, config.price_fallback);
    match (price_index.first_date(), price_index.last_date()) {
        (Some(first), Some(last)) => tracing::info!(
            days = price_index.len(),
            first = %first,
            last = %last,
            fallback = %price_index.fallback_policy(),
            "Price index built"
        ),
        _ => tracing::warn!("Price history is empty; native transfers cannot be valued"),
    }
    storage::write_price_history(&config.paths.raw_data, &config.token_name, price_index.points())
        .context("failed to save raw price data")?;

    // --- Whale extraction ---
    let helius = HeliusClient::new(&config.helius)?;
    let pricer = HeuristicPricer::new(&config.pricing);
    let aggregator_config = AggregatorConfig {
        threshold: config.whale_threshold_usd,
        max_concurrency: config.helius.max_concurrency,
    };
    let output = aggregate(
        &helius,
        &addresses,
        &price_index,
        &pricer,
        &aggregator_config,
        shutdown_rx,
    )
    .await
    .context("whale aggregation did not complete")?;

    if !output.summary.failed_addresses.is_empty() {
        tracing::warn!(
            failed = ?output.summary.failed_addresses,
            "Some addresses could not be fetched"
        );
    }
    storage::write_whale_transactions(&config.paths.processed_data, &output.whales)
        .context("failed to save whale transactions")?;
    storage::write_metrics_snapshot(&config.paths.results, &metrics_handle.render())
        .context("failed to save metrics snapshot")?;

    // --- Analysis ---
    let aligned = align(price_index.points(), &output.whales.daily_volume());
    gauge!(names::ALIGNED_DAYS).set(aligned.len() as f64);
    storage::write_aligned_series(&config.paths.processed_data, &config.paths.results, &aligned)
        .context("failed to save aligned series")?;

    let r = match correlate(&aligned, config.correlation_method) {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(
                method = %config.correlation_method,
                aligned_days = aligned.len(),
                error = %e,
                "Correlation analysis failed"
            );
            if let Err(se) = storage::write_metrics_snapshot(&config.paths.results, &metrics_handle.render()) {
                tracing::error!(error = %se, "Failed to save metrics snapshot");
            }
            return Err(e).context("correlation analysis failed");
        }
    };
    storage::write_correlation_report(&config.paths.results, config.correlation_method, r)
        .context("failed to save correlation report")?;
    tracing::info!(
        method = %config.correlation_method,
        correlation = r,
        "Correlation analysis completed"
    );

    if args.skip_plot {
        tracing::info!("Plotting skipped");
    } else {
        let figure = config.paths.figures.join("price_vs_whale.svg");
        let rendered = std::fs::create_dir_all(&config.paths.figures)
            .map_err(anyhow::Error::from)
            .and_then(|_| render_price_vs_whale(&aligned, &figure, &config.plot).map_err(Into::into));
        if let Err(e) = rendered {
            tracing::error!(error = %e, "Plotting failed");
        }
    }

    // Refresh with the analysis gauges.
    storage::write_metrics_snapshot(&config.paths.results, &metrics_handle.render())
        .context("failed to save metrics snapshot")?;

    tracing::info!(
        whales = output.whales.len(),
        total_usd = %output.whales.total_usd().round_dp(2),
        "Pipeline execution completed"
    );
    Ok(())
}

fn init_tracing(format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Pretty => registry.with(fmt::layer()).init(),
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
    }
}
