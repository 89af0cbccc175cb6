use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub const ADDRESSES_PROCESSED: &str = "whale_addresses_processed_total";
pub const ADDRESSES_FAILED: &str = "whale_addresses_failed_total";
pub const TRANSACTIONS_SEEN: &str = "whale_transactions_seen_total";
pub const MALFORMED_RECORDS: &str = "whale_malformed_records_total";
pub const WHALE_TRANSFERS: &str = "whale_transfers_total";
pub const TRANSFERS_BELOW_THRESHOLD: &str = "whale_transfers_below_threshold_total";
pub const TRANSFERS_UNPRICED: &str = "whale_transfers_unpriced_total";
pub const DUPLICATE_TRANSFERS: &str = "whale_duplicate_transfers_total";
pub const PRICE_SAMPLES: &str = "token_price_samples_total";
pub const ALIGNED_DAYS: &str = "aligned_days";

/// Install the Prometheus recorder and register all run metrics.
///
/// There is no scrape endpoint; `render()` on the returned handle is written
/// next to the other results at the end of a run.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(ADDRESSES_PROCESSED, "Wallet addresses queried");
    describe_counter!(ADDRESSES_FAILED, "Wallet addresses whose fetch failed");
    describe_counter!(TRANSACTIONS_SEEN, "Raw transactions returned by Helius");
    describe_counter!(MALFORMED_RECORDS, "Skipped transactions and transfers");
    describe_counter!(WHALE_TRANSFERS, "Transfers at or above the USD threshold");
    describe_counter!(TRANSFERS_BELOW_THRESHOLD, "Valued transfers under the threshold");
    describe_counter!(TRANSFERS_UNPRICED, "Transfers with no available price");
    describe_counter!(DUPLICATE_TRANSFERS, "Transfers seen under more than one address");
    describe_counter!(PRICE_SAMPLES, "Price samples fetched from CoinGecko");
    describe_gauge!(ALIGNED_DAYS, "Days present in both price and whale series");

    // Pre-register so every series shows up in the snapshot.
    counter!(ADDRESSES_PROCESSED).absolute(0);
    counter!(ADDRESSES_FAILED).absolute(0);
    counter!(TRANSACTIONS_SEEN).absolute(0);
    counter!(WHALE_TRANSFERS).absolute(0);
    counter!(TRANSFERS_BELOW_THRESHOLD).absolute(0);
    counter!(TRANSFERS_UNPRICED).absolute(0);
    counter!(DUPLICATE_TRANSFERS).absolute(0);
    counter!(PRICE_SAMPLES).absolute(0);
    gauge!(ALIGNED_DAYS).set(0.0);

    Ok(handle)
}
