use std::collections::hash_map::{Entry, HashMap};
use std::fmt;

use futures_util::stream::{self, StreamExt};
use metrics::counter;
use rust_decimal::Decimal;
use tokio::sync::watch;

use super::normalizer::{TransferNormalizer, TransferOutcome};
use crate::errors::{AggregateError, UpstreamError};
use crate::helius::TransactionSource;
use crate::metrics as names;
use crate::models::{TransferKind, ValuedTransfer, WhaleTransactionSet};
use crate::pricing::{PriceIndex, TokenPricer};

#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Inclusive USD threshold.
    pub threshold: Decimal,
    /// Addresses fetched at the same time. Values below 1 act as 1.
    pub max_concurrency: usize,
}

/// Where an address ended up in the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressState {
    Pending,
    Fetched,
    Normalized,
    FetchFailed,
}

impl AddressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressState::Pending => "pending",
            AddressState::Fetched => "fetched",
            AddressState::Normalized => "normalized",
            AddressState::FetchFailed => "fetch_failed",
        }
    }
}

impl fmt::Display for AddressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counters for one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub addresses: usize,
    pub failed_addresses: Vec<String>,
    pub transactions: usize,
    pub malformed_transactions: usize,
    pub whale_transfers: usize,
    pub below_threshold: usize,
    pub unpriced: usize,
    pub malformed_transfers: usize,
    /// Transfers already kept for an earlier queried address. Repeated legs
    /// within one transaction under the same wallet are not duplicates.
    pub duplicates: usize,
}

impl RunSummary {
    fn absorb(&mut self, other: &RunSummary) {
        self.transactions += other.transactions;
        self.malformed_transactions += other.malformed_transactions;
        self.whale_transfers += other.whale_transfers;
        self.below_threshold += other.below_threshold;
        self.unpriced += other.unpriced;
        self.malformed_transfers += other.malformed_transfers;
    }

    fn record_metrics(&self) {
        counter!(names::ADDRESSES_PROCESSED).increment(self.addresses as u64);
        counter!(names::ADDRESSES_FAILED).increment(self.failed_addresses.len() as u64);
        counter!(names::TRANSACTIONS_SEEN).increment(self.transactions as u64);
        counter!(names::MALFORMED_RECORDS, "scope" => "transaction")
            .increment(self.malformed_transactions as u64);
        counter!(names::MALFORMED_RECORDS, "scope" => "transfer")
            .increment(self.malformed_transfers as u64);
        counter!(names::WHALE_TRANSFERS).increment(self.whale_transfers as u64);
        counter!(names::TRANSFERS_BELOW_THRESHOLD).increment(self.below_threshold as u64);
        counter!(names::TRANSFERS_UNPRICED).increment(self.unpriced as u64);
        counter!(names::DUPLICATE_TRANSFERS).increment(self.duplicates as u64);
    }
}

#[derive(Debug, Clone)]
pub struct AggregateOutput {
    pub whales: WhaleTransactionSet,
    pub summary: RunSummary,
}

struct AddressReport {
    address: String,
    state: AddressState,
    transfers: Vec<ValuedTransfer>,
    summary: RunSummary,
}

/// Key under which the same on-chain movement is recognised across wallets.
#[derive(PartialEq, Eq, Hash)]
struct TransferKey {
    signature: String,
    kind: TransferKind,
    asset_id: String,
    from: String,
    to: String,
    amount: Decimal,
}

impl From<&ValuedTransfer> for TransferKey {
    fn from(t: &ValuedTransfer) -> Self {
        Self {
            signature: t.signature.clone(),
            kind: t.kind,
            asset_id: t.asset_id.clone(),
            from: t.from.clone(),
            to: t.to.clone(),
            amount: t.amount.normalize(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Fetch, value and filter transfers for every address.
///
/// Addresses are fetched up to `max_concurrency` at a time but merged in
/// input order, so the output does not depend on response timing. A failing
/// address is logged and skipped. Flipping `shutdown` to `true` stops the run
/// and discards partial results.
pub async fn aggregate<S: TransactionSource>(
    source: &S,
    addresses: &[String],
    price_index: &PriceIndex,
    pricer: &dyn TokenPricer,
    config: &AggregatorConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<AggregateOutput, AggregateError> {
    let total = addresses.len();
    let normalizer = TransferNormalizer::new(price_index, pricer, config.threshold);
    let normalizer = &normalizer;

    tracing::info!(
        addresses = total,
        threshold = %config.threshold,
        concurrency = config.max_concurrency.max(1),
        "Aggregating whale transfers"
    );

    let reports: Vec<Option<AddressReport>> = stream::iter(
        addresses
            .iter()
            .map(move |address| process_address(source, address, normalizer, shutdown.clone())),
    )
    .buffered(config.max_concurrency.max(1))
    .collect()
    .await;

    let completed = reports.iter().filter(|r| r.is_some()).count();
    if completed < total {
        tracing::warn!(completed, total, "Aggregation cancelled");
        return Err(AggregateError::Cancelled { completed, total });
    }

    let mut summary = RunSummary {
        addresses: total,
        ..RunSummary::default()
    };
    // Key -> wallet that first reported it.
    let mut seen: HashMap<TransferKey, String> = HashMap::new();
    let mut discovered = Vec::new();

    for report in reports.into_iter().flatten() {
        summary.absorb(&report.summary);
        if report.state == AddressState::FetchFailed {
            summary.failed_addresses.push(report.address);
            continue;
        }
        for transfer in report.transfers {
            match seen.entry(TransferKey::from(&transfer)) {
                Entry::Vacant(slot) => {
                    slot.insert(transfer.wallet.clone());
                    discovered.push(transfer);
                }
                Entry::Occupied(slot) if *slot.get() == transfer.wallet => {
                    discovered.push(transfer);
                }
                Entry::Occupied(_) => {
                    summary.duplicates += 1;
                    summary.whale_transfers -= 1;
                }
            }
        }
    }

    let whales = WhaleTransactionSet::from_discovered(discovered);
    summary.record_metrics();

    tracing::info!(
        addresses = summary.addresses,
        failed = summary.failed_addresses.len(),
        transactions = summary.transactions,
        whales = whales.len(),
        below_threshold = summary.below_threshold,
        unpriced = summary.unpriced,
        malformed = summary.malformed_transactions + summary.malformed_transfers,
        duplicates = summary.duplicates,
        heuristic = whales.heuristic_count(),
        "Aggregation complete"
    );

    Ok(AggregateOutput { whales, summary })
}

/// `None` when the run was cancelled before this address finished.
async fn process_address<S: TransactionSource>(
    source: &S,
    address: &str,
    normalizer: &TransferNormalizer<'_>,
    shutdown: watch::Receiver<bool>,
) -> Option<AddressReport> {
    if *shutdown.borrow() {
        return None;
    }

    let mut report = AddressReport {
        address: address.to_string(),
        state: AddressState::Pending,
        transfers: Vec::new(),
        summary: RunSummary::default(),
    };

    let fetched: Result<_, UpstreamError> = tokio::select! {
        res = source.fetch_transactions(address) => res,
        _ = cancelled(shutdown) => return None,
    };

    let transactions = match fetched {
        Ok(txs) => txs,
        Err(e) => {
            report.state = AddressState::FetchFailed;
            tracing::error!(wallet = %address, error = %e, "Failed to fetch transactions, skipping address");
            return Some(report);
        }
    };

    report.state = AddressState::Fetched;
    report.summary.transactions = transactions.len();
    tracing::debug!(wallet = %address, transactions = transactions.len(), "Fetched transactions");

    for raw in &transactions {
        let outcomes = match normalizer.normalize(address, raw) {
            Ok(outcomes) => outcomes,
            Err(e) => {
                report.summary.malformed_transactions += 1;
                tracing::warn!(
                    wallet = %address,
                    signature = raw.signature().unwrap_or("<none>"),
                    error = %e,
                    "Skipping malformed transaction"
                );
                continue;
            }
        };

        for outcome in outcomes {
            match outcome {
                TransferOutcome::Whale(transfer) => {
                    tracing::debug!(wallet = %address, transfer = %transfer, "Whale transfer found");
                    report.summary.whale_transfers += 1;
                    report.transfers.push(transfer);
                }
                TransferOutcome::BelowThreshold { .. } => report.summary.below_threshold += 1,
                TransferOutcome::Unpriced { kind, asset_id } => {
                    report.summary.unpriced += 1;
                    tracing::debug!(wallet = %address, kind = %kind, asset = %asset_id, "No price for transfer");
                }
                TransferOutcome::Malformed(e) => {
                    report.summary.malformed_transfers += 1;
                    tracing::warn!(wallet = %address, error = %e, "Skipping malformed transfer");
                }
            }
        }
    }

    report.state = AddressState::Normalized;
    tracing::info!(
        wallet = %address,
        state = %report.state,
        whales = report.transfers.len(),
        "Address processed"
    );
    Some(report)
}

/// Resolves once `shutdown` flips to `true`. Never resolves if the sender is gone.
async fn cancelled(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
