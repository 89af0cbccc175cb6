use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::errors::{MalformedRecord, RecordScope};
use crate::helius::{NativeTransfer, ParsedTransaction, RawTransaction, TokenTransfer};
use crate::models::{PriceSource, TransferKind, ValuedTransfer, NATIVE_ASSET_ID, NATIVE_DECIMALS};
use crate::pricing::{PriceIndex, TokenPricer};

/// Result of valuing a single transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// Valued at or above the whale threshold.
    Whale(ValuedTransfer),
    BelowThreshold { usd_value: Decimal },
    /// No price available for the asset on that day.
    Unpriced { kind: TransferKind, asset_id: String },
    Malformed(MalformedRecord),
}

/// Turns raw transactions into valued transfers for one wallet.
pub struct TransferNormalizer<'a> {
    index: &'a PriceIndex,
    pricer: &'a dyn TokenPricer,
    threshold: Decimal,
}

impl<'a> TransferNormalizer<'a> {
    pub fn new(index: &'a PriceIndex, pricer: &'a dyn TokenPricer, threshold: Decimal) -> Self {
        Self {
            index,
            pricer,
            threshold,
        }
    }

    /// Value every transfer in `raw`. Native transfers come first, then
    /// token transfers, each in the order the API listed them.
    ///
    /// Errors only when the transaction envelope itself is unusable; a bad
    /// transfer becomes a [`TransferOutcome::Malformed`] next to the good ones.
    pub fn normalize(
        &self,
        wallet: &str,
        raw: &RawTransaction,
    ) -> Result<Vec<TransferOutcome>, MalformedRecord> {
        let tx = raw.parse()?;
        let date = tx.timestamp.date_naive();

        let mut outcomes = Vec::with_capacity(tx.native_transfers.len() + tx.token_transfers.len());
        for value in &tx.native_transfers {
            outcomes.push(self.value_native(wallet, &tx, date, value));
        }
        for value in &tx.token_transfers {
            outcomes.push(self.value_token(wallet, &tx, date, value));
        }
        Ok(outcomes)
    }

    fn value_native(
        &self,
        wallet: &str,
        tx: &ParsedTransaction,
        date: NaiveDate,
        value: &Value,
    ) -> TransferOutcome {
        let transfer = match NativeTransfer::parse(value) {
            Ok(t) => t,
            Err(e) => return TransferOutcome::Malformed(e),
        };

        let Some(price) = self.index.lookup(date) else {
            return TransferOutcome::Unpriced {
                kind: TransferKind::Native,
                asset_id: NATIVE_ASSET_ID.into(),
            };
        };

        let amount = lamports_to_sol(transfer.amount);
        let Some(usd_value) = amount.checked_mul(price) else {
            return TransferOutcome::Malformed(MalformedRecord::new(
                RecordScope::NativeTransfer,
                format!("usd value overflow for {amount} SOL"),
            ));
        };

        self.classify(ValuedTransfer {
            wallet: wallet.to_string(),
            kind: TransferKind::Native,
            amount,
            usd_value,
            from: transfer.from_user_account.unwrap_or_default(),
            to: transfer.to_user_account.unwrap_or_default(),
            timestamp: tx.timestamp,
            date,
            signature: tx.signature.clone(),
            asset_id: NATIVE_ASSET_ID.into(),
            asset_symbol: None,
            price_source: PriceSource::PriceIndex,
        })
    }

    fn value_token(
        &self,
        wallet: &str,
        tx: &ParsedTransaction,
        date: NaiveDate,
        value: &Value,
    ) -> TransferOutcome {
        let transfer = match TokenTransfer::parse(value) {
            Ok(t) => t,
            Err(e) => return TransferOutcome::Malformed(e),
        };

        let Some(priced) = self.pricer.price_token(&transfer.mint, date, self.index) else {
            return TransferOutcome::Unpriced {
                kind: TransferKind::Token,
                asset_id: transfer.mint,
            };
        };

        let Some(usd_value) = transfer.token_amount.checked_mul(priced.unit_price) else {
            return TransferOutcome::Malformed(MalformedRecord::new(
                RecordScope::TokenTransfer,
                format!("usd value overflow for {} of {}", transfer.token_amount, transfer.mint),
            ));
        };

        self.classify(ValuedTransfer {
            wallet: wallet.to_string(),
            kind: TransferKind::Token,
            amount: transfer.token_amount,
            usd_value,
            from: transfer.from_user_account.unwrap_or_default(),
            to: transfer.to_user_account.unwrap_or_default(),
            timestamp: tx.timestamp,
            date,
            signature: tx.signature.clone(),
            asset_id: transfer.mint,
            asset_symbol: priced.symbol,
            price_source: priced.source,
        })
    }

    fn classify(&self, transfer: ValuedTransfer) -> TransferOutcome {
        // Inclusive: a transfer worth exactly the threshold is a whale.
        if transfer.usd_value >= self.threshold {
            TransferOutcome::Whale(transfer)
        } else {
            TransferOutcome::BelowThreshold {
                usd_value: transfer.usd_value,
            }
        }
    }
}

/// Convert lamports to SOL.
pub fn lamports_to_sol(lamports: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(lamports), NATIVE_DECIMALS).normalize()
}
