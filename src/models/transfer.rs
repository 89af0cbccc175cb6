use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TransferKind;

/// Where a transfer's unit price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    /// Daily price history of the base asset.
    PriceIndex,
    /// Pegged stablecoin, fixed at 1.0.
    Stablecoin,
    /// Unknown mint priced at the heuristic fallback. Approximate only.
    Heuristic,
}

/// A transfer with a USD valuation that met the whale threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuedTransfer {
    pub wallet: String,
    pub kind: TransferKind,
    /// Amount in display units (SOL, not lamports).
    pub amount: Decimal,
    pub usd_value: Decimal,
    pub from: String,
    pub to: String,
    pub timestamp: DateTime<Utc>,
    pub date: NaiveDate,
    pub signature: String,
    pub asset_id: String,
    pub asset_symbol: Option<String>,
    pub price_source: PriceSource,
}

impl ValuedTransfer {
    pub fn is_heuristic(&self) -> bool {
        self.price_source == PriceSource::Heuristic
    }
}

/// First 8 characters, for log lines.
fn short(s: &str) -> String {
    s.chars().take(8).collect()
}

impl fmt::Display for ValuedTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let asset = match &self.asset_symbol {
            Some(symbol) => symbol.clone(),
            None => short(&self.asset_id),
        };
        write!(
            f,
            "Transfer: wallet={} kind={} asset={} amount={} usd={} sig={}",
            short(&self.wallet),
            self.kind,
            asset,
            self.amount,
            self.usd_value.round_dp(2),
            short(&self.signature),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn transfer(wallet: &str, asset_id: &str, signature: &str) -> ValuedTransfer {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        ValuedTransfer {
            wallet: wallet.into(),
            kind: TransferKind::Token,
            amount: Decimal::new(12345, 1),
            usd_value: Decimal::new(1234567, 3),
            from: "from".into(),
            to: "to".into(),
            timestamp,
            date: timestamp.date_naive(),
            signature: signature.into(),
            asset_id: asset_id.into(),
            asset_symbol: None,
            price_source: PriceSource::Heuristic,
        }
    }

    #[test]
    fn test_display_truncates_ids() {
        let t = transfer("WalletAddress123", "MintAddress456", "Signature789");
        assert_eq!(
            t.to_string(),
            "Transfer: wallet=WalletAd kind=token asset=MintAddr amount=1234.5 usd=1234.57 sig=Signatur"
        );
    }

    #[test]
    fn test_display_multibyte_ids() {
        let t = transfer("wällét-ädrèss", "aéééé", "sïgnätürè-long");
        let line = t.to_string();
        assert!(line.contains("wallet=wällét-ä "));
        assert!(line.contains("asset=aéééé "));
        assert!(line.contains("sig=sïgnätür"));
    }

    #[test]
    fn test_display_prefers_symbol() {
        let mut t = transfer("wallet", "mint", "sig");
        t.asset_symbol = Some("USDC".into());
        assert!(t.to_string().contains("asset=USDC "));
    }
}
