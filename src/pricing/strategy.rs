use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::PriceIndex;
use crate::config::PricingConfig;
use crate::models::PriceSource;

/// Unit price and display symbol resolved for a token mint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedAsset {
    pub unit_price: Decimal,
    pub symbol: Option<String>,
    pub source: PriceSource,
}

/// Resolves the USD unit price of a fungible token on a given day.
///
/// Returning `None` means the token cannot be valued; the transfer is
/// skipped, not failed.
pub trait TokenPricer: Send + Sync {
    fn price_token(&self, mint: &str, date: NaiveDate, index: &PriceIndex) -> Option<PricedAsset>;
}

/// Stablecoin / wrapped-SOL / flat-fallback pricing.
///
/// Stablecoins are pegged at 1.0 and wrapped SOL uses the price index. Every
/// other mint gets a flat 1.0 and a symbol made from the first 8 characters
/// of its mint. That last rule is a placeholder, not a price oracle: USD
/// values for unknown tokens are approximate and carry
/// [`PriceSource::Heuristic`].
#[derive(Debug, Clone)]
pub struct HeuristicPricer {
    stablecoins: HashMap<String, String>,
    wrapped_native_mint: String,
    fallback_price: Decimal,
}

impl HeuristicPricer {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            stablecoins: config
                .stablecoins
                .iter()
                .map(|s| (s.mint.clone(), s.symbol.clone()))
                .collect(),
            wrapped_native_mint: config.wrapped_native_mint.clone(),
            fallback_price: Decimal::ONE,
        }
    }

    pub fn with_fallback_price(mut self, price: Decimal) -> Self {
        self.fallback_price = price;
        self
    }
}

impl TokenPricer for HeuristicPricer {
    fn price_token(&self, mint: &str, date: NaiveDate, index: &PriceIndex) -> Option<PricedAsset> {
        if let Some(symbol) = self.stablecoins.get(mint) {
            return Some(PricedAsset {
                unit_price: Decimal::ONE,
                symbol: Some(symbol.clone()),
                source: PriceSource::Stablecoin,
            });
        }

        if mint == self.wrapped_native_mint {
            return index.lookup(date).map(|price| PricedAsset {
                unit_price: price,
                symbol: Some("wSOL".into()),
                source: PriceSource::PriceIndex,
            });
        }

        Some(PricedAsset {
            unit_price: self.fallback_price,
            symbol: Some(mint.chars().take(8).collect()),
            source: PriceSource::Heuristic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StablecoinEntry, USDC_MINT, USDT_MINT, WRAPPED_SOL_MINT};
    use crate::models::PricePoint;
    use crate::pricing::FallbackPolicy;

    fn pricer() -> HeuristicPricer {
        HeuristicPricer::new(&PricingConfig {
            stablecoins: vec![
                StablecoinEntry {
                    mint: USDC_MINT.into(),
                    symbol: "USDC".into(),
                },
                StablecoinEntry {
                    mint: USDT_MINT.into(),
                    symbol: "USDT".into(),
                },
            ],
            wrapped_native_mint: WRAPPED_SOL_MINT.into(),
        })
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[test]
    fn test_stablecoins_are_pegged_even_with_empty_index() {
        let idx = PriceIndex::default();
        for (mint, symbol) in [(USDC_MINT, "USDC"), (USDT_MINT, "USDT")] {
            let priced = pricer().price_token(mint, day(), &idx).unwrap();
            assert_eq!(priced.unit_price, Decimal::ONE);
            assert_eq!(priced.symbol.as_deref(), Some(symbol));
            assert_eq!(priced.source, PriceSource::Stablecoin);
        }
    }

    #[test]
    fn test_wrapped_sol_uses_index() {
        let idx = PriceIndex::from_points(
            [PricePoint {
                date: day(),
                price: Decimal::from(150),
            }],
            FallbackPolicy::default(),
        );
        let priced = pricer().price_token(WRAPPED_SOL_MINT, day(), &idx).unwrap();
        assert_eq!(priced.unit_price, Decimal::from(150));
        assert_eq!(priced.source, PriceSource::PriceIndex);
    }

    #[test]
    fn test_wrapped_sol_without_price_is_unpriced() {
        let idx = PriceIndex::default();
        assert!(pricer().price_token(WRAPPED_SOL_MINT, day(), &idx).is_none());
    }

    #[test]
    fn test_unknown_mint_gets_heuristic_price_and_symbol() {
        let idx = PriceIndex::default();
        let priced = pricer()
            .price_token("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263", day(), &idx)
            .unwrap();
        assert_eq!(priced.unit_price, Decimal::ONE);
        assert_eq!(priced.symbol.as_deref(), Some("DezXAZ8z"));
        assert_eq!(priced.source, PriceSource::Heuristic);
    }

    #[test]
    fn test_fallback_price_is_swappable() {
        let idx = PriceIndex::default();
        let priced = pricer()
            .with_fallback_price(Decimal::ZERO)
            .price_token("UnknownMint111", day(), &idx)
            .unwrap();
        assert_eq!(priced.unit_price, Decimal::ZERO);
    }
}
