use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::PricePoint;

/// One day present in both the price series and the whale volume series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedPoint {
    pub date: NaiveDate,
    pub price: Decimal,
    /// Whale USD volume for the day.
    pub usd_value: Decimal,
}

/// Inner join of daily prices and daily whale volume on date, ascending.
pub fn align(
    prices: impl IntoIterator<Item = PricePoint>,
    whale_volume: &BTreeMap<NaiveDate, Decimal>,
) -> Vec<AlignedPoint> {
    let prices: BTreeMap<NaiveDate, Decimal> =
        prices.into_iter().map(|p| (p.date, p.price)).collect();

    if prices.is_empty() || whale_volume.is_empty() {
        tracing::warn!(
            price_days = prices.len(),
            whale_days = whale_volume.len(),
            "Nothing to align"
        );
        return Vec::new();
    }

    let aligned: Vec<AlignedPoint> = prices
        .iter()
        .filter_map(|(date, price)| {
            whale_volume.get(date).map(|usd_value| AlignedPoint {
                date: *date,
                price: *price,
                usd_value: *usd_value,
            })
        })
        .collect();

    tracing::info!(
        price_days = prices.len(),
        whale_days = whale_volume.len(),
        aligned_days = aligned.len(),
        "Aligned price and whale series"
    );
    aligned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn p(day: u32, price: i64) -> PricePoint {
        PricePoint {
            date: d(day),
            price: Decimal::from(price),
        }
    }

    #[test]
    fn test_inner_join_on_shared_dates() {
        let prices = vec![p(3, 130), p(1, 100), p(2, 110)];
        let volume = BTreeMap::from([
            (d(2), Decimal::from(5_000)),
            (d(3), Decimal::from(7_000)),
            (d(9), Decimal::from(1_000)),
        ]);

        let aligned = align(prices, &volume);

        assert_eq!(aligned.len(), 2);
        assert_eq!(aligned[0].date, d(2));
        assert_eq!(aligned[0].price, Decimal::from(110));
        assert_eq!(aligned[1].usd_value, Decimal::from(7_000));
    }

    #[test]
    fn test_empty_side_yields_empty() {
        assert!(align(vec![p(1, 100)], &BTreeMap::new()).is_empty());
        let volume = BTreeMap::from([(d(1), Decimal::ONE)]);
        assert!(align(Vec::new(), &volume).is_empty());
    }
}
