use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::models::{PricePoint, PriceSample};

/// What to do when the exact date has no price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Most recent price on or before the date; if the date precedes all
    /// data, the latest stored price.
    #[default]
    BackwardThenLatest,
    /// Most recent price on or before the date, otherwise no price.
    BackwardOnly,
}

impl FromStr for FallbackPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "backward_then_latest" => Ok(FallbackPolicy::BackwardThenLatest),
            "backward_only" => Ok(FallbackPolicy::BackwardOnly),
            other => Err(format!("unknown price fallback policy {other:?}")),
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::BackwardThenLatest => write!(f, "backward_then_latest"),
            FallbackPolicy::BackwardOnly => write!(f, "backward_only"),
        }
    }
}

/// Read-only date → price table for the base asset.
///
/// Keys are kept sorted by date, so fallback direction does not depend on
/// the order the source records arrived in.
#[derive(Debug, Clone, Default)]
pub struct PriceIndex {
    prices: BTreeMap<NaiveDate, Decimal>,
    fallback: FallbackPolicy,
}

impl PriceIndex {
    /// Build from intraday samples, averaging all samples of a day.
    pub fn from_samples(
        samples: impl IntoIterator<Item = PriceSample>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self::from_daily_values(samples.into_iter().map(|s| (s.date(), s.price)), fallback)
    }

    /// Build from daily points. Duplicate dates are averaged.
    pub fn from_points(
        points: impl IntoIterator<Item = PricePoint>,
        fallback: FallbackPolicy,
    ) -> Self {
        Self::from_daily_values(points.into_iter().map(|p| (p.date, p.price)), fallback)
    }

    fn from_daily_values(
        values: impl Iterator<Item = (NaiveDate, Decimal)>,
        fallback: FallbackPolicy,
    ) -> Self {
        let mut sums: BTreeMap<NaiveDate, (Decimal, u32)> = BTreeMap::new();
        for (date, price) in values {
            let entry = sums.entry(date).or_insert((Decimal::ZERO, 0));
            entry.0 += price;
            entry.1 += 1;
        }

        let prices = sums
            .into_iter()
            .map(|(date, (sum, count))| (date, (sum / Decimal::from(count)).normalize()))
            .collect();

        Self { prices, fallback }
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        self.fallback
    }

    /// Price for `date`, or the fallback price when the day is missing.
    /// `None` means the index cannot value anything on that date.
    pub fn lookup(&self, date: NaiveDate) -> Option<Decimal> {
        if let Some(price) = self.prices.get(&date) {
            return Some(*price);
        }

        if let Some((_, price)) = self.prices.range(..date).next_back() {
            return Some(*price);
        }

        match self.fallback {
            FallbackPolicy::BackwardThenLatest => self.prices.values().next_back().copied(),
            FallbackPolicy::BackwardOnly => None,
        }
    }

    /// [`PriceIndex::lookup`] for a `YYYY-MM-DD` string. Unparsable input has no price.
    pub fn lookup_str(&self, date: &str) -> Option<Decimal> {
        NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
            .ok()
            .and_then(|d| self.lookup(d))
    }

    /// Exact-date price only.
    pub fn get(&self, date: NaiveDate) -> Option<Decimal> {
        self.prices.get(&date).copied()
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.prices.keys().next_back().copied()
    }

    /// Daily points ascending by date.
    pub fn points(&self) -> impl Iterator<Item = PricePoint> + '_ {
        self.prices
            .iter()
            .map(|(date, price)| PricePoint {
                date: *date,
                price: *price,
            })
    }
}
