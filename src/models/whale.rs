use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::ValuedTransfer;

/// Whale transfers for one run, ordered by USD value descending.
///
/// Equal values keep the order in which the transfers were discovered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhaleTransactionSet {
    transfers: Vec<ValuedTransfer>,
}

impl WhaleTransactionSet {
    /// Build the set from transfers in discovery order.
    pub fn from_discovered(mut transfers: Vec<ValuedTransfer>) -> Self {
        // sort_by is stable
        transfers.sort_by(|a, b| b.usd_value.cmp(&a.usd_value));
        Self { transfers }
    }

    pub fn len(&self) -> usize {
        self.transfers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValuedTransfer> {
        self.transfers.iter()
    }

    pub fn as_slice(&self) -> &[ValuedTransfer] {
        &self.transfers
    }

    pub fn total_usd(&self) -> Decimal {
        self.transfers.iter().map(|t| t.usd_value).sum()
    }

    /// Sum of USD value per calendar day, ascending by date.
    pub fn daily_volume(&self) -> BTreeMap<NaiveDate, Decimal> {
        let mut daily: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for t in &self.transfers {
            *daily.entry(t.date).or_insert(Decimal::ZERO) += t.usd_value;
        }
        daily
    }

    pub fn heuristic_count(&self) -> usize {
        self.transfers.iter().filter(|t| t.is_heuristic()).count()
    }
}

impl<'a> IntoIterator for &'a WhaleTransactionSet {
    type Item = &'a ValuedTransfer;
    type IntoIter = std::slice::Iter<'a, ValuedTransfer>;

    fn into_iter(self) -> Self::IntoIter {
        self.transfers.iter()
    }
}
