use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use statrs::statistics::Statistics;

use super::alignment::AlignedPoint;
use crate::errors::AnalysisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrelationMethod {
    #[default]
    Pearson,
    Spearman,
    Kendall,
}

impl CorrelationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "pearson",
            CorrelationMethod::Spearman => "spearman",
            CorrelationMethod::Kendall => "kendall",
        }
    }

    /// Capitalised name for reports.
    pub fn title(&self) -> &'static str {
        match self {
            CorrelationMethod::Pearson => "Pearson",
            CorrelationMethod::Spearman => "Spearman",
            CorrelationMethod::Kendall => "Kendall",
        }
    }
}

impl FromStr for CorrelationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pearson" => Ok(CorrelationMethod::Pearson),
            "spearman" => Ok(CorrelationMethod::Spearman),
            "kendall" => Ok(CorrelationMethod::Kendall),
            other => Err(format!("unknown correlation method {other:?}")),
        }
    }
}

impl fmt::Display for CorrelationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Correlation between daily price and daily whale volume.
pub fn correlate(points: &[AlignedPoint], method: CorrelationMethod) -> Result<f64, AnalysisError> {
    if points.len() < 2 {
        return Err(AnalysisError::InsufficientData(points.len()));
    }

    let prices: Vec<f64> = points
        .iter()
        .map(|p| p.price.to_f64().unwrap_or_default())
        .collect();
    let volumes: Vec<f64> = points
        .iter()
        .map(|p| p.usd_value.to_f64().unwrap_or_default())
        .collect();

    if is_constant(&prices) {
        return Err(AnalysisError::ZeroVariance("price"));
    }
    if is_constant(&volumes) {
        return Err(AnalysisError::ZeroVariance("whale volume"));
    }

    let r = match method {
        CorrelationMethod::Pearson => pearson(&prices, &volumes),
        CorrelationMethod::Spearman => pearson(&average_ranks(&prices), &average_ranks(&volumes)),
        CorrelationMethod::Kendall => kendall_tau_b(&prices, &volumes),
    };

    tracing::info!(method = %method, points = points.len(), r, "Correlation computed");
    Ok(r)
}

fn is_constant(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] == w[1])
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let cov = x.iter().covariance(y.iter());
    let r = cov / (x.iter().std_dev() * y.iter().std_dev());
    r.clamp(-1.0, 1.0)
}

/// 1-based ranks; ties share the mean of the ranks they span.
fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && values[order[end + 1]] == values[order[start]] {
            end += 1;
        }
        let rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            ranks[idx] = rank;
        }
        start = end + 1;
    }
    ranks
}

fn kendall_tau_b(x: &[f64], y: &[f64]) -> f64 {
    let (mut concordant, mut discordant) = (0i64, 0i64);
    let (mut tied_x_only, mut tied_y_only) = (0i64, 0i64);

    for i in 0..x.len() {
        for j in (i + 1)..x.len() {
            match (x[i].total_cmp(&x[j]), y[i].total_cmp(&y[j])) {
                (Ordering::Equal, Ordering::Equal) => {}
                (Ordering::Equal, _) => tied_x_only += 1,
                (_, Ordering::Equal) => tied_y_only += 1,
                (a, b) if a == b => concordant += 1,
                _ => discordant += 1,
            }
        }
    }

    let untied = (concordant + discordant) as f64;
    let denom = ((untied + tied_x_only as f64) * (untied + tied_y_only as f64)).sqrt();
    (concordant - discordant) as f64 / denom
}
