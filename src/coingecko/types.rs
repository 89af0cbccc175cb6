use serde::Deserialize;

/// Response of `/coins/{id}/market_chart/range`. Only prices are used.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketChartRange {
    /// `[unix_ms, price]` pairs.
    #[serde(default)]
    pub prices: Option<Vec<(f64, f64)>>,
}
