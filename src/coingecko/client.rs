use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, Url};
use rust_decimal::Decimal;

use super::types::MarketChartRange;
use crate::config::{ApiKey, CoinGeckoConfig, ConfigError};
use crate::errors::UpstreamError;
use crate::models::PriceSample;

const SERVICE: &str = "coingecko";
const PRO_API_KEY_HEADER: &str = "x-cg-pro-api-key";

#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    http: Client,
    base_url: Url,
    api_key: Option<ApiKey>,
}

impl CoinGeckoClient {
    pub fn new(config: &CoinGeckoConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "api.coingecko",
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        let base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::Invalid {
            key: "api.coingecko.base_url",
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                key: "api.coingecko.base_url",
                reason: "not a hierarchical URL".into(),
            });
        }

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn range_url(&self, coin_id: &str, vs_currency: &str, from: i64, to: i64) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("coins")
                .push(coin_id)
                .push("market_chart")
                .push("range");
        }
        url.query_pairs_mut()
            .append_pair("vs_currency", vs_currency)
            .append_pair("from", &from.to_string())
            .append_pair("to", &to.to_string());
        url
    }

    /// Fetch intraday price samples covering `start..=end` (whole days, UTC).
    pub async fn get_price_history(
        &self,
        coin_id: &str,
        vs_currency: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceSample>, UpstreamError> {
        let (from, to) = unix_range(start, end);
        let url = self.range_url(coin_id, vs_currency, from, to);

        let mut req = self.http.get(url).header("accept", "application/json");
        if let Some(key) = &self.api_key {
            req = req.header(PRO_API_KEY_HEADER, key.expose());
        }

        let resp = req.send().await.map_err(|e| UpstreamError::http(SERVICE, e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UpstreamError::Status {
                service: SERVICE,
                status,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| UpstreamError::http(SERVICE, e))?;
        let chart: MarketChartRange = serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::malformed(SERVICE, e.to_string()))?;

        let samples = samples_from_chart(chart)?;
        tracing::info!(
            coin = %coin_id,
            samples = samples.len(),
            "Fetched token price history"
        );
        Ok(samples)
    }
}

/// Unix seconds from the start of `start` to the end of `end`.
fn unix_range(start: NaiveDate, end: NaiveDate) -> (i64, i64) {
    let from = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
    let to = end
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp() - 1);
    (from.unwrap_or_default(), to.unwrap_or(i64::MAX))
}

/// Convert `[ms, price]` pairs into samples, dropping unusable rows.
fn samples_from_chart(chart: MarketChartRange) -> Result<Vec<PriceSample>, UpstreamError> {
    let prices = chart
        .prices
        .ok_or_else(|| UpstreamError::malformed(SERVICE, "missing `prices` array"))?;

    let mut samples = Vec::with_capacity(prices.len());
    let mut dropped = 0usize;
    for (ms, price) in prices {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(ms as i64);
        let price = Decimal::try_from(price).ok();
        match (timestamp, price) {
            (Some(timestamp), Some(price)) => samples.push(PriceSample { timestamp, price }),
            _ => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "Dropped unusable price samples");
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn client() -> CoinGeckoClient {
        CoinGeckoClient::new(&CoinGeckoConfig {
            base_url: "https://api.coingecko.com/api/v3".into(),
            api_key: None,
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_range_url() {
        let url = client().range_url("solana", "usd", 10, 20);
        assert_eq!(url.path(), "/api/v3/coins/solana/market_chart/range");
        assert_eq!(url.query(), Some("vs_currency=usd&from=10&to=20"));
    }

    #[test]
    fn test_unix_range_covers_whole_days() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert_eq!(unix_range(start, end), (1_709_251_200, 1_709_423_999));
    }

    #[test]
    fn test_samples_from_chart() {
        let chart: MarketChartRange = serde_json::from_str(
            r#"{"prices": [[1709251200000, 100.0], [1709294400000, 110.0]], "total_volumes": []}"#,
        )
        .unwrap();
        let samples = samples_from_chart(chart).unwrap();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].price, Decimal::from(100));
        assert_eq!(samples[1].date(), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn test_missing_prices_is_malformed() {
        let chart: MarketChartRange = serde_json::from_str(r#"{"error": "rate limited"}"#).unwrap();
        let err = samples_from_chart(chart).unwrap_err();
        assert!(matches!(err, UpstreamError::Malformed { .. }));
    }
}
