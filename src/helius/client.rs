use std::collections::HashSet;
use std::future::Future;

use reqwest::{Client, Url};
use serde_json::Value;

use super::types::RawTransaction;
use crate::config::{ApiKey, ConfigError, HeliusConfig};
use crate::errors::UpstreamError;

const SERVICE: &str = "helius";

/// Source of raw transactions for one wallet address.
pub trait TransactionSource {
    fn fetch_transactions(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Vec<RawTransaction>, UpstreamError>> + Send;
}

/// Client for the Helius enhanced transactions API.
#[derive(Debug, Clone)]
pub struct HeliusClient {
    http: Client,
    base_url: Url,
    api_key: ApiKey,
    limit: u32,
    max_pages: u32,
}

impl HeliusClient {
    pub fn new(config: &HeliusConfig) -> Result<Self, ConfigError> {
        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                key: "api.helius",
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Self::with_client(http, config)
    }

    pub fn with_client(http: Client, config: &HeliusConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| ConfigError::Invalid {
            key: "api.helius.base_url",
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::Invalid {
                key: "api.helius.base_url",
                reason: "not a hierarchical URL".into(),
            });
        }

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            limit: config.limit,
            max_pages: config.max_pages,
        })
    }

    /// Build the request URL for one page. Contains the API key; never log it.
    fn page_url(&self, address: &str, before: Option<&str>) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("addresses")
                .push(address)
                .push("transactions");
        }
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api-key", self.api_key.expose())
                .append_pair("limit", &self.limit.to_string());
            if let Some(cursor) = before {
                query.append_pair("before", cursor);
            }
        }
        url
    }

    /// Fetch a single page of transactions, newest first.
    pub async fn fetch_page(
        &self,
        address: &str,
        before: Option<&str>,
    ) -> Result<Vec<RawTransaction>, UpstreamError> {
        let resp = self
            .http
            .get(self.page_url(address, before))
            .send()
            .await
            .map_err(|e| UpstreamError::http(SERVICE, e))?;

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

        let items: Vec<Value> = serde_json::from_slice(&body)
            .map_err(|e| UpstreamError::malformed(SERVICE, format!("expected a JSON array: {e}")))?;

        Ok(items.into_iter().map(RawTransaction::new).collect())
    }
}

impl TransactionSource for HeliusClient {
    /// Fetch up to `max_pages` pages, following the `before` signature
    /// cursor. Transactions repeated across pages are dropped.
    async fn fetch_transactions(&self, address: &str) -> Result<Vec<RawTransaction>, UpstreamError> {
        let mut all: Vec<RawTransaction> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut before: Option<String> = None;

        for page in 0..self.max_pages {
            let batch = self.fetch_page(address, before.as_deref()).await?;
            let batch_len = batch.len();
            let cursor = batch
                .last()
                .and_then(|tx| tx.signature())
                .map(str::to_string);

            for tx in batch {
                if let Some(sig) = tx.signature() {
                    if !seen.insert(sig.to_string()) {
                        continue;
                    }
                }
                all.push(tx);
            }

            tracing::debug!(
                wallet = %address,
                page = page + 1,
                batch = batch_len,
                "Fetched transaction page"
            );

            if batch_len < self.limit as usize {
                break;
            }

            if page + 1 == self.max_pages {
                tracing::debug!(
                    wallet = %address,
                    pages = self.max_pages,
                    "Page limit reached, older transactions not fetched"
                );
                break;
            }

            match cursor {
                Some(c) => before = Some(c),
                None => break,
            }
        }

        Ok(all)
    }
}
