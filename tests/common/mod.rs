use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use whaleflow::config::{
    PricingConfig, StablecoinEntry, USDC_MINT, USDT_MINT, WRAPPED_SOL_MINT,
};
use whaleflow::errors::UpstreamError;
use whaleflow::helius::{RawTransaction, TransactionSource};
use whaleflow::models::PricePoint;
use whaleflow::pricing::{FallbackPolicy, HeuristicPricer, PriceIndex};

/// 2024-03-01T12:00:00Z
#[allow(dead_code)]
pub const MARCH_1_NOON: i64 = 1_709_294_400;

#[allow(dead_code)]
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

#[allow(dead_code)]
pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

#[allow(dead_code)]
pub fn price_index(points: &[(&str, i64)]) -> PriceIndex {
    PriceIndex::from_points(
        points.iter().map(|(d, p)| PricePoint {
            date: date(d),
            price: Decimal::from(*p),
        }),
        FallbackPolicy::default(),
    )
}

#[allow(dead_code)]
pub fn pricing_config() -> PricingConfig {
    PricingConfig {
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
    }
}

#[allow(dead_code)]
pub fn pricer() -> HeuristicPricer {
    HeuristicPricer::new(&pricing_config())
}

/// Transaction with one native transfer per `(lamports, from, to)`.
#[allow(dead_code)]
pub fn native_tx(signature: &str, timestamp: i64, transfers: &[(u64, &str, &str)]) -> RawTransaction {
    let native: Vec<Value> = transfers
        .iter()
        .map(|(amount, from, to)| {
            json!({"amount": amount, "fromUserAccount": from, "toUserAccount": to})
        })
        .collect();
    RawTransaction::new(json!({
        "signature": signature,
        "timestamp": timestamp,
        "nativeTransfers": native,
        "tokenTransfers": [],
    }))
}

#[allow(dead_code)]
pub fn token_tx(signature: &str, timestamp: i64, mint: &str, amount: f64, from: &str, to: &str) -> RawTransaction {
    RawTransaction::new(json!({
        "signature": signature,
        "timestamp": timestamp,
        "nativeTransfers": [],
        "tokenTransfers": [
            {"mint": mint, "tokenAmount": amount, "fromUserAccount": from, "toUserAccount": to}
        ],
    }))
}

// ---------------------------------------------------------------------------
// Scripted transaction source
// ---------------------------------------------------------------------------

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Scripted {
    Transactions(Vec<RawTransaction>),
    Status(u16),
    Malformed,
    /// Never responds.
    Hang,
}

/// In-memory [`TransactionSource`] answering from a per-address script.
/// Unknown addresses return no transactions.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Scripted>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

#[allow(dead_code)]
impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, script: Scripted) -> Self {
        self.scripts.insert(address.to_string(), script);
        self
    }

    pub fn with_delay(mut self, address: &str, delay: Duration) -> Self {
        self.delays.insert(address.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

impl TransactionSource for ScriptedSource {
    async fn fetch_transactions(&self, address: &str) -> Result<Vec<RawTransaction>, UpstreamError> {
        self.calls.lock().expect("calls lock").push(address.to_string());

        if let Some(delay) = self.delays.get(address) {
            tokio::time::sleep(*delay).await;
        }

        match self.scripts.get(address) {
            Some(Scripted::Transactions(txs)) => Ok(txs.clone()),
            Some(Scripted::Status(code)) => Err(UpstreamError::Status {
                service: "helius",
                status: StatusCode::from_u16(*code).expect("valid status code"),
            }),
            Some(Scripted::Malformed) => Err(UpstreamError::malformed("helius", "expected a JSON array")),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Minimal HTTP responder
// ---------------------------------------------------------------------------

/// Serve `responses` in order, one per connection, then stop.
/// Returns the base URL and a handle yielding each request head received.
#[allow(dead_code)]
pub async fn serve_responses(responses: Vec<(u16, String)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.expect("accept");

            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.expect("read request");
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            requests.push(String::from_utf8_lossy(&head).into_owned());

            let reply = format!(
                "HTTP/1.1 {status} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Unknown"),
                body.len(),
            );
            socket.write_all(reply.as_bytes()).await.expect("write response");
            socket.shutdown().await.ok();
        }
        requests
    });

    (format!("http://{addr}"), handle)
}

/// Accepts connections and never answers. Sockets stay open until the
/// returned task is dropped with the runtime.
pub async fn serve_silence() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    format!("http://{addr}")
}
