pub mod analysis;
pub mod coingecko;
pub mod config;
pub mod errors;
pub mod helius;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod pricing;
pub mod storage;
