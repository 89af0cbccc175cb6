use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::analysis::correlation::CorrelationMethod;
use crate::pricing::FallbackPolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

const DEFAULT_HELIUS_URL: &str = "https://api.helius.xyz/v0";
const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";
pub const USDT_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
pub const WRAPPED_SOL_MINT: &str = "So11111111111111111111111111111111111111112";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("missing required config value `{0}`")]
    Missing(&'static str),

    #[error("environment variable `{var}` (from `{key}`) is not set")]
    MissingEnv { key: &'static str, var: String },

    #[error("invalid date for `{key}`: {value:?} (expected YYYY-MM-DD)")]
    InvalidDate { key: &'static str, value: String },

    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// An API key that never prints itself.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

// ---------------------------------------------------------------------------
// File layout (config.toml)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    token: TokenSection,
    analysis: AnalysisSection,
    api: ApiSection,
    pricing: PricingSection,
    paths: PathsSection,
    plot: PlotConfig,
    logging: LoggingSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct TokenSection {
    name: String,
    vs_currency: String,
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            name: "solana".into(),
            vs_currency: "usd".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct AnalysisSection {
    start_date: Option<String>,
    end_date: Option<String>,
    whale_threshold_usd: Decimal,
    correlation_method: String,
    price_fallback: String,
}

impl Default for AnalysisSection {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            whale_threshold_usd: Decimal::from(100),
            correlation_method: "pearson".into(),
            price_fallback: "backward_then_latest".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ApiSection {
    helius: HeliusSection,
    coingecko: CoinGeckoSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct HeliusSection {
    base_url: String,
    api_key_env: Option<String>,
    limit: u32,
    max_pages: u32,
    max_concurrency: usize,
    timeout_secs: u64,
    connect_timeout_secs: u64,
}

impl Default for HeliusSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_HELIUS_URL.into(),
            api_key_env: None,
            limit: 100,
            max_pages: 1,
            max_concurrency: 4,
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct CoinGeckoSection {
    base_url: String,
    api_key_env: Option<String>,
    timeout_secs: u64,
}

impl Default for CoinGeckoSection {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COINGECKO_URL.into(),
            api_key_env: None,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct PricingSection {
    stablecoins: Vec<StablecoinEntry>,
    wrapped_native_mint: String,
}

impl Default for PricingSection {
    fn default() -> Self {
        Self {
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
}

#[derive(Debug, Clone, Deserialize)]
pub struct StablecoinEntry {
    pub mint: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct PathsSection {
    addresses: PathBuf,
    raw_data: PathBuf,
    processed_data: PathBuf,
    results: PathBuf,
    figures: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            addresses: PathBuf::from("data/addresses.csv"),
            raw_data: PathBuf::from("data/raw"),
            processed_data: PathBuf::from("data/processed"),
            results: PathBuf::from("results"),
            figures: PathBuf::from("figures"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub price_color: String,
    pub whale_color: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            price_color: "blue".into(),
            whale_color: "orange".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct LoggingSection {
    format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            format: "pretty".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HeliusConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    pub limit: u32,
    pub max_pages: u32,
    pub max_concurrency: usize,
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct CoinGeckoConfig {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub stablecoins: Vec<StablecoinEntry>,
    pub wrapped_native_mint: String,
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    pub addresses: PathBuf,
    pub raw_data: PathBuf,
    pub processed_data: PathBuf,
    pub results: PathBuf,
    pub figures: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub token_name: String,
    pub vs_currency: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub whale_threshold_usd: Decimal,
    pub correlation_method: CorrelationMethod,
    pub price_fallback: FallbackPolicy,
    pub helius: HeliusConfig,
    pub coingecko: CoinGeckoConfig,
    pub pricing: PricingConfig,
    pub paths: PathsConfig,
    pub plot: PlotConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load and resolve a TOML config file, reading API keys from the
    /// process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Self::from_toml_str_with_env(contents, |var| env::var(var).ok())
    }

    /// Same as [`AppConfig::from_toml_str`] with a custom environment lookup.
    pub fn from_toml_str_with_env<F>(contents: &str, env_lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = toml::from_str(contents)?;
        Self::resolve(file, &env_lookup)
    }

    fn resolve<F>(file: FileConfig, env_lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let start_date = parse_date(
            "analysis.start_date",
            file.analysis.start_date.as_deref(),
        )?;
        let end_date = parse_date("analysis.end_date", file.analysis.end_date.as_deref())?;
        if end_date < start_date {
            return Err(ConfigError::Invalid {
                key: "analysis.end_date",
                reason: format!("{end_date} is before start date {start_date}"),
            });
        }

        if file.analysis.whale_threshold_usd.is_sign_negative() {
            return Err(ConfigError::Invalid {
                key: "analysis.whale_threshold_usd",
                reason: "must not be negative".into(),
            });
        }

        let correlation_method = file
            .analysis
            .correlation_method
            .parse::<CorrelationMethod>()
            .map_err(|reason| ConfigError::Invalid {
                key: "analysis.correlation_method",
                reason,
            })?;

        let price_fallback = file
            .analysis
            .price_fallback
            .parse::<FallbackPolicy>()
            .map_err(|reason| ConfigError::Invalid {
                key: "analysis.price_fallback",
                reason,
            })?;

        let helius_key_var = file
            .api
            .helius
            .api_key_env
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("api.helius.api_key_env"))?;
        let helius_key = resolve_secret("api.helius.api_key_env", &helius_key_var, env_lookup)?;

        let coingecko_key = match file
            .api
            .coingecko
            .api_key_env
            .as_deref()
            .filter(|v| !v.trim().is_empty())
        {
            Some(var) => Some(resolve_secret("api.coingecko.api_key_env", var, env_lookup)?),
            None => None,
        };

        let helius = &file.api.helius;
        if helius.limit == 0 {
            return Err(ConfigError::Invalid {
                key: "api.helius.limit",
                reason: "must be positive".into(),
            });
        }
        if helius.max_pages == 0 {
            return Err(ConfigError::Invalid {
                key: "api.helius.max_pages",
                reason: "must be positive".into(),
            });
        }
        if helius.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "api.helius.max_concurrency",
                reason: "must be positive".into(),
            });
        }

        let log_format = match file.logging.format.to_lowercase().as_str() {
            "pretty" | "text" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            other => {
                return Err(ConfigError::Invalid {
                    key: "logging.format",
                    reason: format!("unknown format {other:?}"),
                })
            }
        };

        Ok(Self {
            token_name: file.token.name,
            vs_currency: file.token.vs_currency,
            start_date,
            end_date,
            whale_threshold_usd: file.analysis.whale_threshold_usd,
            correlation_method,
            price_fallback,
            helius: HeliusConfig {
                base_url: helius.base_url.trim_end_matches('/').to_string(),
                api_key: helius_key,
                limit: helius.limit,
                max_pages: helius.max_pages,
                max_concurrency: helius.max_concurrency,
                timeout: Duration::from_secs(helius.timeout_secs),
                connect_timeout: Duration::from_secs(helius.connect_timeout_secs),
            },
            coingecko: CoinGeckoConfig {
                base_url: file
                    .api
                    .coingecko
                    .base_url
                    .trim_end_matches('/')
                    .to_string(),
                api_key: coingecko_key,
                timeout: Duration::from_secs(file.api.coingecko.timeout_secs),
            },
            pricing: PricingConfig {
                stablecoins: file.pricing.stablecoins,
                wrapped_native_mint: file.pricing.wrapped_native_mint,
            },
            paths: PathsConfig {
                addresses: file.paths.addresses,
                raw_data: file.paths.raw_data,
                processed_data: file.paths.processed_data,
                results: file.paths.results,
                figures: file.paths.figures,
            },
            plot: file.plot,
            log_format,
        })
    }
}

fn parse_date(key: &'static str, value: Option<&str>) -> Result<NaiveDate, ConfigError> {
    let value = value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))?;
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ConfigError::InvalidDate {
        key,
        value: value.to_string(),
    })
}

fn resolve_secret<F>(key: &'static str, var: &str, env_lookup: &F) -> Result<ApiKey, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    env_lookup(var)
        .filter(|v| !v.is_empty())
        .map(ApiKey::new)
        .ok_or_else(|| ConfigError::MissingEnv {
            key,
            var: var.to_string(),
        })
}
