use std::fmt;
use std::path::PathBuf;

use reqwest::StatusCode;

/// Failure talking to an external API (Helius, CoinGecko).
///
/// Never carries the request URL: both APIs take the key as a query
/// parameter or header, so transport errors are stripped of it before they
/// are wrapped here.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned HTTP {status}")]
    Status {
        service: &'static str,
        status: StatusCode,
    },

    #[error("unexpected response from {service}: {reason}")]
    Malformed {
        service: &'static str,
        reason: String,
    },
}

impl UpstreamError {
    pub fn http(service: &'static str, source: reqwest::Error) -> Self {
        UpstreamError::Http {
            service,
            source: source.without_url(),
        }
    }

    pub fn malformed(service: &'static str, reason: impl Into<String>) -> Self {
        UpstreamError::Malformed {
            service,
            reason: reason.into(),
        }
    }
}

/// Which part of a transaction record failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordScope {
    Transaction,
    NativeTransfer,
    TokenTransfer,
}

impl fmt::Display for RecordScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordScope::Transaction => write!(f, "transaction"),
            RecordScope::NativeTransfer => write!(f, "native transfer"),
            RecordScope::TokenTransfer => write!(f, "token transfer"),
        }
    }
}

/// A transaction or transfer with an unexpected shape. Skipped at the
/// narrowest scope that contains it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {scope}: {reason}")]
pub struct MalformedRecord {
    pub scope: RecordScope,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(scope: RecordScope, reason: impl Into<String>) -> Self {
        Self {
            scope,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("run cancelled after {completed} of {total} addresses")]
    Cancelled { completed: usize, total: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path} has no `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("need at least 2 aligned data points, got {0}")]
    InsufficientData(usize),

    #[error("{0} series has zero variance")]
    ZeroVariance(&'static str),

    #[error("chart rendering failed: {0}")]
    Chart(String),
}
