use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{MalformedRecord, RecordScope};

// ---------------------------------------------------------------------------
// Transaction (enhanced transactions API)
// ---------------------------------------------------------------------------

/// One entry of the `/addresses/{address}/transactions` response, kept as
/// raw JSON so a bad record can be skipped without losing the whole page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTransaction(Value);

impl RawTransaction {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn signature(&self) -> Option<&str> {
        self.0.get("signature").and_then(Value::as_str)
    }

    /// Validate the transaction envelope. Individual transfers stay raw and
    /// are parsed one at a time by the caller.
    pub fn parse(&self) -> Result<ParsedTransaction, MalformedRecord> {
        let envelope = TransactionEnvelope::deserialize(&self.0)
            .map_err(|e| MalformedRecord::new(RecordScope::Transaction, e.to_string()))?;

        if envelope.signature.trim().is_empty() {
            return Err(MalformedRecord::new(
                RecordScope::Transaction,
                "empty signature",
            ));
        }

        let timestamp = DateTime::from_timestamp(envelope.timestamp, 0).ok_or_else(|| {
            MalformedRecord::new(
                RecordScope::Transaction,
                format!("timestamp {} out of range", envelope.timestamp),
            )
        })?;

        Ok(ParsedTransaction {
            signature: envelope.signature,
            timestamp,
            native_transfers: envelope.native_transfers.unwrap_or_default(),
            token_transfers: envelope.token_transfers.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionEnvelope {
    signature: String,
    timestamp: i64,
    #[serde(default)]
    native_transfers: Option<Vec<Value>>,
    #[serde(default)]
    token_transfers: Option<Vec<Value>>,
}

#[derive(Debug, Clone)]
pub struct ParsedTransaction {
    pub signature: String,
    pub timestamp: DateTime<Utc>,
    pub native_transfers: Vec<Value>,
    pub token_transfers: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Transfers
// ---------------------------------------------------------------------------

/// SOL movement; `amount` is in lamports.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeTransfer {
    pub amount: u64,
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
}

impl NativeTransfer {
    pub fn parse(value: &Value) -> Result<Self, MalformedRecord> {
        NativeTransfer::deserialize(value)
            .map_err(|e| MalformedRecord::new(RecordScope::NativeTransfer, e.to_string()))
    }
}

/// SPL token movement; `token_amount` is already in display units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub mint: String,
    pub token_amount: Decimal,
    #[serde(default)]
    pub from_user_account: Option<String>,
    #[serde(default)]
    pub to_user_account: Option<String>,
}

impl TokenTransfer {
    pub fn parse(value: &Value) -> Result<Self, MalformedRecord> {
        let transfer = TokenTransfer::deserialize(value)
            .map_err(|e| MalformedRecord::new(RecordScope::TokenTransfer, e.to_string()))?;

        if transfer.mint.trim().is_empty() {
            return Err(MalformedRecord::new(RecordScope::TokenTransfer, "empty mint"));
        }
        if transfer.token_amount.is_sign_negative() {
            return Err(MalformedRecord::new(
                RecordScope::TokenTransfer,
                format!("negative amount {}", transfer.token_amount),
            ));
        }

        Ok(transfer)
    }
}
