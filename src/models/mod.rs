pub mod price;
pub mod transfer;
pub mod whale;

pub use price::{PricePoint, PriceSample};
pub use transfer::{PriceSource, ValuedTransfer};
pub use whale::WhaleTransactionSet;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier written to the `token_address` column for native SOL rows.
pub const NATIVE_ASSET_ID: &str = "SOL";

/// Lamports per SOL exponent.
pub const NATIVE_DECIMALS: u32 = 9;

// ---------------------------------------------------------------------------
// TransferKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Native,
    Token,
}

impl TransferKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferKind::Native => "native",
            TransferKind::Token => "token",
        }
    }
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
