pub mod client;
pub mod types;

pub use client::{HeliusClient, TransactionSource};
pub use types::{NativeTransfer, ParsedTransaction, RawTransaction, TokenTransfer};
