pub mod addresses;
pub mod csv_store;

pub use addresses::load_addresses;
pub use csv_store::{
    read_whale_transactions, write_aligned_series, write_correlation_report,
    write_metrics_snapshot, write_price_history, write_whale_transactions, AlignedOutputs,
    WhaleTransactionRow,
};
