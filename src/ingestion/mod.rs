pub mod normalizer;
pub mod pipeline;

pub use normalizer::{lamports_to_sol, TransferNormalizer, TransferOutcome};
pub use pipeline::{aggregate, AddressState, AggregateOutput, AggregatorConfig, RunSummary};
