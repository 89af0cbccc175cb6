pub mod index;
pub mod strategy;

pub use index::{FallbackPolicy, PriceIndex};
pub use strategy::{HeuristicPricer, PricedAsset, TokenPricer};
