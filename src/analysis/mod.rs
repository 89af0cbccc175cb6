pub mod alignment;
pub mod chart;
pub mod correlation;

pub use alignment::{align, AlignedPoint};
pub use chart::render_price_vs_whale;
pub use correlation::{correlate, CorrelationMethod};
